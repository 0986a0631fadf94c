use std::collections::{BTreeMap, BTreeSet};
use serde::Serialize;
use sha2::{Sha256, Digest};
use crate::host::Host;

/// Only stable fields are hashed: last_seen changes on every re-resolve
/// without representing a meaningful change.
#[derive(Serialize)]
struct HostView<'a> {
    id: u64,
    name: &'a str,
    alive: bool,
    addresses: &'a BTreeSet<String>,
    hostnames: &'a BTreeSet<String>,
    services: Vec<ServiceView<'a>>,
}

#[derive(Serialize)]
struct ServiceView<'a> {
    name: &'a str,
    service_type: &'a str,
    domain: Option<&'a str>,
    port: u16,
    txt: &'a BTreeMap<String, String>,
    alive: bool,
}

/// SHA-256 over a host list. Hosts and their services arrive in snapshot
/// order, which is already deterministic.
pub fn compute_hash(hosts: &[Host]) -> String {
    let views: Vec<HostView<'_>> = hosts
        .iter()
        .map(|host| HostView {
            id: host.cluster().id().get(),
            name: host.name(),
            alive: host.is_alive(),
            addresses: host.cluster().addresses(),
            hostnames: host.cluster().hostnames(),
            services: host
                .services()
                .iter()
                .map(|s| ServiceView {
                    name: &s.name,
                    service_type: &s.service_type,
                    domain: s.domain.as_deref(),
                    port: s.port,
                    txt: &s.txt,
                    alive: s.alive,
                })
                .collect(),
        })
        .collect();

    let json = serde_json::to_string(&views)
        .expect("Failed to serialize hosts for hashing");

    let hash = Sha256::digest(json.as_bytes());
    hex::encode(hash)
}
