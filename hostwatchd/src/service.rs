use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::net::Ipv6Addr;
use chrono::{DateTime, Utc};
use shared::protocol::{TYPE_HTTP, TYPE_HTTPS, TYPE_SMB, TYPE_SONOS, TYPE_SSH, TXT_PATH};
use shared::types::{RawService, ServiceExport};
use crate::cluster::{AddressCluster, ClusterId};

/// Sonos players serve a diagnostics page at this path
const SONOS_STATUS_PATH: &str = "/support/review";

/// Fields that make two records the same service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub name: String,
    pub service_type: String,
    pub domain: Option<String>,
    pub port: u16,
    pub cluster: ClusterId,
}

/// One advertised service, attached to the address cluster of its host.
///
/// TXT data, `last_seen` and `alive` are metadata; identity is
/// (name, type, domain, port, cluster id).
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub service_type: String,
    pub domain: Option<String>,
    pub cluster: AddressCluster,
    pub port: u16,
    pub txt: BTreeMap<String, String>,
    pub last_seen: DateTime<Utc>,
    pub alive: bool,
}

impl Service {
    pub fn from_raw(raw: RawService, cluster: AddressCluster, seen: DateTime<Utc>) -> Self {
        Self {
            name: raw.name,
            service_type: raw.service_type,
            domain: raw.domain,
            cluster,
            port: raw.port,
            txt: raw.txt,
            last_seen: seen,
            alive: true,
        }
    }

    pub fn key(&self) -> ServiceKey {
        ServiceKey {
            name: self.name.clone(),
            service_type: self.service_type.clone(),
            domain: self.domain.clone(),
            port: self.port,
            cluster: self.cluster.id(),
        }
    }

    pub fn txt(&self, key: &str) -> Option<&str> {
        self.txt.get(key).map(String::as_str)
    }

    /// Case-insensitive substring search over everything a user might type.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();

        contains_ci(&self.name, &needle)
            || contains_ci(&self.service_type, &needle)
            || self.domain.as_deref().is_some_and(|d| contains_ci(d, &needle))
            || contains_ci(&self.port.to_string(), &needle)
            || self.cluster.addresses().iter().any(|a| contains_ci(a, &needle))
            || self.txt.iter().any(|(k, v)| contains_ci(k, &needle) || contains_ci(v, &needle))
    }

    /// Browser-openable URL for well-known service types.
    pub fn url(&self) -> Option<String> {
        let host = url_host(&self.cluster.display_address());
        let port = self.port;

        if self.service_type.starts_with(TYPE_HTTPS) {
            Some(format!("https://{host}:{port}{}", self.path()))
        } else if self.service_type.starts_with(TYPE_HTTP) {
            Some(format!("http://{host}:{port}{}", self.path()))
        } else if self.service_type.starts_with(TYPE_SSH) {
            Some(format!("ssh://{host}:{port}"))
        } else if self.service_type.starts_with(TYPE_SMB) {
            Some(format!("smb://{host}"))
        } else if self.service_type.starts_with(TYPE_SONOS) {
            Some(format!("http://{host}:{port}{SONOS_STATUS_PATH}"))
        } else {
            None
        }
    }

    fn path(&self) -> String {
        match self.txt(TXT_PATH) {
            Some(path) if path.starts_with('/') => path.to_string(),
            Some(path) if !path.is_empty() => format!("/{path}"),
            _ => "/".to_string(),
        }
    }

    pub fn to_export(&self) -> ServiceExport {
        ServiceExport {
            name: self.name.clone(),
            port: self.port,
            service_type: self.service_type.clone(),
            domain: self.domain.clone(),
            addresses: self.cluster.sorted_addresses(),
            txt: self.txt.clone(),
            alive: self.alive,
            last_seen: self.last_seen,
            url: self.url(),
        }
    }
}

/// `needle` must already be lowercase
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn url_host(address: &str) -> String {
    match address.parse::<Ipv6Addr>() {
        Ok(_) => format!("[{address}]"),
        Err(_) => address.to_string(),
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.service_type == other.service_type
            && self.domain == other.domain
            && self.port == other.port
            && self.cluster == other.cluster
    }
}

impl Eq for Service {}

impl Hash for Service {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
