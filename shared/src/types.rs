use std::collections::{BTreeMap, BTreeSet};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// One resolved advertisement as handed over by a discovery backend.
/// Backends always deliver the full current set of these, never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawService {
    /// Instance name, e.g. "Living Room"
    pub name: String,

    /// DNS-SD type without domain, e.g. "_googlecast._tcp"
    #[serde(rename = "type")]
    pub service_type: String,

    /// Domain, e.g. "local"
    #[serde(default)]
    pub domain: Option<String>,

    /// Target hostname, e.g. "nas.local."
    #[serde(default)]
    pub hostname: Option<String>,

    /// Resolved addresses in textual form
    pub addresses: BTreeSet<String>,

    /// Service port
    pub port: u16,

    /// TXT record key-value pairs
    #[serde(default)]
    pub txt: BTreeMap<String, String>,
}

/// Export shape of one host: name, display-ordered addresses and services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostExport {
    pub id: u64,
    pub name: String,
    pub alive: bool,
    pub addresses: Vec<String>,
    pub services: Vec<ServiceExport>,
}

/// Export shape of one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceExport {
    pub name: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub service_type: String,
    pub domain: Option<String>,
    pub addresses: Vec<String>,
    pub txt: BTreeMap<String, String>,
    pub alive: bool,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Compact host row for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSummary {
    pub id: u64,
    pub name: String,
    pub alive: bool,
    pub address: String,
    pub service_count: usize,
}
