use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Shown when a cluster has neither addresses nor hostnames
pub const NO_ADDRESS: &str = "(no address)";

/// Stable identity of an address cluster.
/// Minted once by the registry and only ever copied afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub(crate) u64);

impl ClusterId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClusterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ClusterId)
    }
}

/// All addresses and hostnames believed to belong to one physical host.
///
/// Equality and hashing look at the identifier only: a copy taken before a
/// merge still equals the canonical cluster once the registry has
/// canonicalized its id, even if its contents lag behind.
#[derive(Debug, Clone, Serialize)]
pub struct AddressCluster {
    id: ClusterId,
    addresses: BTreeSet<String>,
    hostnames: BTreeSet<String>,
}

impl AddressCluster {
    pub(crate) fn new(id: ClusterId, addresses: BTreeSet<String>, hostnames: BTreeSet<String>) -> Self {
        Self { id, addresses, hostnames }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn addresses(&self) -> &BTreeSet<String> {
        &self.addresses
    }

    pub fn hostnames(&self) -> &BTreeSet<String> {
        &self.hostnames
    }

    pub(crate) fn absorb(&mut self, other: &AddressCluster) {
        self.addresses.extend(other.addresses.iter().cloned());
        self.hostnames.extend(other.hostnames.iter().cloned());
    }

    /// Addresses ordered shortest first, so IPv4 precedes IPv6, ties broken
    /// lexicographically; hostnames follow in lexicographic order.
    pub fn sorted_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.addresses.iter().cloned().collect();
        addresses.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        // BTreeSet iteration is already lexicographic
        addresses.extend(self.hostnames.iter().cloned());
        addresses
    }

    pub fn display_address(&self) -> String {
        self.sorted_addresses()
            .into_iter()
            .next()
            .unwrap_or_else(|| NO_ADDRESS.to_string())
    }
}

impl PartialEq for AddressCluster {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AddressCluster {}

impl Hash for AddressCluster {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sorted_addresses_shorter_first() {
        let cluster = AddressCluster::new(
            ClusterId(1),
            set(&["fe80::1c2b:3ff:fe4d:5e6f", "192.168.1.10", "10.0.0.2", "10.0.0.1"]),
            set(&["nas.local.", "backup.local."]),
        );

        assert_eq!(
            cluster.sorted_addresses(),
            vec![
                "10.0.0.1",
                "10.0.0.2",
                "192.168.1.10",
                "fe80::1c2b:3ff:fe4d:5e6f",
                "backup.local.",
                "nas.local.",
            ]
        );
    }

    #[test]
    fn test_hostnames_after_all_addresses() {
        // A short hostname still sorts after a long address
        let cluster = AddressCluster::new(
            ClusterId(1),
            set(&["2001:db8::1234:5678"]),
            set(&["a."]),
        );

        assert_eq!(cluster.sorted_addresses(), vec!["2001:db8::1234:5678", "a."]);
    }

    #[test]
    fn test_display_address() {
        let cluster = AddressCluster::new(ClusterId(1), set(&["fd00::5", "10.1.1.1"]), set(&[]));
        assert_eq!(cluster.display_address(), "10.1.1.1");

        let hostname_only = AddressCluster::new(ClusterId(2), set(&[]), set(&["tv.local."]));
        assert_eq!(hostname_only.display_address(), "tv.local.");

        let empty = AddressCluster::new(ClusterId(3), set(&[]), set(&[]));
        assert_eq!(empty.display_address(), NO_ADDRESS);
    }

    #[test]
    fn test_equality_by_id_only() {
        let a = AddressCluster::new(ClusterId(7), set(&["10.0.0.1"]), set(&[]));
        let b = AddressCluster::new(ClusterId(7), set(&["10.0.0.1", "10.0.0.2"]), set(&["x.local."]));
        let c = AddressCluster::new(ClusterId(8), set(&["10.0.0.1"]), set(&[]));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cluster_id_parse() {
        assert_eq!("42".parse::<ClusterId>().unwrap(), ClusterId(42));
        assert!("x".parse::<ClusterId>().is_err());
    }
}
