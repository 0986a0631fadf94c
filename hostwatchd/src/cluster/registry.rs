use std::collections::{BTreeSet, HashMap};
use super::address::{AddressCluster, ClusterId};

/// Partition of every known address into clusters.
///
/// Clusters live in an arena keyed by id. Merging keeps the first-found
/// cluster's id and records every other id as superseded by it, so an id
/// handed out before a merge canonicalizes to the merged cluster.
///
/// Owned by the aggregator task; all mutation happens there.
#[derive(Debug, Default)]
pub struct Registry {
    next_id: u64,
    clusters: HashMap<ClusterId, AddressCluster>,
    by_address: HashMap<String, ClusterId>,
    superseded: HashMap<ClusterId, ClusterId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the cluster for a sighting, merging every cluster
    /// that shares an address with it. Returns the canonical cluster.
    pub fn resolve(&mut self, addresses: &BTreeSet<String>, hostnames: &BTreeSet<String>) -> AddressCluster {
        let mut found: Vec<ClusterId> = Vec::new();
        for address in addresses {
            if let Some(&id) = self.by_address.get(address) {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }

        let Some((&primary, others)) = found.split_first() else {
            let id = self.mint();
            let cluster = AddressCluster::new(id, addresses.clone(), hostnames.clone());
            for address in addresses {
                self.by_address.insert(address.clone(), id);
            }
            self.clusters.insert(id, cluster.clone());
            tracing::debug!("New address cluster {} for {:?}", id, addresses);
            return cluster;
        };

        let mut merged = self
            .clusters
            .remove(&primary)
            .unwrap_or_else(|| AddressCluster::new(primary, BTreeSet::new(), BTreeSet::new()));
        for other in others {
            if let Some(cluster) = self.clusters.remove(other) {
                merged.absorb(&cluster);
            }
            self.superseded.insert(*other, primary);
            tracing::debug!("Merged address cluster {} into {}", other, primary);
        }
        merged.absorb(&AddressCluster::new(primary, addresses.clone(), hostnames.clone()));

        for address in merged.addresses() {
            self.by_address.insert(address.clone(), primary);
        }
        self.clusters.insert(primary, merged.clone());
        merged
    }

    /// Follow superseded ids to the id currently standing for the cluster.
    pub fn canonical(&self, id: ClusterId) -> ClusterId {
        let mut current = id;
        while let Some(&next) = self.superseded.get(&current) {
            current = next;
        }
        current
    }

    /// Current contents of the cluster an id stands for, if it is still known.
    pub fn get(&self, id: ClusterId) -> Option<&AddressCluster> {
        self.clusters.get(&self.canonical(id))
    }

    /// True if both ids stand for the same cluster now.
    pub fn same_cluster(&self, a: ClusterId, b: ClusterId) -> bool {
        self.canonical(a) == self.canonical(b)
    }

    /// Forget every cluster. Ids keep counting, so nothing minted before the
    /// flush can equal anything minted after it.
    pub fn flush(&mut self) {
        tracing::info!("Flushing {} address clusters", self.len());
        self.clusters.clear();
        self.by_address.clear();
        self.superseded.clear();
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    fn mint(&mut self) -> ClusterId {
        self.next_id += 1;
        ClusterId(self.next_id)
    }
}
