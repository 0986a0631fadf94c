//! The aggregation state machine.
//!
//! Turns full discovery batches into host snapshots and drives the
//! discovery lifecycle. Everything here runs on the single aggregator
//! task; see [`super::handle`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use crate::cluster::{ClusterId, Registry};
use crate::discovery::{Discovery, DiscoveryBatch};
use crate::host::Host;
use crate::service::{Service, ServiceKey};
use super::hash;

/// One published host list. Never modified after publication.
#[derive(Debug)]
pub struct Snapshot {
    /// Increments with every publication
    pub generation: u64,
    /// Sorted by (lowercased name, cluster id)
    pub hosts: Vec<Host>,
    pub hash: String,
}

impl Snapshot {
    pub fn new(generation: u64, hosts: Vec<Host>) -> Self {
        let hash = hash::compute_hash(&hosts);
        Self { generation, hosts, hash }
    }

    pub fn host(&self, id: ClusterId) -> Option<&Host> {
        self.hosts.iter().find(|h| h.cluster().id() == id)
    }

    pub fn service(&self, id: ClusterId, service_type: &str, name: &str) -> Option<&Service> {
        self.host(id)?.service(service_type, name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

pub struct Controller<D> {
    discovery: D,
    registry: Registry,
    grace: Duration,
    state: RunState,
    stopped_since: Option<Instant>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
}

impl<D: Discovery> Controller<D> {
    /// `grace` is how long discovery may stay stopped before clustering
    /// evidence is considered stale.
    pub fn new(discovery: D, grace: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::new(0, Vec::new())));
        Self {
            discovery,
            registry: Registry::new(),
            grace,
            state: RunState::Stopped,
            stopped_since: None,
            snapshot_tx,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn start(&mut self, now: Instant) {
        if self.state == RunState::Running {
            return;
        }

        // Addresses may have been handed to other machines while we were away
        if let Some(since) = self.stopped_since {
            let stopped_for = now.saturating_duration_since(since);
            if stopped_for > self.grace {
                tracing::info!("Stopped for {:?}, discarding stale discovery state", stopped_for);
                self.reset();
            }
        }

        self.discovery.start();
        self.state = RunState::Running;
        self.stopped_since = None;
        tracing::info!("Discovery running");
    }

    /// Pause discovery. The snapshot is kept as is.
    pub fn stop(&mut self, now: Instant) {
        if self.state == RunState::Stopped {
            return;
        }

        self.discovery.stop();
        self.state = RunState::Stopped;
        self.stopped_since = Some(now);
        tracing::info!("Discovery stopped");
    }

    /// Stop and throw away all state. The caller starts again once the
    /// backend has had time to wind down.
    pub fn restart(&mut self, now: Instant) {
        self.stop(now);
        self.reset();
        tracing::info!("Discovery reset for restart");
    }

    fn reset(&mut self) {
        self.discovery.reset();
        self.registry.flush();
        self.publish(Vec::new());
    }

    /// Fold a full batch of resolved services into a new snapshot.
    /// Services missing from the batch are kept but marked not alive.
    pub fn apply_batch(&mut self, batch: DiscoveryBatch, seen: DateTime<Utc>) {
        if self.state != RunState::Running {
            tracing::debug!("Discarding batch of {} services while stopped", batch.len());
            return;
        }

        let fresh: Vec<Service> = batch
            .into_iter()
            .filter(|raw| {
                if raw.addresses.is_empty() {
                    tracing::debug!("Skipping unresolved service {} ({})", raw.name, raw.service_type);
                    return false;
                }
                true
            })
            .map(|raw| {
                let hostnames: BTreeSet<String> = raw.hostname.iter().cloned().collect();
                let cluster = self.registry.resolve(&raw.addresses, &hostnames);
                Service::from_raw(raw, cluster, seen)
            })
            .collect();

        let mut services: HashMap<ServiceKey, Service> = HashMap::new();

        // Later entries in the batch may have merged earlier clusters
        for mut service in fresh {
            self.refresh_cluster(&mut service);
            services.insert(service.key(), service);
        }

        let previous = self.snapshot();
        for host in &previous.hosts {
            for service in host.services() {
                let mut service = service.clone();
                self.refresh_cluster(&mut service);
                service.alive = false;
                services.entry(service.key()).or_insert(service);
            }
        }

        let mut groups: BTreeMap<ClusterId, Vec<Service>> = BTreeMap::new();
        for service in services.into_values() {
            groups.entry(service.cluster.id()).or_default().push(service);
        }

        let mut hosts: Vec<Host> = groups
            .into_iter()
            .filter_map(|(id, services)| {
                let cluster = match self.registry.get(id) {
                    Some(cluster) => cluster.clone(),
                    None => services.first()?.cluster.clone(),
                };
                Some(Host::new(cluster, services))
            })
            .collect();

        hosts.sort_by_cached_key(|h| (h.name().to_lowercase(), h.cluster().id()));

        tracing::debug!("Aggregated {} hosts", hosts.len());
        self.publish(hosts);
    }

    /// Host for a cluster id, following merges the id has been through.
    pub fn lookup_host(&self, id: ClusterId) -> Option<Host> {
        self.snapshot().host(self.registry.canonical(id)).cloned()
    }

    pub fn lookup_service(&self, id: ClusterId, service_type: &str, name: &str) -> Option<Service> {
        self.snapshot()
            .service(self.registry.canonical(id), service_type, name)
            .cloned()
    }

    fn refresh_cluster(&self, service: &mut Service) {
        if let Some(cluster) = self.registry.get(service.cluster.id()) {
            service.cluster = cluster.clone();
        }
    }

    fn publish(&mut self, hosts: Vec<Host>) {
        let generation = self.snapshot_tx.borrow().generation + 1;
        self.snapshot_tx.send_replace(Arc::new(Snapshot::new(generation, hosts)));
    }

    #[cfg(test)]
    pub(crate) fn discovery(&self) -> &D {
        &self.discovery
    }
}
