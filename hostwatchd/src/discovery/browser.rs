use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use anyhow::{Context, Result};
use shared::protocol::META_QUERY_TYPE;
use shared::types::RawService;
use super::{Discovery, DiscoveryBatch};

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// Each future owns a clone of the receiver, avoiding borrow issues with the
/// receivers vec. flume::Receiver is Clone (multi-consumer).
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

/// State shared between the handle and the running browse task
#[derive(Debug, Default)]
struct BrowseState {
    /// Resolved services by DNS-SD full name
    resolved: BTreeMap<String, RawService>,
    /// Types currently browsed on the daemon
    types: BTreeSet<String>,
}

impl BrowseState {
    fn batch(&self) -> DiscoveryBatch {
        self.resolved.values().cloned().collect()
    }

    /// Record a resolved service and return the new full set
    fn resolve(&mut self, fullname: &str, raw: RawService) -> DiscoveryBatch {
        self.resolved.insert(fullname.to_string(), raw);
        self.batch()
    }

    /// Drop a service and return the new full set, or `None` if it was
    /// never resolved.
    fn remove(&mut self, fullname: &str) -> Option<DiscoveryBatch> {
        self.resolved.remove(fullname)?;
        Some(self.batch())
    }

    /// Forget resolved services and hand back the browsed types. Services
    /// must re-announce after a pause to count as present again.
    fn pause(&mut self) -> BTreeSet<String> {
        self.resolved.clear();
        std::mem::take(&mut self.types)
    }
}

type SharedState = Arc<Mutex<BrowseState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, BrowseState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// mdns-sd backed discovery. Browses the DNS-SD meta-query plus a seed list
/// of types, and every type the meta-query turns up.
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
    seed_types: Vec<String>,
    tx: mpsc::Sender<DiscoveryBatch>,
    state: SharedState,
    session: Option<CancellationToken>,
}

impl MdnsDiscovery {
    pub fn new(daemon: ServiceDaemon, seed_types: Vec<String>, tx: mpsc::Sender<DiscoveryBatch>) -> Self {
        Self {
            daemon,
            seed_types,
            tx,
            state: SharedState::default(),
            session: None,
        }
    }
}

impl Discovery for MdnsDiscovery {
    fn start(&mut self) {
        if self.session.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let browser = Browser {
            daemon: self.daemon.clone(),
            state: self.state.clone(),
            tx: self.tx.clone(),
            cancel: cancel.clone(),
        };
        let seeds = self.seed_types.clone();
        tokio::spawn(async move {
            if let Err(e) = browser.run(seeds).await {
                tracing::error!("mDNS browser error: {}", e);
            }
        });

        self.session = Some(cancel);
    }

    fn stop(&mut self) {
        let Some(cancel) = self.session.take() else {
            return;
        };
        cancel.cancel();

        // Stopped here rather than in the task so a quick restart cannot
        // have its fresh browses cancelled by the old session's cleanup
        let types = lock(&self.state).pause();
        for ty in &types {
            if let Err(e) = self.daemon.stop_browse(ty) {
                tracing::debug!("Failed to stop browsing {}: {}", ty, e);
            }
        }
        tracing::info!("mDNS browsing paused ({} types)", types.len());
    }

    fn reset(&mut self) {
        self.stop();
        // A task still winding down keeps its own, now orphaned, state
        self.state = SharedState::default();
        tracing::info!("mDNS discovery state reset");
    }
}

/// One browse session, alive until its token is cancelled
struct Browser {
    daemon: ServiceDaemon,
    state: SharedState,
    tx: mpsc::Sender<DiscoveryBatch>,
    cancel: CancellationToken,
}

impl Browser {
    async fn run(self, seeds: Vec<String>) -> Result<()> {
        tracing::info!("Starting mDNS browser");

        let meta_receiver = self
            .daemon
            .browse(META_QUERY_TYPE)
            .context("Failed to start meta-query browse")?;
        lock(&self.state).types.insert(META_QUERY_TYPE.to_string());

        let mut next_idx = 0usize;
        let mut type_futures: FuturesUnordered<RecvFuture> = FuturesUnordered::new();
        let mut meta_open = true;

        for seed in &seeds {
            if let Some(receiver) = self.browse(seed) {
                type_futures.push(make_recv_future(next_idx, receiver));
                next_idx += 1;
            }
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::info!("mDNS browser shutting down");
                    break;
                }

                // New service types from the meta-query
                event = meta_receiver.recv_async(), if meta_open => {
                    let found = match event {
                        Ok(ServiceEvent::ServiceFound(_, fullname)) => Some(fullname),
                        Ok(ServiceEvent::ServiceResolved(info)) => Some(info.get_fullname().to_string()),
                        Ok(ServiceEvent::SearchStopped(ty)) => {
                            tracing::debug!("Meta-query search stopped: {}", ty);
                            None
                        }
                        Ok(_) => None,
                        Err(e) => {
                            tracing::warn!("Meta-query receiver disconnected: {}", e);
                            meta_open = false;
                            None
                        }
                    };

                    if let Some(service_type) = found {
                        if let Some(receiver) = self.browse(&service_type) {
                            type_futures.push(make_recv_future(next_idx, receiver));
                            next_idx += 1;
                        }
                    }
                }

                Some((idx, rx, result)) = type_futures.next() => {
                    match result {
                        Ok(event) => {
                            if !self.handle_event(event).await {
                                break;
                            }
                            type_futures.push(make_recv_future(idx, rx));
                        }
                        Err(e) => {
                            tracing::warn!("Receiver {} disconnected: {}", idx, e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Start browsing a type unless it is already browsed. Types may come
    /// with or without the ".local." domain.
    fn browse(&self, service_type: &str) -> Option<flume::Receiver<ServiceEvent>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let ty_domain = if service_type.ends_with('.') {
            service_type.to_string()
        } else {
            format!("{}.local.", service_type)
        };

        if !lock(&self.state).types.insert(ty_domain.clone()) {
            return None;
        }

        match self.daemon.browse(&ty_domain) {
            Ok(receiver) => {
                tracing::info!("Browsing service type: {}", ty_domain);
                Some(receiver)
            }
            Err(e) => {
                tracing::error!("Failed to browse {}: {}", ty_domain, e);
                lock(&self.state).types.remove(&ty_domain);
                None
            }
        }
    }

    /// Apply one event to the resolved set and publish it if it changed.
    /// Returns false once the aggregator has gone away.
    async fn handle_event(&self, event: ServiceEvent) -> bool {
        let batch = {
            let mut state = lock(&self.state);
            match event {
                ServiceEvent::ServiceResolved(info) => match convert_service_info(&info) {
                    Some(raw) => {
                        tracing::debug!("Resolved service: {}", info.get_fullname());
                        Some(state.resolve(info.get_fullname(), raw))
                    }
                    None => None,
                },
                ServiceEvent::ServiceRemoved(_ty, fullname) => {
                    let batch = state.remove(&fullname);
                    if batch.is_some() {
                        tracing::debug!("Service removed: {}", fullname);
                    } else {
                        tracing::debug!("Ignoring removal of unknown service {}", fullname);
                    }
                    batch
                }
                ServiceEvent::SearchStopped(ty) => {
                    tracing::debug!("Search stopped: {}", ty);
                    None
                }
                _ => None,
            }
        };

        let Some(batch) = batch else {
            return true;
        };
        if self.cancel.is_cancelled() {
            return true;
        }
        if let Err(e) = self.tx.send(batch).await {
            tracing::error!("Failed to send discovery batch: {}", e);
            return false;
        }
        true
    }
}

/// Split "_http._tcp.local." into ("_http._tcp", Some("local"))
fn split_type_domain(ty_domain: &str) -> (String, Option<String>) {
    let labels: Vec<&str> = ty_domain.trim_end_matches('.').split('.').collect();
    match labels.iter().position(|l| *l == "_tcp" || *l == "_udp") {
        Some(pos) => {
            let domain = labels[pos + 1..].join(".");
            (labels[..=pos].join("."), Some(domain).filter(|d| !d.is_empty()))
        }
        None => (labels.join("."), None),
    }
}

fn instance_name(fullname: &str, ty_domain: &str) -> String {
    fullname
        .strip_suffix(ty_domain)
        .map(|name| name.trim_end_matches('.'))
        .unwrap_or(fullname)
        .to_string()
}

/// Convert an mdns-sd ServiceInfo to a RawService. Services without any
/// address are not resolved yet and are skipped.
fn convert_service_info(info: &ServiceInfo) -> Option<RawService> {
    let addresses: BTreeSet<String> = info
        .get_addresses()
        .iter()
        .map(|addr| addr.to_string())
        .collect();

    if addresses.is_empty() {
        tracing::debug!("Skipping service {} - no addresses yet", info.get_fullname());
        return None;
    }

    let txt: BTreeMap<String, String> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();

    let (service_type, domain) = split_type_domain(info.get_type());
    let hostname = Some(info.get_hostname().to_string()).filter(|h| !h.is_empty());

    Some(RawService {
        name: instance_name(info.get_fullname(), info.get_type()),
        service_type,
        domain,
        hostname,
        addresses,
        port: info.get_port(),
        txt,
    })
}
