use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use crate::cluster::ClusterId;
use crate::discovery::{Discovery, DiscoveryBatch};
use crate::host::Host;
use crate::service::Service;
use super::state::{Controller, Snapshot};

/// Commands sent to the aggregator task
#[derive(Debug)]
pub enum ControlCommand {
    Start,
    Stop,
    Restart,
    LookupHost(ClusterId, oneshot::Sender<Option<Host>>),
    LookupService {
        cluster: ClusterId,
        service_type: String,
        name: String,
        reply: oneshot::Sender<Option<Service>>,
    },
}

/// Handle to the aggregator task. Snapshots are read straight from the
/// watch channel; everything that touches the registry goes through the task.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControlCommand>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl ControllerHandle {
    /// Spawn the aggregator task owning `controller`. Discovery batches
    /// arrive on `batches`; `restart_delay` separates a restart's reset
    /// from its start.
    pub fn spawn<D: Discovery + 'static>(
        controller: Controller<D>,
        batches: mpsc::Receiver<DiscoveryBatch>,
        restart_delay: Duration,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<ControlCommand>(64);
        let snapshots = controller.subscribe();
        let task = tokio::spawn(run(controller, rx, batches, restart_delay, cancel));

        (Self { tx, snapshots }, task)
    }

    pub async fn start(&self) -> Result<()> {
        self.tx.send(ControlCommand::Start).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.tx.send(ControlCommand::Stop).await?;
        Ok(())
    }

    /// Full reset followed by a delayed start
    pub async fn restart(&self) -> Result<()> {
        self.tx.send(ControlCommand::Restart).await?;
        Ok(())
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub async fn host_for(&self, cluster: ClusterId) -> Result<Option<Host>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ControlCommand::LookupHost(cluster, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn service_for(&self, cluster: ClusterId, service_type: String, name: String) -> Result<Option<Service>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ControlCommand::LookupService {
            cluster,
            service_type,
            name,
            reply,
        }).await?;
        Ok(rx.await?)
    }
}

async fn sleep_until_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Aggregator event loop. The only place the controller is touched.
async fn run<D: Discovery>(
    mut controller: Controller<D>,
    mut commands: mpsc::Receiver<ControlCommand>,
    mut batches: mpsc::Receiver<DiscoveryBatch>,
    restart_delay: Duration,
    cancel: CancellationToken,
) {
    let mut pending_start: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                controller.stop(Instant::now().into_std());
                tracing::info!("Aggregator shutting down");
                break;
            }

            Some(command) = commands.recv() => {
                match command {
                    ControlCommand::Start => {
                        pending_start = None;
                        controller.start(Instant::now().into_std());
                    }
                    ControlCommand::Stop => {
                        pending_start = None;
                        controller.stop(Instant::now().into_std());
                    }
                    ControlCommand::Restart => {
                        controller.restart(Instant::now().into_std());
                        pending_start = Some(Instant::now() + restart_delay);
                    }
                    ControlCommand::LookupHost(cluster, reply) => {
                        let _ = reply.send(controller.lookup_host(cluster));
                    }
                    ControlCommand::LookupService { cluster, service_type, name, reply } => {
                        let _ = reply.send(controller.lookup_service(cluster, &service_type, &name));
                    }
                }
            }

            Some(batch) = batches.recv() => {
                controller.apply_batch(batch, Utc::now());
            }

            _ = sleep_until_pending(pending_start), if pending_start.is_some() => {
                pending_start = None;
                controller.start(Instant::now().into_std());
            }
        }
    }
}
