use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shared::types::{HostExport, HostSummary, ServiceExport};
use crate::cluster::ClusterId;
use crate::controller::ControllerHandle;

#[derive(Clone)]
pub struct AppState {
    pub controller: ControllerHandle,
}

#[derive(Deserialize)]
pub struct HostQuery {
    /// Case-insensitive search term
    pub q: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/hosts", get(get_hosts))
        .route("/v1/hosts/hash", get(get_hash))
        .route("/v1/hosts/generation", get(get_generation))
        .route("/v1/hosts/:id", get(get_host))
        .route("/v1/hosts/:id/services/:service_type/:name", get(get_service))
        .route("/v1/export", get(get_export))
        .route("/v1/discovery/start", post(start_discovery))
        .route("/v1/discovery/stop", post(stop_discovery))
        .route("/v1/discovery/restart", post(restart_discovery))
        .with_state(state)
}

fn parse_id(id: &str) -> Result<ClusterId, StatusCode> {
    id.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

fn unavailable(e: anyhow::Error) -> StatusCode {
    tracing::error!("Aggregator unavailable: {}", e);
    StatusCode::SERVICE_UNAVAILABLE
}

async fn get_hosts(
    State(state): State<AppState>,
    Query(params): Query<HostQuery>,
) -> Json<Vec<HostSummary>> {
    let snapshot = state.controller.snapshot();
    let hosts = snapshot
        .hosts
        .iter()
        .filter(|h| params.q.as_deref().map_or(true, |q| h.matches(q)))
        .map(|h| h.summary())
        .collect();
    Json(hosts)
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.controller.snapshot().hash.clone()
}

async fn get_generation(State(state): State<AppState>) -> String {
    state.controller.snapshot().generation.to_string()
}

async fn get_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HostExport>, StatusCode> {
    let id = parse_id(&id)?;
    state
        .controller
        .host_for(id)
        .await
        .map_err(unavailable)?
        .map(|h| Json(h.to_export()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_service(
    State(state): State<AppState>,
    Path((id, service_type, name)): Path<(String, String, String)>,
) -> Result<Json<ServiceExport>, StatusCode> {
    let id = parse_id(&id)?;
    state
        .controller
        .service_for(id, service_type, name)
        .await
        .map_err(unavailable)?
        .map(|s| Json(s.to_export()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_export(State(state): State<AppState>) -> Json<Vec<HostExport>> {
    let snapshot = state.controller.snapshot();
    Json(snapshot.hosts.iter().map(|h| h.to_export()).collect())
}

async fn start_discovery(State(state): State<AppState>) -> StatusCode {
    match state.controller.start().await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => unavailable(e),
    }
}

async fn stop_discovery(State(state): State<AppState>) -> StatusCode {
    match state.controller.stop().await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => unavailable(e),
    }
}

async fn restart_discovery(State(state): State<AppState>) -> StatusCode {
    match state.controller.restart().await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => unavailable(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use crate::controller::Controller;
    use crate::discovery::FixtureDiscovery;

    async fn demo_state() -> (AppState, CancellationToken) {
        let (batch_tx, batch_rx) = mpsc::channel(16);
        let controller = Controller::new(FixtureDiscovery::demo(batch_tx), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let (handle, _task) = ControllerHandle::spawn(controller, batch_rx, Duration::from_millis(500), cancel.clone());

        handle.start().await.unwrap();
        handle.subscribe().wait_for(|s| !s.hosts.is_empty()).await.unwrap();
        (AppState { controller: handle }, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_and_search_hosts() {
        let (state, cancel) = demo_state().await;

        let Json(all) = get_hosts(State(state.clone()), Query(HostQuery { q: None })).await;
        assert_eq!(all.len(), 5);

        let Json(found) = get_hosts(State(state.clone()), Query(HostQuery { q: Some("CABIN".to_string()) })).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Home Assistant (Cabin)");

        let Json(by_address) = get_hosts(State(state), Query(HostQuery { q: Some("fd7a".to_string()) })).await;
        assert_eq!(by_address.len(), 1);
        assert_eq!(by_address[0].name, "Mac (Studio)");
        assert_eq!(by_address[0].address, "192.168.1.20");

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_host_and_service() {
        let (state, cancel) = demo_state().await;
        let id = state.controller.snapshot().hosts[3].cluster().id().to_string();

        let Json(host) = get_host(State(state.clone()), Path(id.clone())).await.unwrap();
        assert_eq!(host.name, "nas");
        assert_eq!(host.addresses, vec!["192.168.1.5", "nas.local."]);

        let Json(service) = get_service(
            State(state.clone()),
            Path((id, "_http._tcp".to_string(), "Synology DS920".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(service.url.as_deref(), Some("http://192.168.1.5:5000/webman"));

        assert_eq!(
            get_host(State(state.clone()), Path("not-a-number".to_string())).await.unwrap_err(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_host(State(state), Path("999999".to_string())).await.unwrap_err(),
            StatusCode::NOT_FOUND
        );

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_and_hash() {
        let (state, cancel) = demo_state().await;

        let Json(export) = get_export(State(state.clone())).await;
        assert_eq!(export.len(), 5);
        assert!(export.iter().all(|h| !h.services.is_empty()));

        let hash = get_hash(State(state.clone())).await;
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, state.controller.snapshot().hash);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_endpoint() {
        let (state, cancel) = demo_state().await;
        let before: u64 = get_generation(State(state.clone())).await.parse().unwrap();

        assert_eq!(restart_discovery(State(state.clone())).await, StatusCode::ACCEPTED);
        state
            .controller
            .subscribe()
            .wait_for(|s| s.generation >= before + 2)
            .await
            .unwrap();
        assert_eq!(state.controller.snapshot().hosts.len(), 5);

        cancel.cancel();
    }
}
