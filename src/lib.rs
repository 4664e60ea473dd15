pub mod background;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod proxy;
pub mod queue;
pub mod remote;
pub mod routes;
pub mod state;
pub mod sync;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue};
use sqlx::SqlitePool;
use tokio::sync::{Notify, watch};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::connectivity::{Connectivity, ConnectivityMonitor, HttpProbe, Probe};
use crate::proxy::ForegroundProxy;
use crate::queue::QueueManager;
use crate::remote::{HttpRemote, RemoteApi};
use crate::state::{AppState, SharedState};
use crate::sync::SyncCoordinator;

/// Reported to the page whenever the queue store is not available.
pub const OFFLINE_DISABLED: &str = "offline features disabled";

/// Wire up the background context, connectivity monitor and routes.
///
/// `pool` is `None` when the queue store could not be opened; the service then
/// still forwards live submissions but refuses to queue. Background tasks stop
/// when `shutdown` flips to `true`.
pub async fn build_app(
    config: Config,
    pool: Option<SqlitePool>,
    shutdown: watch::Receiver<bool>,
) -> Result<(Router, SharedState), String> {
    let events = events::channel();
    let remote: Arc<dyn RemoteApi> =
        Arc::new(HttpRemote::new(&config.api_base_url, config.replay_timeout)?);

    let work_pending = Arc::new(Notify::new());
    let queue = pool.map(|pool| {
        let manager = QueueManager::new(pool.clone(), config.csrf_token.clone(), work_pending.clone());
        let coordinator = SyncCoordinator::new(
            pool,
            remote.clone(),
            config.max_attempts,
            config.termination,
            events.clone(),
        );
        let (handle, _task) = background::spawn(manager, coordinator, shutdown.clone());
        handle
    });

    let probe: Option<Arc<dyn Probe>> = if config.probe_interval.is_zero() {
        None
    } else {
        Some(Arc::new(HttpProbe::new(&config.probe_url, config.replay_timeout)?))
    };

    let initial = match &probe {
        Some(probe) => Connectivity::from(probe.is_online().await),
        None => Connectivity::from(config.assume_online),
    };
    tracing::info!("Initial connectivity: {initial:?}");

    let monitor = Arc::new(ConnectivityMonitor::new(initial, events.clone(), queue.clone()));

    if let Some(handle) = &queue {
        background::spawn_scheduler(
            handle.clone(),
            work_pending,
            monitor.subscribe(),
            config.sync_interval,
            shutdown.clone(),
        );
    }

    if let Some(probe) = probe {
        connectivity::spawn_probe(monitor.clone(), probe, config.probe_interval, shutdown.clone());
    }

    let proxy = ForegroundProxy::new(queue, monitor.subscribe(), remote, config.csrf_token.clone());

    let state: SharedState = Arc::new(AppState {
        proxy,
        monitor,
        events,
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(config.max_body_size))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                )),
        )
        .with_state(state.clone());

    Ok((app, state))
}

async fn health() -> &'static str {
    "ok"
}
