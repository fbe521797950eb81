use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::{
    rate_limit::{self, RateLimits},
    services::{bat_script, download, health, index},
    state::AppState,
};
use crate::config::Config;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How often idle rate-limit entries are dropped
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

/// Routes with middleware; `/health` is exempt from rate limiting
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/bat", get(bat_script))
        .route("/download", post(download));

    if let Some(limits) = &state.rate_limits {
        router = router.route_layer(middleware::from_fn_with_state(
            Arc::clone(limits),
            rate_limit::enforce,
        ));
    }

    router
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address = config.server.bind_addr();

    info!(
        max_concurrent = config.limits.max_concurrent_downloads,
        max_file_size = %config.limits.max_file_size,
        max_duration_secs = config.limits.max_duration_seconds,
        scratch = %config.scratch.dir.display(),
        "Starting vidgate"
    );

    let state = AppState::from_config(config)
        .await
        .map_err(|e| format!("Failed to prepare scratch directory: {}", e))?;

    if let Some(limits) = &state.rate_limits {
        tokio::spawn(prune_rate_limits(Arc::clone(limits)));
    }

    let orchestrator = Arc::clone(&state.orchestrator);
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "vidgate listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    info!(
        pending = orchestrator.store().pending(),
        "Removing scratch files before exit"
    );
    orchestrator.store().shutdown().await;

    served?;
    Ok(())
}

async fn prune_rate_limits(limits: Arc<RateLimits>) {
    let mut ticker = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
    loop {
        ticker.tick().await;
        limits.prune();
        debug!(tracked = limits.tracked_clients(), "Pruned rate limiter state");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
