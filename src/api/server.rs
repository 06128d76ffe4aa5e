use std::net::SocketAddr;

use axum::{Router, middleware, routing::get, routing::post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info, warn};

use super::{
    services::{create_job, get_task, health, list_history, list_tasks, require_token},
    state::AppState,
};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes with state attached; `/health` is the only unauthenticated one
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/download", post(create_job))
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/history", get(list_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .merge(protected)
        .route("/health", get(health))
        .with_state(state)
        // Content-Encoding is handled here, so handlers see plain JSON
        .layer(ServiceBuilder::new().layer(RequestDecompressionLayer::new()))
}

pub async fn run(address: SocketAddr, state: AppState) -> Result<(), AnyError> {
    let tracker = state.tracker.clone();
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "grabd API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let outstanding = tracker.outstanding();
    if outstanding > 0 {
        warn!(outstanding, "Shutting down with unfinished jobs");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
