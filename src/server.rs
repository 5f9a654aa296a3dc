//! ==============================================================================
//! server.rs - http front door
//! ==============================================================================
//!
//! routes:
//!     POST /cor     device readings in
//!     GET  /dados   recent readings out
//!     GET  /ws      live viewer channel
//!     GET  /health  status
//!     GET  /        viewer page
//!
//! shutdown:
//!     when `shutdown` resolves the listener stops accepting, every viewer
//!     session is closed so upgraded sockets finish, in-flight requests
//!     drain, and finally the store is closed.
//!
//! ==============================================================================

use crate::handlers::{self, AppState};

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::viewer_page))
        .route("/cor", post(handlers::ingest_reading))
        .route("/dados", get(handlers::recent_readings))
        .route("/ws", get(handlers::viewer_socket))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// serve until `shutdown` resolves, then close viewers and the store
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let broadcaster = state.broadcaster.clone();
    let store = state.store.clone();
    let app = router(state);

    info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown requested, closing viewer sessions");
            broadcaster.close_all();
        })
        .await?;

    if let Err(e) = store.close().await {
        warn!(error = %e, "store did not close cleanly");
    }
    info!("relay stopped");
    Ok(())
}

/// resolves on ctrl-c, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
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
}
