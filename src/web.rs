// src/web.rs
use crate::reload::ReloadController;
use anyhow::Result;
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{debug, error, info};

/// Answers a request from the snapshot active when it arrived.
///
/// The snapshot is loaded once, so a reload published while the request is
/// in flight does not affect it. Resolution does blocking file I/O and runs
/// on the blocking pool.
async fn serve_request(State(controller): State<Arc<ReloadController>>, uri: Uri) -> Response {
    let snapshot = controller.current();
    let path = uri.path().to_string();
    debug!(generation = snapshot.generation(), "GET {}", path);

    match tokio::task::spawn_blocking(move || snapshot.respond(&path)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!("Request task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

/// The HTTP surface: every path goes to the active snapshot.
pub fn router(controller: Arc<ReloadController>) -> Router {
    Router::new()
        .fallback(serve_request)
        .with_state(controller)
}

/// Serves on an already bound listener until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    controller: Arc<ReloadController>,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let mut shutdown = shutdown_signal.clone();
    axum::serve(listener, router(controller))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("Web server shutting down gracefully.");
        })
        .await?;

    info!("Web server stopped.");
    Ok(())
}

/// Binds `addr` and serves the asteroid.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_server(
    addr: SocketAddr,
    controller: Arc<ReloadController>,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Web server starting on http://{}", listener.local_addr()?);
    serve(listener, controller, shutdown_signal).await
}
