//! HTTP control plane for the BLE peripheral simulator.
//!
//! A thin axum layer over [`AdapterController`]:
//!
//! | Route          | Operation                         | Success |
//! |----------------|-----------------------------------|---------|
//! | `GET /health`  | [`AdapterController::health`]     | 200     |
//! | `GET /state`   | [`AdapterController::state`]      | 200     |
//! | `PUT /state`   | [`AdapterController::set_state`]  | 204     |
//! | `POST /events` | [`AdapterController::on_event`]   | 202     |
//! | `GET /config`  | [`AdapterController::config`]     | 200     |
//! | `PUT /config`  | [`AdapterController::set_config`] | 204     |
//!
//! Unknown paths answer 404. Failures are rendered by [`ApiError`].

mod error;
mod routes;

use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use blesim_core::AdapterController;

pub use error::ApiError;

/// Build the control-plane router bound to `controller`.
pub fn router(controller: AdapterController) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/state", get(routes::get_state).put(routes::put_state))
        .route("/events", post(routes::post_event))
        .route("/config", get(routes::get_config).put(routes::put_config))
        .fallback(routes::not_found)
        .with_state(controller)
        .layer(middleware::from_fn(log_requests))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed = ?started.elapsed(),
        "http request"
    );
    response
}

/// Serve the control plane on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    controller: AdapterController,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "control plane listening");

    axum::serve(listener, router(controller))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
