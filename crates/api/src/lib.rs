//! HTTP service for the Fameish backend: the scheduler-triggered winner
//! rotation endpoint and the signup verification endpoint.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
pub mod routes;
pub mod signup;
pub mod state;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/winner/new", get(routes::rotate_winner))
        .route("/api/user", post(routes::signup))
        .with_state(state)
}

pub async fn start_server() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::load();
    let port = config.port;
    let state = AppState::from_config(config);

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("Environment misconfigured!");
    info!(port, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server crashed");
}

async fn shutdown_signal() {
    signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    info!("shutting down");
}
