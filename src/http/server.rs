//! HTTP server for the guarded lookup endpoint.

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::handler::{check_username, AppState};
use crate::error::Result;

/// HTTP server wrapping the throttled endpoint.
pub struct HttpServer {
    addr: SocketAddr,
    state: AppState,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// The application router. Exposed separately so tests can drive it
    /// without binding a socket.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/api/check-username", get(check_username))
            .with_state(state)
    }

    /// Start the server and block until it is shut down.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");
        axum::serve(listener, Self::router(self.state)).await?;
        Ok(())
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server stops accepting connections when the provided signal
    /// resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server with graceful shutdown");
        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(signal)
            .await?;
        Ok(())
    }
}
