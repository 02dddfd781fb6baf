//! HTTP API for the cairn needs-diff service.
//!
//! Provides a [`DiffServer`] exposing an axum router:
//!
//! - `POST /api/upload?hash=<hex>&level=<n>`: store a chunk, answer with
//!   `204 No Content` or `200` and the concatenated missing child hashes
//! - `HEAD /api/chunks/{hash}`: whether a chunk is stored
//! - `GET /api/chunks/{hash}`: read a stored chunk back
//!
//! Errors are JSON bodies of the form `{"error": <code>, "message": <text>}`.

mod error;
mod handlers;


use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use cairn_diff::NeedsDiffService;
use cairn_types::BLOCK_SIZE;
use tokio::net::TcpListener;

pub use error::HttpError;

/// Extra body bytes accepted beyond `BLOCK_SIZE`, so oversized chunks reach
/// the service and get a structured error instead of a bare rejection.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Shared state for all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    pub service: Arc<NeedsDiffService>,
}

/// HTTP front end for a [`NeedsDiffService`].
pub struct DiffServer {
    router: Router,
}

impl DiffServer {
    /// Create a server around `service`.
    pub fn new(service: Arc<NeedsDiffService>) -> Self {
        let router = Self::build_router(AppState { service });
        Self { router }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/api/upload", post(handlers::upload))
            .route(
                "/api/chunks/{hash}",
                get(handlers::get_chunk).head(handlers::head_chunk),
            )
            .layer(DefaultBodyLimit::max(BLOCK_SIZE + BODY_LIMIT_SLACK))
            .with_state(state)
    }

    /// Return the inner [`Router`] (useful for testing with `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on the given TCP address.
    pub async fn serve(self, addr: &str) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr, "diff server listening");
        axum::serve(listener, self.router).await
    }

    /// Serve with graceful shutdown triggered by the given future.
    ///
    /// When `shutdown` completes, the server stops accepting new connections
    /// and waits for in-flight requests to finish.
    pub async fn serve_with_shutdown(
        self,
        addr: &str,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener, e.g. one bound to port 0.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "diff server listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
