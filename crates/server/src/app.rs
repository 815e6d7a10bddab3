//! Axum app: shared state, router and the serve loop.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use subrelay_client::Relay;
use tokio::net::TcpListener;

use crate::routes;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
}

/// Builds the router for all public routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::meta::index))
        .route("/health", get(routes::meta::health))
        .route("/sub", get(routes::sub::handler))
        .route("/convert", get(routes::convert::handler))
        .route("/register", post(routes::register::handler))
        .route("/clash", get(routes::legacy::handler))
        .with_state(state)
}

/// Serve on an existing listener until ctrl-c. Tests bind `127.0.0.1:0` and pass the listener in.
pub async fn serve_on_listener(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "subrelay listening");

    axum::serve(listener, router(Arc::new(state)))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await
}
