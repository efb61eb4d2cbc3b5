//! HTTP server.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use harvester_core::ports::{ChainSource, FactStore};
use harvester_core::services::Harvester;

use crate::handlers;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Mount the `POST` operator routes.
    pub enable_admin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            enable_admin: false,
        }
    }
}

/// Build the router.
///
/// Read routes are always mounted; operator routes only with
/// `enable_admin`.
pub fn router<C, S>(harvester: Arc<Harvester<C, S>>, config: &ServerConfig) -> Router
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
{
    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status::<C, S>))
        .route(
            "/market-history/{interval}",
            get(handlers::market_history::<C, S>),
        );

    if config.enable_admin {
        app = app
            .route("/blocks/{number}", post(handlers::process_block::<C, S>))
            .route(
                "/blocks/{number}/sequence",
                post(handlers::sequence_block::<C, S>),
            )
            .route("/sequencer", post(handlers::start_sequencer::<C, S>))
            .route("/integrity", get(handlers::integrity_checks::<C, S>));
    }

    app.with_state(harvester)
}

/// Start the server with graceful shutdown support.
pub async fn serve_with_shutdown<C, S, F>(
    harvester: Arc<Harvester<C, S>>,
    config: ServerConfig,
    shutdown_signal: F,
) -> Result<(), std::io::Error>
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(harvester, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(admin = config.enable_admin, "⚡ API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}
