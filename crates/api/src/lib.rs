//! HTTP API for the block harvester.
//!
//! Exposes harvester status, operator actions and the market-history
//! query as JSON over axum.
//!
//! ```ignore
//! use harvester_api::{ServerConfig, serve_with_shutdown};
//!
//! serve_with_shutdown(harvester.clone(), ServerConfig::default(), async {
//!     shutdown_rx.changed().await.ok();
//! })
//! .await?;
//! ```

mod error;
mod handlers;
mod server;

pub use error::ApiError;
pub use handlers::{CandleView, MarketHistoryParams, ProcessedBlock};
pub use server::{ServerConfig, router, serve_with_shutdown};
