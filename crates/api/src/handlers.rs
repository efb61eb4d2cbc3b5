//! Request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use harvester_core::models::{BlockRef, BlockTotal, Candle, Interval};
use harvester_core::ports::{ChainSource, FactStore};
use harvester_core::services::{Harvester, HarvesterStatus, SequencerOutcome};

use crate::error::ApiError;

/// Shared handler state.
pub type AppState<C, S> = Arc<Harvester<C, S>>;

/// Display format of candle and cutoff times.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Responses
// =============================================================================

/// One candle row as served over HTTP.
///
/// Prices and amounts are plain JSON integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandleView {
    pub id: i64,
    pub time: String,
    pub base: String,
    pub quote: String,
    pub open: u128,
    pub high: u128,
    pub low: u128,
    pub close: u128,
    pub base_amount: u128,
    pub quote_amount: u128,
}

impl From<Candle> for CandleView {
    fn from(candle: Candle) -> Self {
        Self {
            id: candle.id,
            time: candle.time.format(TIME_FORMAT).to_string(),
            base: candle.base,
            quote: candle.quote,
            open: candle.values.open,
            high: candle.values.high,
            low: candle.values.low,
            close: candle.values.close,
            base_amount: candle.values.base_amount,
            quote_amount: candle.values.quote_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedBlock {
    pub id: u64,
    pub hash: String,
    pub skipped: bool,
}

// =============================================================================
// Read endpoints
// =============================================================================

/// Health check endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn status<C, S>(
    State(harvester): State<AppState<C, S>>,
) -> Result<Json<HarvesterStatus>, ApiError>
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
{
    Ok(Json(harvester.status().await?))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketHistoryParams {
    pub base: String,
    pub quote: String,
    /// Cutoff, `%Y-%m-%d %H:%M:%S` (UTC) or RFC 3339. Defaults to now.
    pub time: Option<String>,
    pub limit: Option<u32>,
}

pub async fn market_history<C, S>(
    State(harvester): State<AppState<C, S>>,
    Path(interval): Path<String>,
    Query(params): Query<MarketHistoryParams>,
) -> Result<Json<Vec<CandleView>>, ApiError>
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
{
    let interval: Interval = interval.parse()?;
    let cutoff = match params.time.as_deref() {
        Some(raw) => parse_cutoff(raw)?,
        None => Utc::now(),
    };

    let candles = harvester
        .market_history(interval, &params.base, &params.quote, cutoff, params.limit)
        .await?;
    debug!(%interval, rows = candles.len(), "Market history served");

    Ok(Json(candles.into_iter().map(CandleView::from).collect()))
}

fn parse_cutoff(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc)))
        .map_err(|_| ApiError::bad_request(format!("Invalid time '{raw}'")))
}

// =============================================================================
// Operator actions
// =============================================================================

/// Accumulate one block by number; an already stored block is a skip.
pub async fn process_block<C, S>(
    State(harvester): State<AppState<C, S>>,
    Path(number): Path<u64>,
) -> Result<Json<ProcessedBlock>, ApiError>
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
{
    match harvester.add_block(BlockRef::Number(number)).await {
        Ok(block) => {
            info!(block = block.id, "⛓️  Block added on request");
            Ok(Json(ProcessedBlock {
                id: block.id,
                hash: block.hash.to_hex(),
                skipped: false,
            }))
        }
        Err(e) if e.is_already_added() => {
            let hash = match harvester.store().block(number).await {
                Ok(Some(block)) => block.hash.to_hex(),
                _ => String::new(),
            };
            Ok(Json(ProcessedBlock {
                id: number,
                hash,
                skipped: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn sequence_block<C, S>(
    State(harvester): State<AppState<C, S>>,
    Path(id): Path<u64>,
) -> Result<Json<BlockTotal>, ApiError>
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
{
    Ok(Json(harvester.sequence_block_id(id).await?))
}

pub async fn start_sequencer<C, S>(
    State(harvester): State<AppState<C, S>>,
) -> Result<Json<SequencerOutcome>, ApiError>
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
{
    Ok(Json(harvester.start_sequencer().await?))
}

pub async fn integrity_checks<C, S>(
    State(harvester): State<AppState<C, S>>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    C: ChainSource + 'static,
    S: FactStore + 'static,
{
    harvester.integrity_checks().await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
