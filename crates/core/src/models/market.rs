//! Trades and market history candles.

use std::str::FromStr;

use chrono::{DateTime, Duration, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

// =============================================================================
// Trades
// =============================================================================

/// One matched trade. Keyed by `trade_hash`; never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_hash: String,
    pub block_id: u64,
    pub extrinsic_idx: Option<u32>,
    pub event_idx: u32,
    pub base: String,
    pub quote: String,
    pub buyer: String,
    pub seller: String,
    pub maker: String,
    pub taker: String,
    /// 0 = buy, 1 = sell.
    pub otype: i16,
    #[serde(with = "super::u128_string")]
    pub price: u128,
    #[serde(with = "super::u128_string")]
    pub base_amount: u128,
    #[serde(with = "super::u128_string")]
    pub quote_amount: u128,
}

// =============================================================================
// Intervals
// =============================================================================

/// Candle resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Finest first.
    pub const ALL: [Interval; 4] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::OneHour,
        Self::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }

    pub fn duration(&self) -> TimeDelta {
        match self {
            Self::OneMinute => Duration::minutes(1),
            Self::FiveMinutes => Duration::minutes(5),
            Self::OneHour => Duration::hours(1),
            Self::OneDay => Duration::days(1),
        }
    }

    /// The resolution this one is rolled up from. `None` means raw trades.
    pub fn source(&self) -> Option<Interval> {
        match self {
            Self::OneMinute => None,
            Self::FiveMinutes => Some(Self::OneMinute),
            Self::OneHour => Some(Self::FiveMinutes),
            Self::OneDay => Some(Self::OneHour),
        }
    }

    /// Start of the window containing `t`.
    ///
    /// Fails for timestamps outside the nanosecond range chrono can round.
    pub fn truncate(&self, t: DateTime<Utc>) -> DomainResult<DateTime<Utc>> {
        // Every resolution divides a day, so epoch-aligned rounding
        // matches wall-clock boundaries in UTC.
        t.duration_trunc(self.duration()).map_err(|e| {
            DomainError::ValidationError(format!("cannot align {t} to {self} window: {e}"))
        })
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::OneMinute => "data_market_history_1m",
            Self::FiveMinutes => "data_market_history_5m",
            Self::OneHour => "data_market_history_1h",
            Self::OneDay => "data_market_history_1d",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "1h" => Ok(Self::OneHour),
            "1d" => Ok(Self::OneDay),
            other => Err(DomainError::ValidationError(format!(
                "Unknown interval '{other}', expected one of 1m, 5m, 1h, 1d"
            ))),
        }
    }
}

// =============================================================================
// Candles
// =============================================================================

/// Open/high/low/close plus traded volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub open: u128,
    pub high: u128,
    pub low: u128,
    pub close: u128,
    pub base_amount: u128,
    pub quote_amount: u128,
}

impl Ohlcv {
    /// A zero-volume bar pinned at `price`.
    pub fn flat(price: u128) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            base_amount: 0,
            quote_amount: 0,
        }
    }
}

/// A candle row not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCandle {
    pub interval: Interval,
    pub time: DateTime<Utc>,
    pub base: String,
    pub quote: String,
    pub values: Ohlcv,
}

/// A stored market history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    pub id: i64,
    pub interval: Interval,
    pub time: DateTime<Utc>,
    pub base: String,
    pub quote: String,
    pub values: Ohlcv,
}

impl Candle {
    pub fn pair(&self) -> (&str, &str) {
        (&self.base, &self.quote)
    }
}
