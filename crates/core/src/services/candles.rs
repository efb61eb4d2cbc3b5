//! Candle window planning.
//!
//! Given the source rows of one window (raw trades for 1m, finer candles
//! otherwise), the rows already stored for that window and the rows of the
//! window just before it, [`plan_window`] decides which candles to insert,
//! update or gap-fill. It performs no I/O, so re-running it over the same
//! inputs always yields the same writes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::error::{DomainError, DomainResult};
use crate::models::{Candle, Interval, NewCandle, Ohlcv, Trade};

/// One row feeding a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleSource {
    pub base: String,
    pub quote: String,
    pub values: Ohlcv,
}

impl From<&Trade> for CandleSource {
    fn from(trade: &Trade) -> Self {
        Self {
            base: trade.base.clone(),
            quote: trade.quote.clone(),
            values: Ohlcv {
                open: trade.price,
                high: trade.price,
                low: trade.price,
                close: trade.price,
                base_amount: trade.base_amount,
                quote_amount: trade.quote_amount,
            },
        }
    }
}

impl From<&Candle> for CandleSource {
    fn from(candle: &Candle) -> Self {
        Self {
            base: candle.base.clone(),
            quote: candle.quote.clone(),
            values: candle.values,
        }
    }
}

/// A write decided by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandleWrite {
    /// First activity of a pair in this window.
    Insert(NewCandle),
    /// Stored row recomputed from the whole window.
    Update(Candle),
    /// Idle window after an active one: flat row at the previous close.
    GapFill(NewCandle),
}

impl CandleWrite {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::GapFill(_) => "gap_fill",
        }
    }
}

/// Fold sources in order: first open, last close, extrema, checked sums.
fn aggregate(acc: &mut Ohlcv, next: &Ohlcv, pair: &(String, String)) -> DomainResult<()> {
    let overflow = |what: &str| {
        DomainError::ArithmeticOverflow(format!("{what} of {}/{}", pair.0, pair.1))
    };
    acc.high = acc.high.max(next.high);
    acc.low = acc.low.min(next.low);
    acc.close = next.close;
    acc.base_amount = acc
        .base_amount
        .checked_add(next.base_amount)
        .ok_or_else(|| overflow("base_amount"))?;
    acc.quote_amount = acc
        .quote_amount
        .checked_add(next.quote_amount)
        .ok_or_else(|| overflow("quote_amount"))?;
    Ok(())
}

/// Plan the writes for the `interval` window starting at `window_start`.
///
/// * `sources` - rows inside the window, already in underlying order
///   (`(block_id, event_idx)` for trades, `(time, id)` for candles)
/// * `current` - rows stored at `window_start`
/// * `previous` - rows stored at `window_start - interval`
pub fn plan_window(
    interval: Interval,
    window_start: DateTime<Utc>,
    sources: &[CandleSource],
    current: &[Candle],
    previous: &[Candle],
) -> DomainResult<Vec<CandleWrite>> {
    let mut groups: BTreeMap<(String, String), Ohlcv> = BTreeMap::new();
    for source in sources {
        let pair = (source.base.clone(), source.quote.clone());
        match groups.get_mut(&pair) {
            Some(acc) => aggregate(acc, &source.values, &pair)?,
            None => {
                groups.insert(pair, source.values);
            }
        }
    }

    let stored: BTreeMap<(&str, &str), &Candle> = current
        .iter()
        .rev()
        .map(|c| (c.pair(), c))
        .collect();

    let mut writes = Vec::with_capacity(groups.len());
    for ((base, quote), values) in &groups {
        match stored.get(&(base.as_str(), quote.as_str())) {
            Some(existing) => writes.push(CandleWrite::Update(Candle {
                values: *values,
                ..(*existing).clone()
            })),
            None => writes.push(CandleWrite::Insert(NewCandle {
                interval,
                time: window_start,
                base: base.clone(),
                quote: quote.clone(),
                values: *values,
            })),
        }
    }

    let mut carried = BTreeSet::new();
    for prev in previous {
        let pair = prev.pair();
        let active = groups.contains_key(&(pair.0.to_string(), pair.1.to_string()));
        if active || stored.contains_key(&pair) || !carried.insert(pair) {
            continue;
        }
        writes.push(CandleWrite::GapFill(NewCandle {
            interval,
            time: window_start,
            base: prev.base.clone(),
            quote: prev.quote.clone(),
            values: Ohlcv::flat(prev.values.close),
        }));
    }

    Ok(writes)
}
