//! Market bundle.
//!
//! Stores trades from the DEX module and rolls them up into candles.
//!
//! # Indexed Events
//!
//! - `trademodule.TradeCreated` - one immutable trade row
//!
//! # Candles
//!
//! One [`CandleProcessor`] per resolution. Each runs after the resolution
//! it is built from: 1m from trades, 5m from 1m, 1h from 5m, 1d from 1h.

mod candles;
mod events;

use std::sync::Arc;

use harvester_core::models::Interval;
use harvester_core::ports::{BlockProcessor, EventProcessor};

use crate::ProcessorBundle;

pub use candles::CandleProcessor;
pub use events::{TradeCreatedProcessor, TradeDetails, parse_order_type, parse_trade_details};

/// Processor bundle for the trade module and its market history.
pub struct MarketBundle {
    intervals: Vec<Interval>,
}

impl MarketBundle {
    /// Roll up the given resolutions. Order is normalised finest first.
    pub fn new(intervals: &[Interval]) -> Self {
        let mut intervals = intervals.to_vec();
        intervals.sort();
        intervals.dedup();
        Self { intervals }
    }
}

impl ProcessorBundle for MarketBundle {
    fn name(&self) -> &'static str {
        "market"
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        vec![Arc::new(TradeCreatedProcessor)]
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        self.intervals
            .iter()
            .map(|&interval| Arc::new(CandleProcessor::new(interval)) as Arc<dyn BlockProcessor>)
            .collect()
    }

    fn priority(&self) -> i32 {
        10
    }
}
