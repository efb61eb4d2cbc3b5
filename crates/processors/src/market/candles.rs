//! Candle roll-up for one resolution.

use async_trait::async_trait;
use tracing::{debug, instrument};

use harvester_core::error::{BlockIntegrityError, HarvesterResult};
use harvester_core::metrics::record_candle_written;
use harvester_core::models::Interval;
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};
use harvester_core::services::candles::{CandleSource, CandleWrite, plan_window};

/// Recomputes the window of the block being sequenced at one resolution.
///
/// The 1m resolution reads trades of blocks up to the current one; coarser
/// ones read the finer candles already rolled for this block.
pub struct CandleProcessor {
    interval: Interval,
}

impl CandleProcessor {
    pub fn new(interval: Interval) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl BlockProcessor for CandleProcessor {
    fn name(&self) -> &'static str {
        match self.interval {
            Interval::OneMinute => "market_history_1m",
            Interval::FiveMinutes => "market_history_5m",
            Interval::OneHour => "market_history_1h",
            Interval::OneDay => "market_history_1d",
        }
    }

    #[instrument(skip_all, fields(block = ctx.block.id, interval = self.interval.as_str()))]
    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block = ctx.block;
        let interval = self.interval;

        if let Some(source) = interval.source()
            && !ctx.has_rolled(source)
        {
            return Err(BlockIntegrityError::RollupDependency {
                block: block.id,
                interval: interval.as_str(),
                source_interval: source.as_str(),
            }
            .into());
        }

        let start = interval.truncate(block.datetime)?;
        let end = start + interval.duration();

        let sources: Vec<CandleSource> = match interval.source() {
            None => tx
                .trades_in_window(start, end, block.id)
                .await?
                .iter()
                .map(CandleSource::from)
                .collect(),
            Some(source) => tx
                .candles_in_range(source, start, end)
                .await?
                .iter()
                .map(CandleSource::from)
                .collect(),
        };
        let current = tx.candles_at(interval, start).await?;
        let previous = tx.candles_at(interval, start - interval.duration()).await?;

        let writes = plan_window(interval, start, &sources, &current, &previous)?;
        debug!(sources = sources.len(), writes = writes.len(), "Window planned");

        for write in writes {
            let kind = write.kind();
            match write {
                CandleWrite::Insert(candle) | CandleWrite::GapFill(candle) => {
                    tx.insert_candle(&candle).await?;
                }
                CandleWrite::Update(candle) => {
                    tx.update_candle(&candle).await?;
                }
            }
            record_candle_written(interval.as_str(), kind);
        }

        ctx.mark_rolled(interval);
        Ok(())
    }
}
