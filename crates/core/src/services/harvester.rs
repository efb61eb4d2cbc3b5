//! Harvester orchestrator - drives accumulation and sequencing per block.
//!
//! # Flow
//!
//! 1. `add_block`: fetch a decoded block, prefetch chain state for the
//!    events that need it, then in one transaction store the block, run
//!    every event and block accumulation hook and write the final counters
//! 2. `sequence_block`: in one transaction run every block sequencing hook
//!    against the parent snapshots and store the block's running totals
//! 3. `start_sequencer`: sequence stored blocks in id order up to the first gap

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{
    BlockIntegrityError, BlockRange, DomainError, HarvesterError, HarvesterResult,
};
use crate::metrics::{
    PhaseTimer, record_accumulation_revert, record_block_added, record_block_sequenced,
    record_processor_error, record_sequencer_busy, record_shape_mismatch,
};
use crate::models::{
    Block, BlockCounters, BlockHash, BlockRef, BlockTotal, Candle, ChainBlock, EventPhase,
    Interval, SignerKind,
};
use crate::ports::{
    AddressCodec, BlockAccumulation, BlockProcessor, ChainSource, EventContext, EventProcessor,
    FactStore, FactTx, MarketHistoryQuery, Prefetched, ProcessorRegistry, SequencingContext,
};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the harvester.
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Resolve validator session keys through controller ledgers
    /// (`Staking.Ledger` + `Session.NextKeyFor`) instead of `Session.QueuedKeys`.
    pub legacy_session_lookup: bool,
    /// Status key of the single-flight sequencer flag.
    pub sequencer_flag_key: String,
    /// A sequencer flag not refreshed for this long is taken over.
    pub sequencer_lease: Duration,
    /// Maximum blocks added per harvest step.
    pub harvest_batch_size: u64,
    /// Pause between service rounds.
    pub poll_interval: Duration,
    /// Default and maximum market history page size.
    pub market_history_limit: u32,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            legacy_session_lookup: false,
            sequencer_flag_key: "SEQUENCER_TASK_ID".to_string(),
            sequencer_lease: Duration::from_secs(600),
            harvest_batch_size: 100,
            poll_interval: Duration::from_secs(6),
            market_history_limit: 200,
        }
    }
}

impl HarvesterConfig {
    /// Reject settings the service loop cannot run with.
    pub fn validate(&self) -> HarvesterResult<()> {
        if self.harvest_batch_size == 0 {
            return Err(HarvesterError::ConfigError(
                "harvest batch size must be at least 1".into(),
            ));
        }
        if self.market_history_limit == 0 {
            return Err(HarvesterError::ConfigError(
                "market history limit must be at least 1".into(),
            ));
        }
        if self.sequencer_flag_key.is_empty() {
            return Err(HarvesterError::ConfigError(
                "sequencer flag key is empty".into(),
            ));
        }
        if self.sequencer_lease.is_zero() {
            return Err(HarvesterError::ConfigError(
                "sequencer lease must be positive".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Result of a sequencer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SequencerOutcome {
    /// Another run holds the flag; nothing was touched.
    Busy,
    /// Drained up to the first gap.
    Finished { sequenced: u64, last: Option<u64> },
}

/// Result of walking parent hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub added: u64,
    pub skipped: u64,
    /// Lowest block reached.
    pub last_block: Option<u64>,
    /// Parent hash of the lowest block reached.
    pub next_parent: Option<String>,
}

/// Snapshot of harvesting progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvesterStatus {
    pub harvester_head: Option<u64>,
    pub sequenced_head: Option<u64>,
    /// Missing id ranges still to be harvested.
    pub block_process_queue: Vec<BlockRange>,
}

/// What one service round achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub head: u64,
    pub added: u64,
    pub backfilled: u64,
    pub sequenced: u64,
}

// =============================================================================
// Harvester
// =============================================================================

/// An event selected for accumulation, with its prefetched state.
struct PlannedEvent<'a> {
    event: &'a crate::models::ChainEvent,
    processor: Arc<dyn EventProcessor>,
    prefetched: Prefetched,
}

/// Processors whose accumulation hooks have started for the current block.
#[derive(Default)]
struct Touched {
    events: Vec<Arc<dyn EventProcessor>>,
    blocks: Vec<Arc<dyn BlockProcessor>>,
}

impl Touched {
    fn event(&mut self, processor: &Arc<dyn EventProcessor>) {
        let key = processor.key();
        if !self.events.iter().any(|p| p.key() == key) {
            self.events.push(processor.clone());
        }
    }
}

/// Block harvester.
///
/// Owns no state of its own: everything lives in the fact store, so any
/// operation can be re-invoked after a failure.
pub struct Harvester<C: ChainSource, S: FactStore> {
    config: HarvesterConfig,
    chain: Arc<C>,
    store: Arc<S>,
    registry: Arc<ProcessorRegistry>,
    codec: Arc<dyn AddressCodec>,
}

impl<C: ChainSource, S: FactStore> Harvester<C, S> {
    pub fn new(
        config: HarvesterConfig,
        chain: Arc<C>,
        store: Arc<S>,
        registry: Arc<ProcessorRegistry>,
        codec: Arc<dyn AddressCodec>,
    ) -> Self {
        Self {
            config,
            chain,
            store,
            registry,
            codec,
        }
    }

    pub fn config(&self) -> &HarvesterConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ---- Accumulation -------------------------------------------------------

    /// Fetch and accumulate one block.
    ///
    /// Fails with [`HarvesterError::BlockAlreadyAdded`] when the hash is
    /// already stored; callers treat that as a skip.
    #[instrument(skip_all, fields(block = %block_ref))]
    pub async fn add_block(&self, block_ref: BlockRef) -> HarvesterResult<Block> {
        let hash = self.resolve(block_ref).await?;

        if self.store.block_by_hash(&hash).await?.is_some() {
            return Err(HarvesterError::BlockAlreadyAdded {
                hash: hash.to_hex(),
            });
        }

        let chain_block = self.chain.fetch_block(&hash).await?;
        let _timer = PhaseTimer::new("accumulation");

        // All chain lookups happen before the transaction opens.
        let planned = self.plan_events(&chain_block).await?;

        let mut acc =
            BlockAccumulation::new(block_from_chain(&chain_block), chain_block.logs.clone());
        let mut touched = Touched::default();
        let mut tx = self.store.begin().await?;

        match self
            .accumulate(&chain_block, &planned, &mut acc, tx.as_mut(), &mut touched)
            .await
        {
            Ok(()) => {
                tx.commit().await?;
                record_block_added();
                info!(
                    block = acc.block.id,
                    extrinsics = acc.block.counters.extrinsics,
                    events = acc.block.counters.events,
                    "⛓️  Block added"
                );
                Ok(acc.block)
            }
            Err(e) => {
                error!(block = acc.block.id, error = %e, "❌ Accumulation failed, reverting");
                self.revert(acc.block.id, &touched, tx.as_mut()).await;
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "⚠️  Rollback failed");
                }
                record_accumulation_revert();
                Err(e)
            }
        }
    }

    async fn resolve(&self, block_ref: BlockRef) -> HarvesterResult<BlockHash> {
        Ok(match block_ref {
            BlockRef::Hash(hash) => hash,
            BlockRef::Number(number) => self.chain.block_hash(number).await?,
        })
    }

    fn event_context<'a>(
        &self,
        block: &'a ChainBlock,
        event: &'a crate::models::ChainEvent,
    ) -> EventContext<'a> {
        EventContext {
            block,
            event,
            extrinsic: block.extrinsic_for(event),
            legacy_session_lookup: self.config.legacy_session_lookup,
        }
    }

    /// Select processors for the block's events, skip shape mismatches and
    /// run prefetch lookups.
    async fn plan_events<'a>(&self, block: &'a ChainBlock) -> HarvesterResult<Vec<PlannedEvent<'a>>> {
        let mut planned = Vec::new();

        for event in &block.events {
            let Some(processor) = self.registry.event(&event.module_id, &event.event_id) else {
                continue;
            };

            if !event.matches_shape(processor.shape()) {
                record_shape_mismatch(&event.module_id, &event.event_id);
                debug!(
                    block = block.number,
                    event = event.event_idx,
                    key = %processor.key(),
                    found = ?event.attributes.iter().map(|a| a.type_name.as_str()).collect::<Vec<_>>(),
                    expected = ?processor.shape(),
                    "Event shape mismatch, skipping"
                );
                continue;
            }

            let ctx = self.event_context(block, event);
            let prefetched = processor.prefetch(&ctx, self.chain.as_ref()).await?;
            planned.push(PlannedEvent {
                event,
                processor: processor.clone(),
                prefetched,
            });
        }

        Ok(planned)
    }

    async fn accumulate(
        &self,
        chain_block: &ChainBlock,
        planned: &[PlannedEvent<'_>],
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
        touched: &mut Touched,
    ) -> HarvesterResult<()> {
        let block_id = acc.block.id;

        tx.insert_block(&acc.block).await?;
        tx.insert_extrinsics(block_id, &chain_block.extrinsics)
            .await?;
        tx.insert_events(block_id, &chain_block.events).await?;

        for item in planned {
            touched.event(&item.processor);
            let ctx = self.event_context(chain_block, item.event);
            item.processor
                .accumulation_hook(&ctx, &item.prefetched, acc, tx)
                .await
                .inspect_err(|_| {
                    record_processor_error("accumulation", &item.processor.key().to_string())
                })?;
        }

        for processor in self.registry.blocks() {
            touched.blocks.push(processor.clone());
            processor
                .accumulation_hook(acc, tx)
                .await
                .inspect_err(|_| record_processor_error("accumulation", processor.name()))?;
        }

        tx.update_block_counters(block_id, &acc.block.counters)
            .await?;
        Ok(())
    }

    /// Undo accumulation writes, newest processors first.
    ///
    /// Failures are logged only: the transaction is rolled back right after.
    async fn revert(&self, block_id: u64, touched: &Touched, tx: &mut dyn FactTx) {
        for processor in touched.blocks.iter().rev() {
            if let Err(e) = processor.accumulation_revert(block_id, tx).await {
                warn!(processor = processor.name(), error = %e, "⚠️  Revert failed");
            }
        }
        for processor in touched.events.iter().rev() {
            if let Err(e) = processor.accumulation_revert(block_id, tx).await {
                warn!(key = %processor.key(), error = %e, "⚠️  Revert failed");
            }
        }
    }

    /// Add `amount` blocks walking parent hashes from `start`.
    ///
    /// Blocks already stored are skipped and the walk continues through
    /// their stored parent. Stops after genesis.
    #[instrument(skip_all, fields(start = %start, amount))]
    pub async fn harvest_back(&self, start: BlockRef, amount: u64) -> HarvesterResult<HarvestReport> {
        let mut hash = self.resolve(start).await?;
        let mut report = HarvestReport::default();

        for _ in 0..amount {
            let block = match self.add_block(BlockRef::Hash(hash)).await {
                Ok(block) => {
                    report.added += 1;
                    block
                }
                Err(e) if e.is_already_added() => {
                    report.skipped += 1;
                    self.store.block_by_hash(&hash).await?.ok_or_else(|| {
                        HarvesterError::Internal(format!("block {hash} vanished after add"))
                    })?
                }
                Err(e) => return Err(e),
            };

            report.last_block = Some(block.id);
            report.next_parent = Some(block.parent_hash.to_hex());
            if block.id == 0 {
                report.next_parent = None;
                break;
            }
            hash = block.parent_hash;
        }

        Ok(report)
    }

    /// Walk back from `hash` until a stored block, genesis or `limit`.
    async fn harvest_until_known(&self, mut hash: BlockHash, limit: u64) -> HarvesterResult<u64> {
        let mut added = 0;
        while added < limit {
            match self.add_block(BlockRef::Hash(hash)).await {
                Ok(block) if block.id == 0 => return Ok(added + 1),
                Ok(block) => {
                    added += 1;
                    hash = block.parent_hash;
                }
                Err(e) if e.is_already_added() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    // ---- Sequencing ---------------------------------------------------------

    /// Fold one accumulated block into running state.
    ///
    /// `parent` and `parent_total` must describe block `id - 1`; both are
    /// ignored for genesis, which chains to [`BlockTotal::zero`].
    #[instrument(skip_all, fields(block = block.id))]
    pub async fn sequence_block(
        &self,
        block: &Block,
        parent: Option<&Block>,
        parent_total: Option<&BlockTotal>,
    ) -> HarvesterResult<BlockTotal> {
        let zero = BlockTotal::zero();
        let (parent, parent_total) = match block.parent_id() {
            None => (None, &zero),
            Some(parent_id) => {
                let (Some(parent), Some(parent_total)) = (parent, parent_total) else {
                    return Err(BlockIntegrityError::ParentNotSequenced {
                        block: block.id,
                        parent: parent_id,
                    }
                    .into());
                };
                if parent.id != parent_id || parent.hash != block.parent_hash {
                    return Err(BlockIntegrityError::ParentMismatch {
                        block: block.id,
                        expected: block.parent_hash.to_hex(),
                        found: format!("#{} {}", parent.id, parent.hash),
                    }
                    .into());
                }
                if parent_total.id != parent_id {
                    return Err(BlockIntegrityError::ParentNotSequenced {
                        block: block.id,
                        parent: parent_id,
                    }
                    .into());
                }
                (Some(parent), parent_total)
            }
        };

        let _timer = PhaseTimer::new("sequencing");
        let mut tx = self.store.begin().await?;

        match self
            .run_sequencing(block, parent, parent_total, tx.as_mut())
            .await
        {
            Ok(total) => {
                tx.commit().await?;
                record_block_sequenced();
                debug!(block = block.id, session = total.session_id, "Block sequenced");
                Ok(total)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "⚠️  Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn run_sequencing(
        &self,
        block: &Block,
        parent: Option<&Block>,
        parent_total: &BlockTotal,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<BlockTotal> {
        if tx.block_total(block.id).await?.is_some() {
            return Err(BlockIntegrityError::AlreadySequenced(block.id).into());
        }

        let mut ctx = SequencingContext::new(block, parent, parent_total, self.codec.as_ref());
        for processor in self.registry.blocks() {
            processor
                .sequencing_hook(&mut ctx, tx)
                .await
                .inspect_err(|e| {
                    record_processor_error("sequencing", processor.name());
                    warn!(processor = processor.name(), error = %e, "⚠️  Sequencing hook failed");
                })?;
        }

        let total = ctx.total.take().ok_or_else(|| {
            HarvesterError::Internal(format!("no total produced for block {}", block.id))
        })?;
        tx.insert_block_total(&total).await?;
        Ok(total)
    }

    /// Sequence a stored block by id, loading its parent snapshots.
    pub async fn sequence_block_id(&self, id: u64) -> HarvesterResult<BlockTotal> {
        let block = self
            .store
            .block(id)
            .await?
            .ok_or(DomainError::BlockNotFound(id))?;

        let (parent, parent_total) = match block.parent_id() {
            Some(parent_id) => (
                self.store.block(parent_id).await?,
                self.store.block_total(parent_id).await?,
            ),
            None => (None, None),
        };

        self.sequence_block(&block, parent.as_ref(), parent_total.as_ref())
            .await
    }

    /// Sequence every stored block after the sequenced head, in order,
    /// stopping at the first missing block.
    ///
    /// Guarded by a status flag: a concurrent caller gets
    /// [`SequencerOutcome::Busy`] without touching anything. The flag is
    /// refreshed after every block; one left behind by a dead run is taken
    /// over once `sequencer_lease` has passed.
    pub async fn start_sequencer(&self) -> HarvesterResult<SequencerOutcome> {
        let key = &self.config.sequencer_flag_key;
        let holder = format!("{}:{}", std::process::id(), Utc::now().timestamp_millis());

        if !self
            .store
            .try_acquire_flag(key, &holder, self.config.sequencer_lease)
            .await?
        {
            record_sequencer_busy();
            debug!(flag = %key, "Sequencer busy");
            return Ok(SequencerOutcome::Busy);
        }

        let result = self.drain_sequencer(key, &holder).await;

        if let Err(e) = self.store.release_flag(key, &holder).await {
            error!(flag = %key, error = %e, "❌ Failed to release sequencer flag");
            if result.is_ok() {
                return Err(e.into());
            }
        }

        result
    }

    async fn drain_sequencer(&self, key: &str, holder: &str) -> HarvesterResult<SequencerOutcome> {
        let mut next = match self.store.latest_sequenced_id().await? {
            Some(id) => id + 1,
            None => 0,
        };

        let (mut parent, mut parent_total) = match next.checked_sub(1) {
            Some(parent_id) => (
                self.store.block(parent_id).await?,
                self.store.block_total(parent_id).await?,
            ),
            None => (None, None),
        };

        let mut sequenced = 0;
        let mut last = None;

        while let Some(block) = self.store.block(next).await? {
            let total = self
                .sequence_block(&block, parent.as_ref(), parent_total.as_ref())
                .await?;
            sequenced += 1;
            last = Some(block.id);
            parent = Some(block);
            parent_total = Some(total);
            next += 1;

            if !self.store.refresh_flag(key, holder).await? {
                warn!(flag = %key, last = ?last, "⚠️  Sequencer flag taken over, stopping");
                break;
            }
        }

        if sequenced > 0 {
            info!(sequenced, last = ?last, "⛓️  Blocks sequenced");
        }
        Ok(SequencerOutcome::Finished { sequenced, last })
    }

    // ---- Integrity & status -------------------------------------------------

    /// Report gaps in the stored id range.
    pub async fn integrity_checks(&self) -> HarvesterResult<()> {
        let gaps = self.store.missing_block_ranges().await?;
        if gaps.is_empty() {
            return Ok(());
        }
        warn!(ranges = gaps.len(), "⚠️  Missing blocks detected");
        Err(BlockIntegrityError::MissingBlocks(gaps).into())
    }

    pub async fn status(&self) -> HarvesterResult<HarvesterStatus> {
        Ok(HarvesterStatus {
            harvester_head: self.store.latest_block_id().await?,
            sequenced_head: self.store.latest_sequenced_id().await?,
            block_process_queue: self.store.missing_block_ranges().await?,
        })
    }

    // ---- Market history -----------------------------------------------------

    /// Candles for a pair up to `cutoff`, oldest first.
    ///
    /// `limit` defaults to, and is capped at, the configured page size.
    pub async fn market_history(
        &self,
        interval: Interval,
        base: &str,
        quote: &str,
        cutoff: DateTime<Utc>,
        limit: Option<u32>,
    ) -> HarvesterResult<Vec<Candle>> {
        let query = MarketHistoryQuery {
            interval,
            base: base.to_string(),
            quote: quote.to_string(),
            cutoff,
            limit: page_limit(limit, self.config.market_history_limit),
        };
        Ok(self.store.market_history(&query).await?)
    }

    // ---- Service round ------------------------------------------------------

    /// Catch up with the finalized head, backfill the highest gap, then
    /// sequence.
    pub async fn harvest_round(&self) -> HarvesterResult<RoundReport> {
        let batch = self.config.harvest_batch_size;
        let head = self.chain.finalized_head().await?;
        let added = self.harvest_until_known(head.hash, batch).await?;

        let mut backfilled = 0;
        if let Some(gap) = self.store.missing_block_ranges().await?.last().copied() {
            let amount = (gap.to - gap.from + 1).min(batch);
            debug!(from = gap.from, to = gap.to, amount, "Backfilling gap");
            backfilled = self
                .harvest_back(BlockRef::Number(gap.to), amount)
                .await?
                .added;
        }

        let sequenced = match self.start_sequencer().await? {
            SequencerOutcome::Finished { sequenced, .. } => sequenced,
            SequencerOutcome::Busy => 0,
        };

        Ok(RoundReport {
            head: head.number,
            added,
            backfilled,
            sequenced,
        })
    }
}

fn page_limit(requested: Option<u32>, max: u32) -> u32 {
    requested.unwrap_or(max).min(max)
}

/// Block row with the counters derivable from the raw block.
///
/// Account, session, contract and log counters are left to processors.
fn block_from_chain(chain_block: &ChainBlock) -> Block {
    let mut counters = BlockCounters::default();

    for extrinsic in &chain_block.extrinsics {
        counters.extrinsics += 1;
        if extrinsic.success {
            counters.extrinsics_success += 1;
        } else {
            counters.extrinsics_error += 1;
        }
        match &extrinsic.signer {
            Some(signer) => {
                counters.extrinsics_signed += 1;
                match signer.kind {
                    SignerKind::Id => counters.extrinsics_signedby_address += 1,
                    SignerKind::Index => counters.extrinsics_signedby_index += 1,
                }
            }
            None => counters.extrinsics_unsigned += 1,
        }
    }

    for event in &chain_block.events {
        counters.events += 1;
        if event.module_id == "system" {
            counters.events_system += 1;
        } else {
            counters.events_module += 1;
        }
        match event.phase {
            EventPhase::ApplyExtrinsic => counters.events_extrinsic += 1,
            EventPhase::Finalization => counters.events_finalization += 1,
            EventPhase::Initialization => {}
        }
    }

    Block {
        id: chain_block.number,
        hash: chain_block.hash,
        parent_hash: chain_block.parent_hash,
        state_root: chain_block.state_root,
        extrinsics_root: chain_block.extrinsics_root,
        datetime: chain_block.datetime,
        spec_version: chain_block.spec_version,
        counters,
    }
}

// =============================================================================
// HarvesterService
// =============================================================================

/// Long-running harvest loop.
pub struct HarvesterService<C: ChainSource, S: FactStore> {
    harvester: Arc<Harvester<C, S>>,
}

impl<C: ChainSource, S: FactStore> HarvesterService<C, S> {
    pub fn new(harvester: Arc<Harvester<C, S>>) -> Self {
        Self { harvester }
    }

    /// Run harvest rounds until shutdown.
    ///
    /// Failed rounds back off exponentially from 500 ms up to 30 s.
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> HarvesterResult<()> {
        const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
        const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

        info!("⛓️  Starting harvester");
        let mut retry_delay = INITIAL_RETRY_DELAY;

        loop {
            if *shutdown_rx.borrow() {
                debug!("Shutdown requested");
                return Err(HarvesterError::ShutdownRequested);
            }

            let wait = match self.harvester.harvest_round().await {
                Ok(report) => {
                    retry_delay = INITIAL_RETRY_DELAY;
                    if report.added + report.backfilled + report.sequenced > 0 {
                        info!(
                            head = report.head,
                            added = report.added,
                            backfilled = report.backfilled,
                            sequenced = report.sequenced,
                            "⛓️  Harvest round complete"
                        );
                    }
                    self.harvester.config().poll_interval
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_ms = retry_delay.as_millis(),
                        "⚠️  Harvest round failed, retrying..."
                    );
                    let wait = retry_delay;
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                    wait
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return Err(HarvesterError::ShutdownRequested);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CallParam, ChainEvent, ChainExtrinsic, EventAttribute, Signer,
    };

    fn extrinsic(idx: u32, signer: Option<SignerKind>, success: bool) -> ChainExtrinsic {
        ChainExtrinsic {
            extrinsic_idx: idx,
            module_id: "balances".into(),
            call_id: "transfer".into(),
            signer: signer.map(|kind| Signer {
                address: "aa".repeat(32),
                kind,
            }),
            success,
            params: vec![CallParam {
                name: "value".into(),
                type_name: "Balance".into(),
                value: serde_json::json!(1),
            }],
        }
    }

    fn event(idx: u32, module: &str, phase: EventPhase) -> ChainEvent {
        ChainEvent {
            event_idx: idx,
            phase,
            extrinsic_idx: None,
            module_id: module.into(),
            event_id: "Something".into(),
            attributes: vec![EventAttribute {
                type_name: "u32".into(),
                value: serde_json::json!(0),
            }],
        }
    }

    // Test critique: les compteurs dérivés du bloc brut sont exacts
    #[test]
    fn test_block_from_chain_counters() {
        let chain_block = ChainBlock {
            number: 5,
            hash: BlockHash([5; 32]),
            parent_hash: BlockHash([4; 32]),
            state_root: BlockHash([0; 32]),
            extrinsics_root: BlockHash([0; 32]),
            datetime: DateTime::<Utc>::UNIX_EPOCH,
            spec_version: 1,
            extrinsics: vec![
                extrinsic(0, None, true),
                extrinsic(1, Some(SignerKind::Id), true),
                extrinsic(2, Some(SignerKind::Index), false),
            ],
            events: vec![
                event(0, "system", EventPhase::ApplyExtrinsic),
                event(1, "balances", EventPhase::ApplyExtrinsic),
                event(2, "session", EventPhase::Finalization),
                event(3, "system", EventPhase::Initialization),
            ],
            logs: vec![],
        };

        let block = block_from_chain(&chain_block);
        let c = block.counters;
        assert_eq!(block.id, 5);
        assert_eq!(c.extrinsics, 3);
        assert_eq!((c.extrinsics_success, c.extrinsics_error), (2, 1));
        assert_eq!((c.extrinsics_signed, c.extrinsics_unsigned), (2, 1));
        assert_eq!(
            (c.extrinsics_signedby_address, c.extrinsics_signedby_index),
            (1, 1)
        );
        assert_eq!(c.events, 4);
        assert_eq!((c.events_system, c.events_module), (2, 2));
        assert_eq!((c.events_extrinsic, c.events_finalization), (2, 1));
        // Laissés aux processors
        assert_eq!(c.logs, 0);
        assert_eq!(c.accounts_new, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(HarvesterConfig::default().validate().is_ok());

        let config = HarvesterConfig {
            harvest_batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarvesterError::ConfigError(_))
        ));

        let config = HarvesterConfig {
            sequencer_lease: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarvesterError::ConfigError(_))
        ));
    }

    #[test]
    fn test_page_limit_defaults_and_caps() {
        assert_eq!(page_limit(None, 200), 200);
        assert_eq!(page_limit(Some(50), 200), 50);
        assert_eq!(page_limit(Some(5000), 200), 200);
    }
}
