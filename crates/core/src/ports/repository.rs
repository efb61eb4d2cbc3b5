//! Port traits for the fact store.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (e.g., `harvester-storage`).
//!
//! All mutations go through a [`FactTx`]: one transaction per `add_block`
//! and one per `sequence_block`. [`FactStore`] only offers reads outside a
//! transaction, plus the sequencer status flag.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{BlockRange, StorageResult};
use crate::models::{
    Account, AccountIndex, AuditKind, AuditRecord, Block, BlockCounters, BlockHash, BlockTotal,
    Candle, ChainEvent, ChainExtrinsic, Collective, Contract, DemocracyProposal,
    DemocracyReferendum, Interval, Log, Motion, MotionVote, NewCandle, Session, SessionNominator,
    SessionTotal, SessionValidator, Trade, TreasuryProposal,
};

// =============================================================================
// Filter Types
// =============================================================================

/// Page of candles for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketHistoryQuery {
    pub interval: Interval,
    pub base: String,
    pub quote: String,
    /// Only rows with `time <= cutoff`.
    pub cutoff: DateTime<Utc>,
    pub limit: u32,
}

/// Session rows created together at a rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord<'a> {
    pub session: &'a Session,
    pub validators: &'a [SessionValidator],
    pub nominators: &'a [SessionNominator],
}

// =============================================================================
// Transactional Handle
// =============================================================================

/// One open store transaction.
///
/// Dropping a handle without calling [`FactTx::commit`] discards its writes.
#[async_trait]
pub trait FactTx: Send {
    // ---- Blocks -------------------------------------------------------------

    async fn insert_block(&mut self, block: &Block) -> StorageResult<()>;

    async fn update_block_counters(
        &mut self,
        block_id: u64,
        counters: &BlockCounters,
    ) -> StorageResult<()>;

    async fn insert_extrinsics(
        &mut self,
        block_id: u64,
        extrinsics: &[ChainExtrinsic],
    ) -> StorageResult<()>;

    async fn insert_events(&mut self, block_id: u64, events: &[ChainEvent]) -> StorageResult<()>;

    async fn insert_logs(&mut self, logs: &[Log]) -> StorageResult<()>;

    async fn delete_logs(&mut self, block_id: u64) -> StorageResult<u64>;

    async fn block_total(&mut self, block_id: u64) -> StorageResult<Option<BlockTotal>>;

    async fn insert_block_total(&mut self, total: &BlockTotal) -> StorageResult<()>;

    // ---- Audits -------------------------------------------------------------

    async fn insert_audit(&mut self, audit: &AuditRecord) -> StorageResult<()>;

    /// Audits of `kind` for a block, ordered by event index.
    async fn audits(&mut self, kind: AuditKind, block_id: u64)
    -> StorageResult<Vec<AuditRecord>>;

    async fn delete_audits(&mut self, kind: AuditKind, block_id: u64) -> StorageResult<u64>;

    // ---- Accounts -----------------------------------------------------------

    async fn account(&mut self, id: &str) -> StorageResult<Option<Account>>;

    async fn upsert_account(&mut self, account: &Account) -> StorageResult<()>;

    async fn account_index(&mut self, id: u32) -> StorageResult<Option<AccountIndex>>;

    /// Indices currently assigned to `account_id`.
    async fn account_indices_for(&mut self, account_id: &str)
    -> StorageResult<Vec<AccountIndex>>;

    async fn upsert_account_index(&mut self, index: &AccountIndex) -> StorageResult<()>;

    // ---- Democracy ----------------------------------------------------------

    async fn democracy_proposal(&mut self, id: u32) -> StorageResult<Option<DemocracyProposal>>;

    async fn upsert_democracy_proposal(&mut self, proposal: &DemocracyProposal)
    -> StorageResult<()>;

    async fn referendum(&mut self, id: u32) -> StorageResult<Option<DemocracyReferendum>>;

    async fn upsert_referendum(&mut self, referendum: &DemocracyReferendum) -> StorageResult<()>;

    // ---- Collective motions -------------------------------------------------

    /// First motion with `motion_hash` that is neither disapproved nor executed.
    async fn open_motion(
        &mut self,
        collective: Collective,
        motion_hash: &str,
    ) -> StorageResult<Option<Motion>>;

    async fn upsert_motion(&mut self, motion: &Motion) -> StorageResult<()>;

    async fn motion_vote(
        &mut self,
        collective: Collective,
        proposal_id: u32,
        account_id: &str,
    ) -> StorageResult<Option<MotionVote>>;

    async fn upsert_motion_vote(&mut self, vote: &MotionVote) -> StorageResult<()>;

    // ---- Treasury -----------------------------------------------------------

    /// Proposal `id` if it is still awaiting a decision.
    async fn open_treasury_proposal(&mut self, id: u32)
    -> StorageResult<Option<TreasuryProposal>>;

    async fn upsert_treasury_proposal(&mut self, proposal: &TreasuryProposal)
    -> StorageResult<()>;

    // ---- Sessions -----------------------------------------------------------

    async fn insert_session(&mut self, record: SessionRecord<'_>) -> StorageResult<()>;

    async fn session(&mut self, id: u32) -> StorageResult<Option<Session>>;

    async fn sessions_created_at(&mut self, block_id: u64) -> StorageResult<Vec<Session>>;

    /// Delete sessions created at a block, nominators and validators first.
    async fn delete_sessions_created_at(&mut self, block_id: u64) -> StorageResult<u64>;

    async fn upsert_session_total(&mut self, total: &SessionTotal) -> StorageResult<()>;

    // ---- Contracts ----------------------------------------------------------

    async fn insert_contract(&mut self, contract: &Contract) -> StorageResult<()>;

    async fn delete_contracts_created_at(&mut self, block_id: u64) -> StorageResult<u64>;

    // ---- Market -------------------------------------------------------------

    async fn insert_trade(&mut self, trade: &Trade) -> StorageResult<()>;

    async fn delete_trades(&mut self, block_id: u64) -> StorageResult<u64>;

    /// Trades of blocks timestamped in `[from, to)` with id `<= max_block`,
    /// ordered by `(block_id, event_idx)`.
    async fn trades_in_window(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_block: u64,
    ) -> StorageResult<Vec<Trade>>;

    /// Candles with `time` in `[from, to)`, ordered by `(time, id)`.
    async fn candles_in_range(
        &mut self,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Candle>>;

    /// Candles whose window starts exactly at `time`.
    async fn candles_at(&mut self, interval: Interval, time: DateTime<Utc>)
    -> StorageResult<Vec<Candle>>;

    /// Insert a candle and return its id.
    async fn insert_candle(&mut self, candle: &NewCandle) -> StorageResult<i64>;

    async fn update_candle(&mut self, candle: &Candle) -> StorageResult<()>;

    // ---- Lifecycle ----------------------------------------------------------

    async fn commit(self: Box<Self>) -> StorageResult<()>;

    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}

// =============================================================================
// Store
// =============================================================================

/// Fact store entry point.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> StorageResult<Box<dyn FactTx>>;

    async fn block(&self, id: u64) -> StorageResult<Option<Block>>;

    async fn block_by_hash(&self, hash: &BlockHash) -> StorageResult<Option<Block>>;

    async fn block_total(&self, id: u64) -> StorageResult<Option<BlockTotal>>;

    /// Highest stored block id.
    async fn latest_block_id(&self) -> StorageResult<Option<u64>>;

    /// Highest block id with a total.
    async fn latest_sequenced_id(&self) -> StorageResult<Option<u64>>;

    /// Ids in `[0, latest_block_id]` with no block row, as inclusive ranges.
    async fn missing_block_ranges(&self) -> StorageResult<Vec<BlockRange>>;

    /// Set status flag `key` to `value` if it is currently unset, or if its
    /// holder has not refreshed it for longer than `lease`.
    ///
    /// Returns `false` when a live holder already set it.
    async fn try_acquire_flag(
        &self,
        key: &str,
        value: &str,
        lease: Duration,
    ) -> StorageResult<bool>;

    /// Bump the refresh time of flag `key` while `value` still holds it.
    ///
    /// Returns `false` once the flag was taken over.
    async fn refresh_flag(&self, key: &str, value: &str) -> StorageResult<bool>;

    /// Clear status flag `key` if `value` still holds it.
    async fn release_flag(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Candles for one pair, ordered by id ascending.
    async fn market_history(&self, query: &MarketHistoryQuery) -> StorageResult<Vec<Candle>>;
}
