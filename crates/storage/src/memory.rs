//! In-memory fact store.
//!
//! Keeps every table in RAM behind one async mutex. A transaction holds the
//! lock for its whole lifetime and restores a snapshot unless committed, so
//! writers are serialized and an abandoned transaction leaves no trace.
//! Useful for tests and short-lived harvesters that don't need persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use harvester_core::error::{BlockRange, StorageError, StorageResult};
use harvester_core::models::{
    Account, AccountIndex, AuditKind, AuditRecord, Block, BlockCounters, BlockHash, BlockTotal,
    Candle, ChainEvent, ChainExtrinsic, Collective, Contract, DemocracyProposal,
    DemocracyReferendum, Interval, Log, Motion, MotionVote, NewCandle, Session, SessionNominator,
    SessionTotal, SessionValidator, Trade, TreasuryProposal,
};
use harvester_core::ports::{FactStore, FactTx, MarketHistoryQuery, SessionRecord};

// =============================================================================
// State
// =============================================================================

/// Every table of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub blocks: BTreeMap<u64, Block>,
    pub extrinsics: BTreeMap<(u64, u32), ChainExtrinsic>,
    pub events: BTreeMap<(u64, u32), ChainEvent>,
    pub logs: BTreeMap<(u64, u32), Log>,
    pub totals: BTreeMap<u64, BlockTotal>,
    pub audits: Vec<AuditRecord>,
    pub accounts: BTreeMap<String, Account>,
    pub account_indices: BTreeMap<u32, AccountIndex>,
    pub democracy_proposals: BTreeMap<u32, DemocracyProposal>,
    pub referenda: BTreeMap<u32, DemocracyReferendum>,
    pub motions: BTreeMap<(Collective, u32), Motion>,
    pub votes: BTreeMap<(Collective, u32, String), MotionVote>,
    pub treasury_proposals: BTreeMap<u32, TreasuryProposal>,
    pub sessions: BTreeMap<u32, Session>,
    pub session_validators: Vec<SessionValidator>,
    pub session_nominators: Vec<SessionNominator>,
    pub session_totals: BTreeMap<u32, SessionTotal>,
    pub contracts: BTreeMap<String, Contract>,
    pub trades: BTreeMap<String, Trade>,
    pub candles: BTreeMap<Interval, Vec<Candle>>,
    next_candle_id: i64,
}

impl MemoryState {
    fn candles_of(&self, interval: Interval) -> &[Candle] {
        self.candles.get(&interval).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Candles of one interval, any pair, in `(time, id)` order.
    pub fn candle_rows(&self, interval: Interval) -> Vec<Candle> {
        let mut rows = self.candles_of(interval).to_vec();
        rows.sort_by_key(|c| (c.time, c.id));
        rows
    }
}

// =============================================================================
// Store
// =============================================================================

/// Holder of a status flag and when it last refreshed it.
#[derive(Debug, Clone)]
struct FlagEntry {
    value: String,
    updated_at: DateTime<Utc>,
}

impl FlagEntry {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            updated_at: Utc::now(),
        }
    }

    fn is_stale(&self, lease: Duration) -> bool {
        (Utc::now() - self.updated_at)
            .to_std()
            .is_ok_and(|age| age > lease)
    }
}

/// In-memory harvester storage.
///
/// All data is lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    flags: Arc<Mutex<HashMap<String, FlagEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all committed data.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Current value of a status flag.
    pub async fn flag(&self, key: &str) -> Option<String> {
        self.flags.lock().await.get(key).map(|f| f.value.clone())
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn begin(&self) -> StorageResult<Box<dyn FactTx>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTx {
            state: guard,
            snapshot: Some(snapshot),
        }))
    }

    async fn block(&self, id: u64) -> StorageResult<Option<Block>> {
        Ok(self.state.lock().await.blocks.get(&id).cloned())
    }

    async fn block_by_hash(&self, hash: &BlockHash) -> StorageResult<Option<Block>> {
        let state = self.state.lock().await;
        Ok(state.blocks.values().find(|b| b.hash == *hash).cloned())
    }

    async fn block_total(&self, id: u64) -> StorageResult<Option<BlockTotal>> {
        Ok(self.state.lock().await.totals.get(&id).cloned())
    }

    async fn latest_block_id(&self) -> StorageResult<Option<u64>> {
        Ok(self.state.lock().await.blocks.keys().next_back().copied())
    }

    async fn latest_sequenced_id(&self) -> StorageResult<Option<u64>> {
        Ok(self.state.lock().await.totals.keys().next_back().copied())
    }

    async fn missing_block_ranges(&self) -> StorageResult<Vec<BlockRange>> {
        let state = self.state.lock().await;
        let mut ranges = Vec::new();
        let mut expected = 0u64;
        for &id in state.blocks.keys() {
            if id > expected {
                ranges.push(BlockRange {
                    from: expected,
                    to: id - 1,
                });
            }
            expected = id + 1;
        }
        Ok(ranges)
    }

    async fn try_acquire_flag(
        &self,
        key: &str,
        value: &str,
        lease: Duration,
    ) -> StorageResult<bool> {
        let mut flags = self.flags.lock().await;
        if let Some(held) = flags.get(key) {
            if !held.is_stale(lease) {
                return Ok(false);
            }
            warn!(flag = key, previous = %held.value, "⚠️  Reclaiming stale status flag");
        }
        flags.insert(key.to_string(), FlagEntry::new(value));
        Ok(true)
    }

    async fn refresh_flag(&self, key: &str, value: &str) -> StorageResult<bool> {
        let mut flags = self.flags.lock().await;
        match flags.get_mut(key) {
            Some(held) if held.value == value => {
                held.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_flag(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut flags = self.flags.lock().await;
        if flags.get(key).is_some_and(|held| held.value == value) {
            flags.remove(key);
        }
        Ok(())
    }

    async fn market_history(&self, query: &MarketHistoryQuery) -> StorageResult<Vec<Candle>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Candle> = state
            .candles_of(query.interval)
            .iter()
            .filter(|c| c.base == query.base && c.quote == query.quote && c.time <= query.cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.id);
        rows.truncate(query.limit as usize);
        Ok(rows)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Exclusive handle on the store state.
struct MemoryTx {
    state: OwnedMutexGuard<MemoryState>,
    /// State at `begin`; restored on drop unless taken by `commit`.
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

fn duplicate(what: &str, key: impl std::fmt::Display) -> StorageError {
    StorageError::ConstraintViolation(format!("duplicate {what} {key}"))
}

#[async_trait]
impl FactTx for MemoryTx {
    // ---- Blocks -------------------------------------------------------------

    async fn insert_block(&mut self, block: &Block) -> StorageResult<()> {
        if self.state.blocks.contains_key(&block.id)
            || self.state.blocks.values().any(|b| b.hash == block.hash)
        {
            return Err(duplicate("block", block.id));
        }
        self.state.blocks.insert(block.id, block.clone());
        Ok(())
    }

    async fn update_block_counters(
        &mut self,
        block_id: u64,
        counters: &BlockCounters,
    ) -> StorageResult<()> {
        let block = self
            .state
            .blocks
            .get_mut(&block_id)
            .ok_or_else(|| StorageError::NotFound(format!("block {block_id}")))?;
        block.counters = *counters;
        Ok(())
    }

    async fn insert_extrinsics(
        &mut self,
        block_id: u64,
        extrinsics: &[ChainExtrinsic],
    ) -> StorageResult<()> {
        for x in extrinsics {
            self.state
                .extrinsics
                .insert((block_id, x.extrinsic_idx), x.clone());
        }
        Ok(())
    }

    async fn insert_events(&mut self, block_id: u64, events: &[ChainEvent]) -> StorageResult<()> {
        for e in events {
            self.state.events.insert((block_id, e.event_idx), e.clone());
        }
        Ok(())
    }

    async fn insert_logs(&mut self, logs: &[Log]) -> StorageResult<()> {
        for log in logs {
            let key = (log.block_id, log.log_idx);
            if self.state.logs.contains_key(&key) {
                return Err(duplicate("log", format!("{}-{}", key.0, key.1)));
            }
            self.state.logs.insert(key, log.clone());
        }
        Ok(())
    }

    async fn delete_logs(&mut self, block_id: u64) -> StorageResult<u64> {
        let before = self.state.logs.len();
        self.state.logs.retain(|(b, _), _| *b != block_id);
        Ok((before - self.state.logs.len()) as u64)
    }

    async fn block_total(&mut self, block_id: u64) -> StorageResult<Option<BlockTotal>> {
        Ok(self.state.totals.get(&block_id).cloned())
    }

    async fn insert_block_total(&mut self, total: &BlockTotal) -> StorageResult<()> {
        if self.state.totals.contains_key(&total.id) {
            return Err(duplicate("block total", total.id));
        }
        self.state.totals.insert(total.id, total.clone());
        Ok(())
    }

    // ---- Audits -------------------------------------------------------------

    async fn insert_audit(&mut self, audit: &AuditRecord) -> StorageResult<()> {
        self.state.audits.push(audit.clone());
        Ok(())
    }

    async fn audits(
        &mut self,
        kind: AuditKind,
        block_id: u64,
    ) -> StorageResult<Vec<AuditRecord>> {
        let mut rows: Vec<AuditRecord> = self
            .state
            .audits
            .iter()
            .filter(|a| a.kind == kind && a.locator.block_id == block_id)
            .cloned()
            .collect();
        // Stable: audits of one event keep insertion order
        rows.sort_by_key(|a| a.locator.event_idx);
        Ok(rows)
    }

    async fn delete_audits(&mut self, kind: AuditKind, block_id: u64) -> StorageResult<u64> {
        let before = self.state.audits.len();
        self.state
            .audits
            .retain(|a| !(a.kind == kind && a.locator.block_id == block_id));
        Ok((before - self.state.audits.len()) as u64)
    }

    // ---- Accounts -----------------------------------------------------------

    async fn account(&mut self, id: &str) -> StorageResult<Option<Account>> {
        Ok(self.state.accounts.get(id).cloned())
    }

    async fn upsert_account(&mut self, account: &Account) -> StorageResult<()> {
        self.state
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn account_index(&mut self, id: u32) -> StorageResult<Option<AccountIndex>> {
        Ok(self.state.account_indices.get(&id).cloned())
    }

    async fn account_indices_for(
        &mut self,
        account_id: &str,
    ) -> StorageResult<Vec<AccountIndex>> {
        Ok(self
            .state
            .account_indices
            .values()
            .filter(|i| i.account_id.as_deref() == Some(account_id))
            .cloned()
            .collect())
    }

    async fn upsert_account_index(&mut self, index: &AccountIndex) -> StorageResult<()> {
        self.state.account_indices.insert(index.id, index.clone());
        Ok(())
    }

    // ---- Democracy ----------------------------------------------------------

    async fn democracy_proposal(&mut self, id: u32) -> StorageResult<Option<DemocracyProposal>> {
        Ok(self.state.democracy_proposals.get(&id).cloned())
    }

    async fn upsert_democracy_proposal(
        &mut self,
        proposal: &DemocracyProposal,
    ) -> StorageResult<()> {
        self.state
            .democracy_proposals
            .insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn referendum(&mut self, id: u32) -> StorageResult<Option<DemocracyReferendum>> {
        Ok(self.state.referenda.get(&id).cloned())
    }

    async fn upsert_referendum(&mut self, referendum: &DemocracyReferendum) -> StorageResult<()> {
        self.state
            .referenda
            .insert(referendum.id, referendum.clone());
        Ok(())
    }

    // ---- Collective motions -------------------------------------------------

    async fn open_motion(
        &mut self,
        collective: Collective,
        motion_hash: &str,
    ) -> StorageResult<Option<Motion>> {
        Ok(self
            .state
            .motions
            .values()
            .find(|m| {
                m.collective == collective
                    && m.motion_hash == motion_hash
                    && !m.status.is_terminal()
            })
            .cloned())
    }

    async fn upsert_motion(&mut self, motion: &Motion) -> StorageResult<()> {
        self.state
            .motions
            .insert((motion.collective, motion.proposal_id), motion.clone());
        Ok(())
    }

    async fn motion_vote(
        &mut self,
        collective: Collective,
        proposal_id: u32,
        account_id: &str,
    ) -> StorageResult<Option<MotionVote>> {
        Ok(self
            .state
            .votes
            .get(&(collective, proposal_id, account_id.to_string()))
            .cloned())
    }

    async fn upsert_motion_vote(&mut self, vote: &MotionVote) -> StorageResult<()> {
        self.state.votes.insert(
            (vote.collective, vote.proposal_id, vote.account_id.clone()),
            vote.clone(),
        );
        Ok(())
    }

    // ---- Treasury -----------------------------------------------------------

    async fn open_treasury_proposal(
        &mut self,
        id: u32,
    ) -> StorageResult<Option<TreasuryProposal>> {
        Ok(self
            .state
            .treasury_proposals
            .get(&id)
            .filter(|p| p.status.is_open())
            .cloned())
    }

    async fn upsert_treasury_proposal(
        &mut self,
        proposal: &TreasuryProposal,
    ) -> StorageResult<()> {
        self.state
            .treasury_proposals
            .insert(proposal.id, proposal.clone());
        Ok(())
    }

    // ---- Sessions -----------------------------------------------------------

    async fn insert_session(&mut self, record: SessionRecord<'_>) -> StorageResult<()> {
        let id = record.session.id;
        if self.state.sessions.contains_key(&id) {
            return Err(duplicate("session", id));
        }
        self.state.sessions.insert(id, record.session.clone());
        self.state
            .session_validators
            .extend_from_slice(record.validators);
        self.state
            .session_nominators
            .extend_from_slice(record.nominators);
        Ok(())
    }

    async fn session(&mut self, id: u32) -> StorageResult<Option<Session>> {
        Ok(self.state.sessions.get(&id).cloned())
    }

    async fn sessions_created_at(&mut self, block_id: u64) -> StorageResult<Vec<Session>> {
        Ok(self
            .state
            .sessions
            .values()
            .filter(|s| s.created_at_block == block_id)
            .cloned()
            .collect())
    }

    async fn delete_sessions_created_at(&mut self, block_id: u64) -> StorageResult<u64> {
        let ids: Vec<u32> = self
            .state
            .sessions
            .values()
            .filter(|s| s.created_at_block == block_id)
            .map(|s| s.id)
            .collect();
        self.state
            .session_nominators
            .retain(|n| !ids.contains(&n.session_id));
        self.state
            .session_validators
            .retain(|v| !ids.contains(&v.session_id));
        for id in &ids {
            self.state.sessions.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn upsert_session_total(&mut self, total: &SessionTotal) -> StorageResult<()> {
        self.state.session_totals.insert(total.id, *total);
        Ok(())
    }

    // ---- Contracts ----------------------------------------------------------

    async fn insert_contract(&mut self, contract: &Contract) -> StorageResult<()> {
        if self.state.contracts.contains_key(&contract.code_hash) {
            return Err(duplicate("contract", &contract.code_hash));
        }
        self.state
            .contracts
            .insert(contract.code_hash.clone(), contract.clone());
        Ok(())
    }

    async fn delete_contracts_created_at(&mut self, block_id: u64) -> StorageResult<u64> {
        let before = self.state.contracts.len();
        self.state
            .contracts
            .retain(|_, c| c.created_at_block != block_id);
        Ok((before - self.state.contracts.len()) as u64)
    }

    // ---- Market -------------------------------------------------------------

    async fn insert_trade(&mut self, trade: &Trade) -> StorageResult<()> {
        if self.state.trades.contains_key(&trade.trade_hash) {
            return Err(duplicate("trade", &trade.trade_hash));
        }
        self.state
            .trades
            .insert(trade.trade_hash.clone(), trade.clone());
        Ok(())
    }

    async fn delete_trades(&mut self, block_id: u64) -> StorageResult<u64> {
        let before = self.state.trades.len();
        self.state.trades.retain(|_, t| t.block_id != block_id);
        Ok((before - self.state.trades.len()) as u64)
    }

    async fn trades_in_window(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_block: u64,
    ) -> StorageResult<Vec<Trade>> {
        let blocks = &self.state.blocks;
        let mut rows: Vec<Trade> = self
            .state
            .trades
            .values()
            .filter(|t| t.block_id <= max_block)
            .filter(|t| {
                blocks
                    .get(&t.block_id)
                    .is_some_and(|b| b.datetime >= from && b.datetime < to)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| (t.block_id, t.event_idx));
        Ok(rows)
    }

    async fn candles_in_range(
        &mut self,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Candle>> {
        let mut rows: Vec<Candle> = self
            .state
            .candles_of(interval)
            .iter()
            .filter(|c| c.time >= from && c.time < to)
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.time, c.id));
        Ok(rows)
    }

    async fn candles_at(
        &mut self,
        interval: Interval,
        time: DateTime<Utc>,
    ) -> StorageResult<Vec<Candle>> {
        Ok(self
            .state
            .candles_of(interval)
            .iter()
            .filter(|c| c.time == time)
            .cloned()
            .collect())
    }

    async fn insert_candle(&mut self, candle: &NewCandle) -> StorageResult<i64> {
        self.state.next_candle_id += 1;
        let id = self.state.next_candle_id;
        self.state
            .candles
            .entry(candle.interval)
            .or_default()
            .push(Candle {
                id,
                interval: candle.interval,
                time: candle.time,
                base: candle.base.clone(),
                quote: candle.quote.clone(),
                values: candle.values,
            });
        Ok(id)
    }

    async fn update_candle(&mut self, candle: &Candle) -> StorageResult<()> {
        let row = self
            .state
            .candles
            .get_mut(&candle.interval)
            .and_then(|rows| rows.iter_mut().find(|c| c.id == candle.id))
            .ok_or_else(|| StorageError::NotFound(format!("candle {}", candle.id)))?;
        row.values = candle.values;
        Ok(())
    }

    // ---- Lifecycle ----------------------------------------------------------

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        // Drop restores the snapshot
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use harvester_core::models::Ohlcv;

    fn block(id: u64) -> Block {
        Block {
            id,
            hash: BlockHash([id as u8 + 1; 32]),
            parent_hash: BlockHash([id as u8; 32]),
            state_root: BlockHash([0; 32]),
            extrinsics_root: BlockHash([0; 32]),
            datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, id as u32).unwrap(),
            spec_version: 1,
            counters: BlockCounters::default(),
        }
    }

    // Test critique: une transaction non validée ne laisse aucune trace
    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_block(&block(0)).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.block(0).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.insert_block(&block(0)).await.unwrap();
        drop(tx);
        assert!(store.block(0).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.insert_block(&block(0)).await.unwrap();
        tx.commit().await.unwrap();
        assert!(store.block(0).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_block_is_a_constraint_violation() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_block(&block(3)).await.unwrap();
        let err = tx.insert_block(&block(3)).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    // Test critique: les trous sont rapportés en plages inclusives
    #[tokio::test]
    async fn test_missing_block_ranges() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for id in [0, 1, 2, 5, 9] {
            tx.insert_block(&block(id)).await.unwrap();
        }
        tx.commit().await.unwrap();

        let gaps = store.missing_block_ranges().await.unwrap();
        assert_eq!(
            gaps,
            vec![BlockRange { from: 3, to: 4 }, BlockRange { from: 6, to: 8 }]
        );
        assert_eq!(store.latest_block_id().await.unwrap(), Some(9));
    }

    const LEASE: Duration = Duration::from_secs(600);

    // Test critique: un seul détenteur du flag à la fois
    #[tokio::test]
    async fn test_flag_is_single_flight() {
        let store = MemoryStore::new();
        assert!(store.try_acquire_flag("SEQ", "a", LEASE).await.unwrap());
        assert!(!store.try_acquire_flag("SEQ", "b", LEASE).await.unwrap());
        assert_eq!(store.flag("SEQ").await.as_deref(), Some("a"));

        // Seul le détenteur peut libérer
        store.release_flag("SEQ", "b").await.unwrap();
        assert_eq!(store.flag("SEQ").await.as_deref(), Some("a"));

        store.release_flag("SEQ", "a").await.unwrap();
        assert!(store.try_acquire_flag("SEQ", "b", LEASE).await.unwrap());
    }

    // Test critique: un flag abandonné au-delà du bail est repris
    #[tokio::test]
    async fn test_stale_flag_is_reclaimed() {
        let store = MemoryStore::new();
        let lease = Duration::from_millis(5);
        assert!(store.try_acquire_flag("SEQ", "dead", lease).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!store.try_acquire_flag("SEQ", "b", LEASE).await.unwrap());
        assert!(store.try_acquire_flag("SEQ", "b", lease).await.unwrap());
        assert_eq!(store.flag("SEQ").await.as_deref(), Some("b"));

        // L'ancien détenteur a perdu le flag
        assert!(!store.refresh_flag("SEQ", "dead").await.unwrap());
        store.release_flag("SEQ", "dead").await.unwrap();
        assert_eq!(store.flag("SEQ").await.as_deref(), Some("b"));
    }

    // Test critique: un rafraîchissement repousse l'expiration du bail
    #[tokio::test]
    async fn test_refresh_keeps_flag_alive() {
        let store = MemoryStore::new();
        let lease = Duration::from_millis(50);
        assert!(store.try_acquire_flag("SEQ", "a", lease).await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.refresh_flag("SEQ", "a").await.unwrap());
        assert!(!store.try_acquire_flag("SEQ", "b", lease).await.unwrap());
    }

    #[tokio::test]
    async fn test_market_history_filters_and_limits() {
        let store = MemoryStore::new();
        let t = |m| Utc.with_ymd_and_hms(2024, 1, 1, 0, m, 0).unwrap();

        let mut tx = store.begin().await.unwrap();
        for m in 0..5 {
            tx.insert_candle(&NewCandle {
                interval: Interval::OneMinute,
                time: t(m),
                base: "DOT".into(),
                quote: "USD".into(),
                values: Ohlcv::flat(10),
            })
            .await
            .unwrap();
        }
        tx.insert_candle(&NewCandle {
            interval: Interval::OneMinute,
            time: t(0),
            base: "KSM".into(),
            quote: "USD".into(),
            values: Ohlcv::flat(10),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let rows = store
            .market_history(&MarketHistoryQuery {
                interval: Interval::OneMinute,
                base: "DOT".into(),
                quote: "USD".into(),
                cutoff: t(3),
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time, t(0));
        assert_eq!(rows[1].time, t(1));
        assert!(rows.iter().all(|c| c.base == "DOT"));
    }
}
