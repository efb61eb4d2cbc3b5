//! Database row representations and their conversion into domain models.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;

use harvester_core::error::{StorageError, StorageResult};
use harvester_core::models::{
    Account, AccountIndex, AuditKind, AuditLocator, AuditRecord, Block, BlockHash, BlockTotal,
    Candle, Collective, DemocracyProposal, DemocracyReferendum, Interval, Motion, MotionStatus,
    MotionVote, Ohlcv, Session, Trade, TreasuryProposal, TreasuryStatus,
};

use super::helpers::{
    bytes_to_hash32, bytes_to_hash32_strict, counter_columns, counters_from_row, parse_numeric,
    parse_numeric_required,
};

fn get<'r, T>(row: &'r PgRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::SerializationError(e.to_string()))
}

// =============================================================================
// Blocks
// =============================================================================

pub fn block_select() -> String {
    format!(
        "SELECT id, hash, parent_hash, state_root, extrinsics_root, datetime, spec_version, {} \
         FROM data_block",
        counter_columns("count_")
    )
}

pub fn block_from_row(row: &PgRow) -> StorageResult<Block> {
    let id: i64 = get(row, "id")?;
    let spec_version: i32 = get(row, "spec_version")?;
    Ok(Block {
        id: id as u64,
        hash: BlockHash(bytes_to_hash32_strict(get(row, "hash")?, "block.hash")?),
        parent_hash: BlockHash(bytes_to_hash32(get(row, "parent_hash")?, "block.parent_hash")?),
        state_root: BlockHash(bytes_to_hash32(get(row, "state_root")?, "block.state_root")?),
        extrinsics_root: BlockHash(bytes_to_hash32(
            get(row, "extrinsics_root")?,
            "block.extrinsics_root",
        )?),
        datetime: get(row, "datetime")?,
        spec_version: spec_version as u32,
        counters: counters_from_row(row, "count_")?,
    })
}

pub fn total_select() -> String {
    format!(
        "SELECT id, session_id, parent_datetime, blocktime, total_blocktime, {} \
         FROM data_block_total",
        counter_columns("total_")
    )
}

pub fn total_from_row(row: &PgRow) -> StorageResult<BlockTotal> {
    let id: i64 = get(row, "id")?;
    let session_id: i64 = get(row, "session_id")?;
    Ok(BlockTotal {
        id: id as u64,
        session_id: session_id as u64,
        parent_datetime: get(row, "parent_datetime")?,
        blocktime: get(row, "blocktime")?,
        total_blocktime: get(row, "total_blocktime")?,
        totals: counters_from_row(row, "total_")?,
    })
}

// =============================================================================
// Audits
// =============================================================================

#[derive(sqlx::FromRow)]
pub struct AuditRow {
    block_id: i64,
    event_idx: i32,
    extrinsic_idx: Option<i32>,
    type_id: i16,
    subject: String,
    data: serde_json::Value,
}

impl AuditRow {
    pub fn into_audit(self, kind: AuditKind) -> AuditRecord {
        AuditRecord {
            kind,
            locator: AuditLocator {
                block_id: self.block_id as u64,
                event_idx: self.event_idx as u32,
                extrinsic_idx: self.extrinsic_idx.map(|i| i as u32),
            },
            type_id: self.type_id,
            subject: self.subject,
            data: self.data,
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

#[derive(sqlx::FromRow)]
pub struct AccountRow {
    id: String,
    address: String,
    is_reaped: bool,
    count_reaped: i32,
    balance: String,
    created_at_block: i64,
    updated_at_block: i64,
}

impl AccountRow {
    pub fn into_account(self) -> StorageResult<Account> {
        Ok(Account {
            balance: parse_numeric_required(self.balance, "account.balance")?,
            id: self.id,
            address: self.address,
            is_reaped: self.is_reaped,
            count_reaped: self.count_reaped as u32,
            created_at_block: self.created_at_block as u64,
            updated_at_block: self.updated_at_block as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct AccountIndexRow {
    id: i32,
    account_id: Option<String>,
    short_address: Option<String>,
    is_reclaimable: bool,
    created_at_block: i64,
    updated_at_block: i64,
}

impl AccountIndexRow {
    pub fn into_index(self) -> AccountIndex {
        AccountIndex {
            id: self.id as u32,
            account_id: self.account_id,
            short_address: self.short_address,
            is_reclaimable: self.is_reclaimable,
            created_at_block: self.created_at_block as u64,
            updated_at_block: self.updated_at_block as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct DemocracyProposalRow {
    id: i32,
    proposal: Option<serde_json::Value>,
    bond: Option<String>,
    status: String,
    created_at_block: i64,
    updated_at_block: i64,
}

impl DemocracyProposalRow {
    pub fn into_proposal(self) -> StorageResult<DemocracyProposal> {
        Ok(DemocracyProposal {
            id: self.id as u32,
            proposal: self.proposal,
            bond: parse_numeric(self.bond, "democracy_proposal.bond")?,
            status: self.status,
            created_at_block: self.created_at_block as u64,
            updated_at_block: self.updated_at_block as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ReferendumRow {
    id: i32,
    proposal: Option<serde_json::Value>,
    vote_threshold: Option<String>,
    success: Option<bool>,
    status: String,
    created_at_block: i64,
    updated_at_block: i64,
}

impl ReferendumRow {
    pub fn into_referendum(self) -> DemocracyReferendum {
        DemocracyReferendum {
            id: self.id as u32,
            proposal: self.proposal,
            vote_threshold: self.vote_threshold,
            success: self.success,
            status: self.status,
            created_at_block: self.created_at_block as u64,
            updated_at_block: self.updated_at_block as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct MotionRow {
    proposal_id: i32,
    motion_hash: String,
    account_id: String,
    proposal: Option<serde_json::Value>,
    member_threshold: i32,
    yes_votes_count: i32,
    no_votes_count: i32,
    status: String,
    approved: Option<bool>,
    executed: Option<bool>,
    created_at_block: i64,
    updated_at_block: i64,
}

impl MotionRow {
    pub fn into_motion(self, collective: Collective) -> StorageResult<Motion> {
        let status = MotionStatus::parse(&self.status).ok_or_else(|| {
            StorageError::SerializationError(format!("unknown motion status {}", self.status))
        })?;
        Ok(Motion {
            collective,
            proposal_id: self.proposal_id as u32,
            motion_hash: self.motion_hash,
            account_id: self.account_id,
            proposal: self.proposal,
            member_threshold: self.member_threshold as u32,
            yes_votes_count: self.yes_votes_count as u32,
            no_votes_count: self.no_votes_count as u32,
            status,
            approved: self.approved,
            executed: self.executed,
            created_at_block: self.created_at_block as u64,
            updated_at_block: self.updated_at_block as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct MotionVoteRow {
    proposal_id: i32,
    account_id: String,
    vote: bool,
    created_at_block: i64,
    updated_at_block: i64,
}

impl MotionVoteRow {
    pub fn into_vote(self, collective: Collective) -> MotionVote {
        MotionVote {
            collective,
            proposal_id: self.proposal_id as u32,
            account_id: self.account_id,
            vote: self.vote,
            created_at_block: self.created_at_block as u64,
            updated_at_block: self.updated_at_block as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct TreasuryProposalRow {
    id: i32,
    proposed_by: Option<String>,
    beneficiary: Option<String>,
    value: Option<String>,
    slash_value: Option<String>,
    status: String,
    created_at_block: i64,
    updated_at_block: i64,
}

impl TreasuryProposalRow {
    pub fn into_proposal(self) -> StorageResult<TreasuryProposal> {
        let status = TreasuryStatus::parse(&self.status).ok_or_else(|| {
            StorageError::SerializationError(format!("unknown treasury status {}", self.status))
        })?;
        Ok(TreasuryProposal {
            id: self.id as u32,
            proposed_by: self.proposed_by,
            beneficiary: self.beneficiary,
            value: parse_numeric(self.value, "treasury_proposal.value")?,
            slash_value: parse_numeric(self.slash_value, "treasury_proposal.slash_value")?,
            status,
            created_at_block: self.created_at_block as u64,
            updated_at_block: self.updated_at_block as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct SessionRow {
    id: i32,
    start_at_block: i64,
    created_at_block: i64,
    created_at_extrinsic: Option<i32>,
    created_at_event: i32,
    count_validators: i32,
    count_nominators: i32,
    era: Option<i32>,
}

impl SessionRow {
    pub fn into_session(self) -> Session {
        Session {
            id: self.id as u32,
            start_at_block: self.start_at_block as u64,
            created_at_block: self.created_at_block as u64,
            created_at_extrinsic: self.created_at_extrinsic.map(|i| i as u32),
            created_at_event: self.created_at_event as u32,
            count_validators: self.count_validators as u32,
            count_nominators: self.count_nominators as u32,
            era: self.era.map(|e| e as u32),
        }
    }
}

// =============================================================================
// Market
// =============================================================================

#[derive(sqlx::FromRow)]
pub struct TradeRow {
    trade_hash: String,
    block_id: i64,
    extrinsic_idx: Option<i32>,
    event_idx: i32,
    base: String,
    quote: String,
    buyer: String,
    seller: String,
    maker: String,
    taker: String,
    otype: i16,
    price: String,
    base_amount: String,
    quote_amount: String,
}

impl TradeRow {
    pub fn into_trade(self) -> StorageResult<Trade> {
        Ok(Trade {
            price: parse_numeric_required(self.price, "trade.price")?,
            base_amount: parse_numeric_required(self.base_amount, "trade.base_amount")?,
            quote_amount: parse_numeric_required(self.quote_amount, "trade.quote_amount")?,
            trade_hash: self.trade_hash,
            block_id: self.block_id as u64,
            extrinsic_idx: self.extrinsic_idx.map(|i| i as u32),
            event_idx: self.event_idx as u32,
            base: self.base,
            quote: self.quote,
            buyer: self.buyer,
            seller: self.seller,
            maker: self.maker,
            taker: self.taker,
            otype: self.otype,
        })
    }
}

pub const CANDLE_COLUMNS: &str = "id, time, base, quote, open::TEXT AS open, high::TEXT AS high, \
     low::TEXT AS low, close::TEXT AS close, base_amount::TEXT AS base_amount, \
     quote_amount::TEXT AS quote_amount";

#[derive(sqlx::FromRow)]
pub struct CandleRow {
    id: i64,
    time: DateTime<Utc>,
    base: String,
    quote: String,
    open: String,
    high: String,
    low: String,
    close: String,
    base_amount: String,
    quote_amount: String,
}

impl CandleRow {
    pub fn into_candle(self, interval: Interval) -> StorageResult<Candle> {
        Ok(Candle {
            id: self.id,
            interval,
            time: self.time,
            values: Ohlcv {
                open: parse_numeric_required(self.open, "candle.open")?,
                high: parse_numeric_required(self.high, "candle.high")?,
                low: parse_numeric_required(self.low, "candle.low")?,
                close: parse_numeric_required(self.close, "candle.close")?,
                base_amount: parse_numeric_required(self.base_amount, "candle.base_amount")?,
                quote_amount: parse_numeric_required(self.quote_amount, "candle.quote_amount")?,
            },
            base: self.base,
            quote: self.quote,
        })
    }
}
