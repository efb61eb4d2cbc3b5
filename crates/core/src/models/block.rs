use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BlockHash;
use crate::error::{DomainError, DomainResult};

// =============================================================================
// Block Counters
// =============================================================================

/// Per-block counters, filled during accumulation only.
///
/// The same shape carries cumulative values inside [`BlockTotal`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounters {
    pub extrinsics: i64,
    pub extrinsics_success: i64,
    pub extrinsics_error: i64,
    pub extrinsics_signed: i64,
    pub extrinsics_unsigned: i64,
    pub extrinsics_signedby_address: i64,
    pub extrinsics_signedby_index: i64,
    pub events: i64,
    pub events_system: i64,
    pub events_module: i64,
    pub events_extrinsic: i64,
    pub events_finalization: i64,
    /// New accounts minus reaped accounts; may be negative.
    pub accounts: i64,
    pub accounts_new: i64,
    pub accounts_reaped: i64,
    pub sessions_new: i64,
    pub contracts_new: i64,
    pub logs: i64,
}

impl BlockCounters {
    /// Field-wise checked sum.
    pub fn checked_add(&self, other: &Self) -> DomainResult<Self> {
        fn add(field: &str, a: i64, b: i64) -> DomainResult<i64> {
            a.checked_add(b)
                .ok_or_else(|| DomainError::ArithmeticOverflow(format!("total_{field}")))
        }

        Ok(Self {
            extrinsics: add("extrinsics", self.extrinsics, other.extrinsics)?,
            extrinsics_success: add(
                "extrinsics_success",
                self.extrinsics_success,
                other.extrinsics_success,
            )?,
            extrinsics_error: add(
                "extrinsics_error",
                self.extrinsics_error,
                other.extrinsics_error,
            )?,
            extrinsics_signed: add(
                "extrinsics_signed",
                self.extrinsics_signed,
                other.extrinsics_signed,
            )?,
            extrinsics_unsigned: add(
                "extrinsics_unsigned",
                self.extrinsics_unsigned,
                other.extrinsics_unsigned,
            )?,
            extrinsics_signedby_address: add(
                "extrinsics_signedby_address",
                self.extrinsics_signedby_address,
                other.extrinsics_signedby_address,
            )?,
            extrinsics_signedby_index: add(
                "extrinsics_signedby_index",
                self.extrinsics_signedby_index,
                other.extrinsics_signedby_index,
            )?,
            events: add("events", self.events, other.events)?,
            events_system: add("events_system", self.events_system, other.events_system)?,
            events_module: add("events_module", self.events_module, other.events_module)?,
            events_extrinsic: add(
                "events_extrinsic",
                self.events_extrinsic,
                other.events_extrinsic,
            )?,
            events_finalization: add(
                "events_finalization",
                self.events_finalization,
                other.events_finalization,
            )?,
            accounts: add("accounts", self.accounts, other.accounts)?,
            accounts_new: add("accounts_new", self.accounts_new, other.accounts_new)?,
            accounts_reaped: add("accounts_reaped", self.accounts_reaped, other.accounts_reaped)?,
            sessions_new: add("sessions_new", self.sessions_new, other.sessions_new)?,
            contracts_new: add("contracts_new", self.contracts_new, other.contracts_new)?,
            logs: add("logs", self.logs, other.logs)?,
        })
    }
}

// =============================================================================
// Block & Block Total
// =============================================================================

/// Harvested block header with its local counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number (height). Ids follow strict chain order.
    pub id: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub state_root: BlockHash,
    pub extrinsics_root: BlockHash,
    /// Timestamp from `pallet_timestamp`.
    pub datetime: DateTime<Utc>,
    pub spec_version: u32,
    #[serde(flatten)]
    pub counters: BlockCounters,
}

impl Block {
    /// Parent block id, `None` for genesis.
    pub fn parent_id(&self) -> Option<u64> {
        self.id.checked_sub(1)
    }
}

/// Sequenced running totals for one block.
///
/// Written once when the block is sequenced and never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTotal {
    pub id: u64,
    pub session_id: u64,
    /// Timestamp of the parent block (the block's own for genesis).
    pub parent_datetime: DateTime<Utc>,
    /// Seconds since the parent block.
    pub blocktime: i64,
    pub total_blocktime: i64,
    #[serde(flatten)]
    pub totals: BlockCounters,
}

impl BlockTotal {
    /// Zero-valued totals standing in for the parent of genesis.
    pub fn zero() -> Self {
        Self {
            id: 0,
            session_id: 0,
            parent_datetime: DateTime::<Utc>::UNIX_EPOCH,
            blocktime: 0,
            total_blocktime: 0,
            totals: BlockCounters::default(),
        }
    }
}

/// Addresses a block either by hash or by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Hash(BlockHash),
    Number(u64),
}

impl From<BlockHash> for BlockRef {
    fn from(hash: BlockHash) -> Self {
        Self::Hash(hash)
    }
}

impl From<u64> for BlockRef {
    fn from(number: u64) -> Self {
        Self::Number(number)
    }
}

impl std::fmt::Display for BlockRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash(hash) => write!(f, "{hash}"),
            Self::Number(number) => write!(f, "#{number}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_checked_add() {
        let a = BlockCounters {
            extrinsics: 2,
            accounts: -1,
            logs: 3,
            ..Default::default()
        };
        let b = BlockCounters {
            extrinsics: 5,
            accounts: 4,
            ..Default::default()
        };
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.extrinsics, 7);
        assert_eq!(sum.accounts, 3);
        assert_eq!(sum.logs, 3);
    }

    // Test critique: un dépassement est une erreur, jamais un wrap silencieux
    #[test]
    fn test_counters_overflow_is_error() {
        let a = BlockCounters {
            events: i64::MAX,
            ..Default::default()
        };
        let b = BlockCounters {
            events: 1,
            ..Default::default()
        };
        let err = a.checked_add(&b).unwrap_err();
        assert!(err.to_string().contains("total_events"));
    }
}
