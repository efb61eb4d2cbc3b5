//! Error types for the harvester domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Business logic errors
//! - [`StorageError`] - Fact store errors
//! - [`ChainError`] - Blockchain RPC errors
//! - [`BlockIntegrityError`] - Chain continuity violations
//! - [`HarvesterError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Business logic and domain rule violations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Block was not found in storage.
    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    /// Data decoding/deserialization failed.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// An aggregate exceeded the numeric range of its column.
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Generic validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Fact store errors.
///
/// These errors originate from storage operations like queries,
/// transactions, and data serialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// Query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Constraint was violated (unique, foreign key, etc.).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction begin/commit/rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Blockchain RPC and connectivity errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// WebSocket connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// RPC request failed.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Block could not be fetched.
    #[error("Block fetch error at {at}: {message}")]
    BlockFetchError {
        /// Block hash or number that failed to fetch.
        at: String,
        /// Error details.
        message: String,
    },

    /// Requested block number is not known to the node.
    #[error("Unknown block number {0}")]
    UnknownBlock(u64),

    /// A storage lookup failed for a reason other than absence.
    #[error("Storage lookup {module}.{function} failed: {message}")]
    StorageLookup {
        module: String,
        function: String,
        message: String,
    },
}

// =============================================================================
// Block Integrity Errors
// =============================================================================

/// Inclusive range of block ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// The stored chain is not contiguous or a block was processed out of order.
///
/// Each variant names the affected block or range so a caller can schedule
/// a backfill.
#[derive(Debug, Error)]
pub enum BlockIntegrityError {
    /// Sequencing was attempted before the parent's total exists.
    #[error("Block {block} cannot be sequenced: parent total {parent} is missing")]
    ParentNotSequenced { block: u64, parent: u64 },

    /// The block already has a total.
    #[error("Block {0} is already sequenced")]
    AlreadySequenced(u64),

    /// The parent snapshot does not match the block's parent hash.
    #[error("Block {block} parent mismatch: expected {expected}, got {found}")]
    ParentMismatch {
        block: u64,
        expected: String,
        found: String,
    },

    /// Block ids are missing from the stored range.
    #[error("Missing blocks: {}", format_ranges(.0))]
    MissingBlocks(Vec<BlockRange>),

    /// A candle resolution ran before the resolution it is built from.
    #[error("Block {block}: {interval} roll-up requires {source_interval} to be rolled first")]
    RollupDependency {
        block: u64,
        interval: &'static str,
        source_interval: &'static str,
    },
}

fn format_ranges(ranges: &[BlockRange]) -> String {
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Harvester Errors
// =============================================================================

/// Top-level harvester orchestration errors.
///
/// This is the main error type returned by [`crate::services::Harvester`].
/// It wraps all lower-level errors and adds harvester-specific variants.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// The block is already stored.
    ///
    /// Not a failure: callers skip forward.
    #[error("Block already added: {hash}")]
    BlockAlreadyAdded { hash: String },

    /// Chain continuity violation.
    #[error("Block integrity error: {0}")]
    BlockIntegrity(#[from] BlockIntegrityError),

    /// Domain logic error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Blockchain connectivity error.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Graceful shutdown was requested.
    #[error("Harvester shutdown requested")]
    ShutdownRequested,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarvesterError {
    /// True for the benign "already added" signal.
    pub fn is_already_added(&self) -> bool {
        matches!(self, Self::BlockAlreadyAdded { .. })
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for harvester operations.
pub type HarvesterResult<T> = Result<T, HarvesterError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: la chaîne de conversion d'erreurs fonctionne
    #[test]
    fn test_error_conversion_chain() {
        // Storage -> Domain -> Harvester
        let storage_err = StorageError::QueryError("db failed".into());
        let domain_err: DomainError = storage_err.into();
        let harvester_err: HarvesterError = domain_err.into();
        assert!(harvester_err.to_string().contains("db failed"));

        // Chain -> Harvester
        let chain_err = ChainError::RpcError("rpc failed".into());
        let harvester_err: HarvesterError = chain_err.into();
        assert!(harvester_err.to_string().contains("rpc failed"));
    }

    // Test critique: les plages manquantes sont lisibles pour planifier un backfill
    #[test]
    fn test_missing_blocks_lists_ranges() {
        let err = BlockIntegrityError::MissingBlocks(vec![
            BlockRange { from: 3, to: 3 },
            BlockRange { from: 10, to: 14 },
        ]);
        assert_eq!(err.to_string(), "Missing blocks: 3, 10-14");
    }

    #[test]
    fn test_already_added_is_benign() {
        let err = HarvesterError::BlockAlreadyAdded { hash: "0xab".into() };
        assert!(err.is_already_added());

        let err: HarvesterError = BlockIntegrityError::AlreadySequenced(5).into();
        assert!(!err.is_already_added());
    }
}
