//! Port traits for the chain collaborator.
//!
//! [`ChainSource`] delivers decoded blocks and answers storage lookups.
//! [`AddressCodec`] renders account ids and indices as chain addresses.
//! Implementations live in the infrastructure layer (e.g., `harvester-substrate`).

use async_trait::async_trait;

use crate::error::ChainResult;
use crate::models::{BlockHash, ChainBlock, ChainHead, StorageQuery};

/// Port trait for blockchain data source.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Get the current finalized block head.
    async fn finalized_head(&self) -> ChainResult<ChainHead>;

    /// Hash of the block at `number`.
    ///
    /// Fails with [`crate::error::ChainError::UnknownBlock`] past the head.
    async fn block_hash(&self, number: u64) -> ChainResult<BlockHash>;

    /// Fetch and decode a full block.
    async fn fetch_block(&self, hash: &BlockHash) -> ChainResult<ChainBlock>;

    /// Read a storage item at a block.
    ///
    /// Returns `Ok(None)` when the item is absent or unknown to the
    /// runtime at that block.
    async fn storage(&self, query: &StorageQuery) -> ChainResult<Option<serde_json::Value>>;
}

/// Address rendering for account ids and account indices.
pub trait AddressCodec: Send + Sync {
    /// Encode a bare-hex account id. Returns `None` if it is not valid hex.
    fn encode_account(&self, account_id: &str) -> Option<String>;

    /// Encode an account index.
    fn encode_index(&self, index: u32) -> String;
}
