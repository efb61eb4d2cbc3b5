//! Decoded chain input, as delivered by a [`crate::ports::ChainSource`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BlockHash;

/// Finalized head reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
    pub number: u64,
    pub hash: BlockHash,
}

/// A fully decoded block: header, extrinsics, events and raw log digests.
#[derive(Debug, Clone)]
pub struct ChainBlock {
    pub number: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub state_root: BlockHash,
    pub extrinsics_root: BlockHash,
    pub datetime: DateTime<Utc>,
    pub spec_version: u32,
    pub extrinsics: Vec<ChainExtrinsic>,
    pub events: Vec<ChainEvent>,
    /// SCALE-encoded digest items, in header order.
    pub logs: Vec<Vec<u8>>,
}

impl ChainBlock {
    /// Extrinsic that emitted `event`, if any.
    pub fn extrinsic_for(&self, event: &ChainEvent) -> Option<&ChainExtrinsic> {
        let idx = event.extrinsic_idx?;
        self.extrinsics.iter().find(|x| x.extrinsic_idx == idx)
    }
}

// =============================================================================
// Extrinsics
// =============================================================================

/// How a signed extrinsic names its signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerKind {
    /// Full account id.
    Id,
    /// Compact account index.
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    /// Bare hex account id, or the decimal index for [`SignerKind::Index`].
    pub address: String,
    pub kind: SignerKind,
}

/// One named call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallParam {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainExtrinsic {
    pub extrinsic_idx: u32,
    pub module_id: String,
    pub call_id: String,
    pub signer: Option<Signer>,
    pub success: bool,
    pub params: Vec<CallParam>,
}

impl ChainExtrinsic {
    /// Value of the call argument `name`, if present.
    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Signer address, if signed.
    pub fn address(&self) -> Option<&str> {
        self.signer.as_ref().map(|s| s.address.as_str())
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    ApplyExtrinsic,
    Finalization,
    Initialization,
}

impl EventPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplyExtrinsic => "apply_extrinsic",
            Self::Finalization => "finalization",
            Self::Initialization => "initialization",
        }
    }
}

/// One typed event attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAttribute {
    /// Declared type name, e.g. `AccountId` or `Balance`.
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub event_idx: u32,
    pub phase: EventPhase,
    pub extrinsic_idx: Option<u32>,
    /// Lowercase module name, e.g. `balances`.
    pub module_id: String,
    pub event_id: String,
    pub attributes: Vec<EventAttribute>,
}

impl ChainEvent {
    pub fn attr(&self, idx: usize) -> Option<&serde_json::Value> {
        self.attributes.get(idx).map(|a| &a.value)
    }

    /// True when attribute count and declared types match `shape`.
    ///
    /// `"_"` matches any type.
    pub fn matches_shape(&self, shape: &[&str]) -> bool {
        self.attributes.len() == shape.len()
            && self
                .attributes
                .iter()
                .zip(shape)
                .all(|(attr, expected)| *expected == "_" || attr.type_name == *expected)
    }
}

// =============================================================================
// Storage Lookups
// =============================================================================

/// Key argument of a storage lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageParam {
    /// Bare hex account id.
    AccountId(String),
    /// 32-byte hash, hex.
    Hash(String),
    U32(u32),
}

/// Storage item read at a specific block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageQuery {
    pub module: &'static str,
    pub function: &'static str,
    pub block_hash: BlockHash,
    pub params: Vec<StorageParam>,
}

impl StorageQuery {
    pub fn new(module: &'static str, function: &'static str, block_hash: BlockHash) -> Self {
        Self {
            module,
            function,
            block_hash,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: StorageParam) -> Self {
        self.params.push(param);
        self
    }
}
