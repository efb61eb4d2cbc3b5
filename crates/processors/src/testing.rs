//! Fixtures shared by the processor tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use harvester_core::error::{ChainError, ChainResult};
use harvester_core::models::{
    BlockHash, CallParam, ChainBlock, ChainEvent, ChainExtrinsic, ChainHead, EventAttribute,
    EventPhase, Signer, SignerKind, StorageParam, StorageQuery,
};
use harvester_core::ports::{AddressCodec, ChainSource};
use harvester_core::services::{Harvester, HarvesterConfig};
use harvester_storage::MemoryStore;

use crate::BundleRegistry;

/// Renders addresses as readable tags.
pub struct TestCodec;

impl AddressCodec for TestCodec {
    fn encode_account(&self, account_id: &str) -> Option<String> {
        hex::decode(account_id).ok()?;
        Some(format!("addr:{account_id}"))
    }

    fn encode_index(&self, index: u32) -> String {
        format!("idx:{index}")
    }
}

// =============================================================================
// Chain
// =============================================================================

pub fn hash_of(number: u64) -> BlockHash {
    let mut bytes = [0xab; 32];
    bytes[..8].copy_from_slice(&number.to_be_bytes());
    BlockHash(bytes)
}

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
}

/// Bare hex account id made of one repeated byte.
pub fn account(byte: u8) -> String {
    hex::encode([byte; 32])
}

/// Empty block `number` chained to `number - 1`.
pub fn chain_block(number: u64, datetime: DateTime<Utc>) -> ChainBlock {
    ChainBlock {
        number,
        hash: hash_of(number),
        parent_hash: match number {
            0 => BlockHash([0; 32]),
            n => hash_of(n - 1),
        },
        state_root: BlockHash([0; 32]),
        extrinsics_root: BlockHash([0; 32]),
        datetime,
        spec_version: 1,
        extrinsics: Vec::new(),
        events: Vec::new(),
        logs: Vec::new(),
    }
}

pub fn event(
    event_idx: u32,
    extrinsic_idx: Option<u32>,
    module: &str,
    name: &str,
    attributes: Vec<(&str, serde_json::Value)>,
) -> ChainEvent {
    ChainEvent {
        event_idx,
        phase: match extrinsic_idx {
            Some(_) => EventPhase::ApplyExtrinsic,
            None => EventPhase::Finalization,
        },
        extrinsic_idx,
        module_id: module.to_string(),
        event_id: name.to_string(),
        attributes: attributes
            .into_iter()
            .map(|(type_name, value)| EventAttribute {
                type_name: type_name.to_string(),
                value,
            })
            .collect(),
    }
}

pub fn extrinsic(
    extrinsic_idx: u32,
    module: &str,
    call: &str,
    signer: Option<&str>,
    params: Vec<(&str, serde_json::Value)>,
) -> ChainExtrinsic {
    ChainExtrinsic {
        extrinsic_idx,
        module_id: module.to_string(),
        call_id: call.to_string(),
        signer: signer.map(|address| Signer {
            address: address.to_string(),
            kind: SignerKind::Id,
        }),
        success: true,
        params: params
            .into_iter()
            .map(|(name, value)| CallParam {
                name: name.to_string(),
                type_name: String::new(),
                value,
            })
            .collect(),
    }
}

/// A chain held in memory. Storage answers ignore the block hash.
#[derive(Default)]
pub struct FakeChain {
    blocks: BTreeMap<u64, ChainBlock>,
    storage: HashMap<String, serde_json::Value>,
}

fn storage_key(module: &str, function: &str, params: &[StorageParam]) -> String {
    format!("{module}.{function}{params:?}")
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: ChainBlock) {
        self.blocks.insert(block.number, block);
    }

    pub fn set_storage(
        &mut self,
        module: &str,
        function: &str,
        params: Vec<StorageParam>,
        value: serde_json::Value,
    ) {
        self.storage
            .insert(storage_key(module, function, &params), value);
    }
}

#[async_trait]
impl ChainSource for FakeChain {
    async fn finalized_head(&self) -> ChainResult<ChainHead> {
        let (&number, block) = self
            .blocks
            .iter()
            .next_back()
            .ok_or_else(|| ChainError::RpcError("empty chain".into()))?;
        Ok(ChainHead {
            number,
            hash: block.hash,
        })
    }

    async fn block_hash(&self, number: u64) -> ChainResult<BlockHash> {
        self.blocks
            .get(&number)
            .map(|b| b.hash)
            .ok_or(ChainError::UnknownBlock(number))
    }

    async fn fetch_block(&self, hash: &BlockHash) -> ChainResult<ChainBlock> {
        self.blocks
            .values()
            .find(|b| b.hash == *hash)
            .cloned()
            .ok_or_else(|| ChainError::BlockFetchError {
                at: hash.to_hex(),
                message: "not in fake chain".into(),
            })
    }

    async fn storage(&self, query: &StorageQuery) -> ChainResult<Option<serde_json::Value>> {
        Ok(self
            .storage
            .get(&storage_key(query.module, query.function, &query.params))
            .cloned())
    }
}

/// Harvester over `chain` with every standard bundle and a fresh store.
pub fn harvester(chain: FakeChain) -> (Harvester<FakeChain, MemoryStore>, MemoryStore) {
    harvester_with(HarvesterConfig::default(), chain)
}

pub fn harvester_with(
    config: HarvesterConfig,
    chain: FakeChain,
) -> (Harvester<FakeChain, MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    let registry = BundleRegistry::standard().into_processor_registry();
    let harvester = Harvester::new(
        config,
        Arc::new(chain),
        Arc::new(store.clone()),
        Arc::new(registry),
        Arc::new(TestCodec),
    );
    (harvester, store)
}
