//! Substrate RPC client with dynamic metadata decoding.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use subxt::backend::chain_head::{ChainHeadBackend, ChainHeadBackendBuilder};
use subxt::backend::legacy::LegacyRpcMethods;
use subxt::backend::legacy::rpc_methods::BlockNumber;
use subxt::backend::rpc::RpcClient;
use subxt::blocks::{Block, Extrinsics};
use subxt::dynamic::Value;
use subxt::events::{Events, Phase};
use subxt::ext::codec::Encode;
use subxt::utils::H256;
use subxt::{OnlineClient, PolkadotConfig};
use tracing::{debug, instrument, trace, warn};

use harvester_core::error::{ChainError, ChainResult};
use harvester_core::metrics::record_decode_error;
use harvester_core::models::{
    BlockHash, CallParam, ChainBlock, ChainEvent, ChainExtrinsic, ChainHead, EventAttribute,
    EventPhase, StorageParam, StorageQuery,
};
use harvester_core::ports::ChainSource;

use crate::decode::{
    composite_fields, decode_signer, field_to_json, normalize_type_name,
    parse_timestamp_from_debug, try_decode_compact_u64, value_to_json,
};

/// Configuration for the Substrate client.
#[derive(Debug, Clone)]
pub struct SubstrateClientConfig {
    /// WebSocket URL (e.g., "ws://localhost:9944").
    pub ws_url: String,
}

pub type SubstrateBlock = Block<PolkadotConfig, OnlineClient<PolkadotConfig>>;

impl Default for SubstrateClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:9944".to_string(),
        }
    }
}

/// Substrate client adapter implementing the [`ChainSource`] port.
///
/// Blocks and storage go through the chain-head backend; block hashes by
/// number and historical runtime versions use the legacy RPC methods.
pub struct SubstrateClient {
    client: OnlineClient<PolkadotConfig>,
    rpc: LegacyRpcMethods<PolkadotConfig>,
}

impl SubstrateClient {
    /// Connect to a Substrate node.
    #[instrument(skip_all, fields(url = %config.ws_url))]
    pub async fn connect(config: SubstrateClientConfig) -> ChainResult<Self> {
        debug!("Connecting to node");

        let rpc_client = RpcClient::from_url(&config.ws_url)
            .await
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;
        let backend: ChainHeadBackend<PolkadotConfig> =
            ChainHeadBackendBuilder::default().build_with_background_driver(rpc_client.clone());
        let client = OnlineClient::<PolkadotConfig>::from_backend(Arc::new(backend))
            .await
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;
        let rpc = LegacyRpcMethods::<PolkadotConfig>::new(rpc_client);

        debug!(
            spec_version = client.runtime_version().spec_version,
            "Connected successfully"
        );

        Ok(Self { client, rpc })
    }

    async fn spec_version_at(&self, hash: H256) -> ChainResult<u32> {
        let version = self
            .rpc
            .state_get_runtime_version(Some(hash))
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;
        Ok(version.spec_version)
    }

    /// True when the current runtime declares `module.function`.
    fn has_storage_entry(&self, module: &str, function: &str) -> bool {
        let metadata = self.client.metadata();
        metadata
            .pallet_by_name(module)
            .and_then(|pallet| pallet.storage())
            .and_then(|storage| storage.entry_by_name(function))
            .is_some()
    }
}

#[async_trait]
impl ChainSource for SubstrateClient {
    async fn finalized_head(&self) -> ChainResult<ChainHead> {
        let head = self
            .client
            .blocks()
            .at_latest()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        Ok(ChainHead {
            number: head.number() as u64,
            hash: BlockHash(head.hash().0),
        })
    }

    async fn block_hash(&self, number: u64) -> ChainResult<BlockHash> {
        let hash = self
            .rpc
            .chain_get_block_hash(Some(BlockNumber::from(number)))
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        hash.map(|h| BlockHash(h.0))
            .ok_or(ChainError::UnknownBlock(number))
    }

    #[instrument(skip_all, fields(hash = %hash))]
    async fn fetch_block(&self, hash: &BlockHash) -> ChainResult<ChainBlock> {
        let fetch_error = |e: subxt::Error| ChainError::BlockFetchError {
            at: hash.to_hex(),
            message: e.to_string(),
        };

        let block = self.client.blocks().at(H256(hash.0)).await.map_err(fetch_error)?;
        let (extrinsics, events) =
            futures::try_join!(block.extrinsics(), block.events()).map_err(fetch_error)?;
        let spec_version = self.spec_version_at(block.hash()).await?;

        let header = block.header();
        let logs = header.digest.logs.iter().map(|item| item.encode()).collect();

        let datetime = match block_timestamp(&block, &extrinsics) {
            Some(ms) => DateTime::<Utc>::from_timestamp_millis(ms as i64).ok_or_else(|| {
                ChainError::BlockFetchError {
                    at: hash.to_hex(),
                    message: format!("timestamp out of range: {ms}"),
                }
            })?,
            // Genesis carries no Timestamp.set inherent
            None => {
                debug!(block = block.number(), "No timestamp inherent, using epoch");
                DateTime::<Utc>::UNIX_EPOCH
            }
        };

        Ok(ChainBlock {
            number: block.number() as u64,
            hash: *hash,
            parent_hash: BlockHash(header.parent_hash.0),
            state_root: BlockHash(header.state_root.0),
            extrinsics_root: BlockHash(header.extrinsics_root.0),
            datetime,
            spec_version,
            extrinsics: decode_extrinsics(&extrinsics, &events),
            events: decode_events(&events),
            logs,
        })
    }

    async fn storage(&self, query: &StorageQuery) -> ChainResult<Option<serde_json::Value>> {
        if !self.has_storage_entry(query.module, query.function) {
            trace!(
                module = query.module,
                function = query.function,
                "Storage entry not in metadata"
            );
            return Ok(None);
        }

        let lookup_error = |message: String| ChainError::StorageLookup {
            module: query.module.to_string(),
            function: query.function.to_string(),
            message,
        };

        let keys = query
            .params
            .iter()
            .map(storage_key)
            .collect::<Result<Vec<_>, _>>()
            .map_err(lookup_error)?;
        let address = subxt::dynamic::storage(query.module, query.function, keys);

        let fetched = self
            .client
            .storage()
            .at(H256(query.block_hash.0))
            .fetch(&address)
            .await
            .map_err(|e| lookup_error(e.to_string()))?;

        match fetched {
            Some(thunk) => {
                let value = thunk.to_value().map_err(|e| lookup_error(e.to_string()))?;
                Ok(Some(value_to_json(&value)))
            }
            None => Ok(None),
        }
    }
}

fn storage_key(param: &StorageParam) -> Result<Value, String> {
    match param {
        StorageParam::AccountId(hex_id) | StorageParam::Hash(hex_id) => {
            let bytes = hex::decode(hex_id.strip_prefix("0x").unwrap_or(hex_id))
                .map_err(|e| format!("invalid key {hex_id}: {e}"))?;
            Ok(Value::from_bytes(bytes))
        }
        StorageParam::U32(n) => Ok(Value::u128(u128::from(*n))),
    }
}

// =============================================================================
// Block decoding helpers
// =============================================================================

/// Decode events from a block.
fn decode_events(events: &Events<PolkadotConfig>) -> Vec<ChainEvent> {
    let mut decoded = Vec::new();

    for (index, event) in events.iter().enumerate() {
        let ev = match event {
            Ok(ev) => ev,
            Err(e) => {
                trace!(index, error = ?e, "Failed to decode event");
                record_decode_error("event", "unknown");
                continue;
            }
        };

        let module_id = ev.pallet_name().to_lowercase();
        let fields = match ev.field_values() {
            Ok(fields) => fields,
            Err(e) => {
                trace!(index, error = ?e, "Failed to decode event fields");
                record_decode_error("event", &module_id);
                continue;
            }
        };

        let metadata = ev.event_metadata();
        let attributes = composite_fields(&fields)
            .into_iter()
            .enumerate()
            .map(|(i, (_, value))| {
                let type_name = metadata
                    .variant
                    .fields
                    .get(i)
                    .and_then(|f| f.type_name.as_deref())
                    .map(normalize_type_name)
                    .unwrap_or_default();
                EventAttribute {
                    value: field_to_json(&type_name, value),
                    type_name,
                }
            })
            .collect();

        let (phase, extrinsic_idx) = match ev.phase() {
            Phase::ApplyExtrinsic(idx) => (EventPhase::ApplyExtrinsic, Some(idx)),
            Phase::Finalization => (EventPhase::Finalization, None),
            Phase::Initialization => (EventPhase::Initialization, None),
        };

        decoded.push(ChainEvent {
            event_idx: index as u32,
            phase,
            extrinsic_idx,
            module_id,
            event_id: ev.variant_name().to_string(),
            attributes,
        });
    }

    decoded
}

/// Decode extrinsics from a block.
fn decode_extrinsics(
    extrinsics: &Extrinsics<PolkadotConfig, OnlineClient<PolkadotConfig>>,
    events: &Events<PolkadotConfig>,
) -> Vec<ChainExtrinsic> {
    let mut decoded = Vec::new();

    for (index, ext) in extrinsics.iter().enumerate() {
        let (Ok(pallet), Ok(call)) = (ext.pallet_name(), ext.variant_name()) else {
            trace!(index, "Extrinsic without known call");
            record_decode_error("extrinsic", "unknown");
            continue;
        };
        let module_id = pallet.to_lowercase();

        let signer = ext.address_bytes().and_then(|bytes| {
            let signer = decode_signer(bytes);
            if signer.is_none() {
                trace!(index, len = bytes.len(), "Unsupported signer address");
            }
            signer
        });

        let field_types: Vec<String> = ext
            .extrinsic_metadata()
            .map(|meta| {
                meta.variant
                    .fields
                    .iter()
                    .map(|f| f.type_name.as_deref().map(normalize_type_name).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        let params = match ext.field_values() {
            Ok(fields) => composite_fields(&fields)
                .into_iter()
                .enumerate()
                .map(|(i, (name, value))| {
                    let type_name = field_types.get(i).cloned().unwrap_or_default();
                    CallParam {
                        name: name.unwrap_or_else(|| i.to_string()),
                        value: field_to_json(&type_name, value),
                        type_name,
                    }
                })
                .collect(),
            Err(e) => {
                trace!(index, error = ?e, "Failed to decode call arguments");
                record_decode_error("extrinsic", &module_id);
                Vec::new()
            }
        };

        decoded.push(ChainExtrinsic {
            extrinsic_idx: index as u32,
            module_id,
            call_id: call.to_string(),
            signer,
            success: get_extrinsic_result(events, index as u32),
            params,
        });
    }

    decoded
}

/// Get extrinsic result from events.
fn get_extrinsic_result(events: &Events<PolkadotConfig>, ext_index: u32) -> bool {
    for ev in events.iter().flatten() {
        if let Phase::ApplyExtrinsic(idx) = ev.phase()
            && idx == ext_index
            && ev.pallet_name() == "System"
        {
            match ev.variant_name() {
                "ExtrinsicSuccess" => return true,
                "ExtrinsicFailed" => return false,
                _ => {}
            }
        }
    }
    true
}

/// Get the millisecond timestamp from the Timestamp.set inherent.
fn block_timestamp(
    block: &SubstrateBlock,
    extrinsics: &Extrinsics<PolkadotConfig, OnlineClient<PolkadotConfig>>,
) -> Option<u64> {
    for ext in extrinsics.iter() {
        let (Ok(pallet), Ok(call)) = (ext.pallet_name(), ext.variant_name()) else {
            continue;
        };
        if pallet != "Timestamp" || call != "set" {
            continue;
        }

        if let Ok(values) = ext.field_values() {
            let value_str = format!("{values:?}");
            if let Some(ts) = parse_timestamp_from_debug(&value_str) {
                return Some(ts);
            }

            warn!(
                block = block.number(),
                "Could not parse timestamp from Timestamp.set: {:?}", values
            );
        }

        let bytes = ext.bytes();
        if bytes.len() >= 5
            && let Some(ts) = try_decode_compact_u64(&bytes[2..])
        {
            return Some(ts);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(SubstrateClientConfig::default().ws_url, "ws://127.0.0.1:9944");
    }

    #[test]
    fn test_storage_key_forms() {
        assert!(storage_key(&StorageParam::AccountId("0x".to_string() + &"01".repeat(32))).is_ok());
        assert!(storage_key(&StorageParam::Hash("ab".repeat(32))).is_ok());
        assert!(storage_key(&StorageParam::U32(7)).is_ok());
        assert!(storage_key(&StorageParam::AccountId("zz".into())).is_err());
    }
}
