//! Header digest items.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use harvester_core::error::HarvesterResult;
use harvester_core::metrics::record_decode_error;
use harvester_core::models::Log;
use harvester_core::ports::{BlockAccumulation, BlockProcessor, FactTx};

/// Decodes every digest item of the header into a [`Log`] row and sets
/// `count_logs`.
pub struct LogProcessor;

#[async_trait]
impl BlockProcessor for LogProcessor {
    fn name(&self) -> &'static str {
        "logs"
    }

    async fn accumulation_hook(
        &self,
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = acc.block.id;
        let logs: Vec<Log> = acc
            .logs
            .iter()
            .enumerate()
            .map(|(idx, raw)| decode_log(block_id, idx as u32, raw))
            .collect();

        acc.block.counters.logs = logs.len() as i64;
        tx.insert_logs(&logs).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_logs(block_id).await?;
        Ok(())
    }
}

// =============================================================================
// Digest decoding
// =============================================================================

/// Decode one SCALE-encoded digest item.
///
/// Items that cannot be decoded are kept as `Unknown` with their raw bytes.
pub fn decode_log(block_id: u64, log_idx: u32, raw: &[u8]) -> Log {
    match decode_digest(raw) {
        Some((type_id, type_name, data)) => Log {
            block_id,
            log_idx,
            type_id,
            type_name: type_name.to_string(),
            data,
        },
        None => {
            record_decode_error("log", "system");
            debug!(block = block_id, log = log_idx, "Undecodable digest item");
            Log {
                block_id,
                log_idx,
                type_id: raw.first().copied().unwrap_or(u8::MAX),
                type_name: "Unknown".to_string(),
                data: json!({ "raw": format!("0x{}", hex::encode(raw)) }),
            }
        }
    }
}

fn decode_digest(raw: &[u8]) -> Option<(u8, &'static str, serde_json::Value)> {
    let (&type_id, body) = raw.split_first()?;

    let decoded = match type_id {
        0 => ("Other", json!({ "data": to_hex(compact_bytes(body)?) })),
        2 if body.len() == 32 => ("ChangesTrieRoot", json!({ "hash": to_hex(body) })),
        4 | 5 | 6 => {
            let (engine, rest) = body.split_at_checked(4)?;
            let name = match type_id {
                4 => "Consensus",
                5 => "Seal",
                _ => "PreRuntime",
            };
            (
                name,
                json!({
                    "engine": String::from_utf8_lossy(engine),
                    "data": to_hex(compact_bytes(rest)?),
                }),
            )
        }
        8 if body.is_empty() => ("RuntimeEnvironmentUpdated", serde_json::Value::Null),
        _ => return None,
    };

    Some((type_id, decoded.0, decoded.1))
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// A length-prefixed byte vector that must span the whole input.
fn compact_bytes(input: &[u8]) -> Option<&[u8]> {
    let (len, rest) = compact_len(input)?;
    (rest.len() == len).then_some(rest)
}

/// SCALE compact integer used as a length prefix.
fn compact_len(input: &[u8]) -> Option<(usize, &[u8])> {
    let first = *input.first()?;
    match first & 0b11 {
        0 => Some(((first >> 2) as usize, &input[1..])),
        1 => {
            let (b, rest) = input.split_at_checked(2)?;
            Some(((u16::from_le_bytes([b[0], b[1]]) >> 2) as usize, rest))
        }
        2 => {
            let (b, rest) = input.split_at_checked(4)?;
            Some(((u32::from_le_bytes([b[0], b[1], b[2], b[3]]) >> 2) as usize, rest))
        }
        _ => {
            let n = (first >> 2) as usize + 4;
            if n > 8 {
                return None;
            }
            let (b, rest) = input[1..].split_at_checked(n)?;
            let mut buf = [0u8; 8];
            buf[..n].copy_from_slice(b);
            usize::try_from(u64::from_le_bytes(buf))
                .ok()
                .map(|len| (len, rest))
        }
    }
}
