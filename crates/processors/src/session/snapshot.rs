//! Staking state lookups behind a session rotation.

use std::collections::HashMap;

use tracing::debug;

use harvester_core::error::ChainResult;
use harvester_core::models::{
    BlockHash, SessionSnapshot, StorageParam, StorageQuery, ValidatorSnapshot,
};
use harvester_core::ports::ChainSource;

use crate::utils::{
    extract_field, parse_account, parse_amount, parse_hash_hex, parse_identifier, parse_u32,
};

/// Read era, validator set, ledgers, preferences and exposures at `block_hash`.
///
/// Missing storage entries leave the matching fields empty.
pub async fn read_session_snapshot(
    chain: &dyn ChainSource,
    block_hash: BlockHash,
    legacy: bool,
) -> ChainResult<SessionSnapshot> {
    let era = chain
        .storage(&StorageQuery::new("Staking", "CurrentEra", block_hash))
        .await?
        .as_ref()
        .and_then(parse_u32);

    let validators: Vec<String> = chain
        .storage(&StorageQuery::new("Session", "Validators", block_hash))
        .await?
        .as_ref()
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(parse_account).collect())
        .unwrap_or_default();

    let queued_keys = if legacy {
        HashMap::new()
    } else {
        chain
            .storage(&StorageQuery::new("Session", "QueuedKeys", block_hash))
            .await?
            .as_ref()
            .map(parse_queued_keys)
            .unwrap_or_default()
    };

    let mut snapshots = Vec::with_capacity(validators.len());
    for validator in validators {
        let mut snapshot = ValidatorSnapshot::default();

        let ledger = if legacy {
            let ledger = lookup(
                chain,
                "Staking",
                "Ledger",
                block_hash,
                StorageParam::AccountId(validator.clone()),
            )
            .await?;
            snapshot.stash = ledger
                .as_ref()
                .and_then(|l| extract_field(l, &["stash"], parse_account));
            snapshot.session_key = lookup(
                chain,
                "Session",
                "NextKeyFor",
                block_hash,
                StorageParam::AccountId(validator.clone()),
            )
            .await?
            .as_ref()
            .and_then(|k| parse_hash_hex(k).or_else(|| parse_identifier(k)));
            snapshot.controller = Some(validator);
            ledger
        } else {
            snapshot.session_key = queued_keys.get(&validator).cloned();
            snapshot.controller = lookup(
                chain,
                "Staking",
                "Bonded",
                block_hash,
                StorageParam::AccountId(validator.clone()),
            )
            .await?
            .as_ref()
            .and_then(parse_account);
            snapshot.stash = Some(validator);
            match &snapshot.controller {
                Some(controller) => {
                    lookup(
                        chain,
                        "Staking",
                        "Ledger",
                        block_hash,
                        StorageParam::AccountId(controller.clone()),
                    )
                    .await?
                }
                None => None,
            }
        };

        if let Some(ledger) = &ledger {
            snapshot.bonded_active = extract_field(ledger, &["active"], parse_amount);
            snapshot.unlocking = ledger.get("unlocking").cloned();
        }

        if let Some(stash) = snapshot.stash.clone() {
            read_prefs(chain, block_hash, &stash, &mut snapshot).await?;
            read_exposure(chain, block_hash, &stash, era, &mut snapshot).await?;
        } else {
            debug!(controller = ?snapshot.controller, "Validator without stash");
        }

        snapshots.push(snapshot);
    }

    Ok(SessionSnapshot {
        era,
        validators: snapshots,
    })
}

async fn lookup(
    chain: &dyn ChainSource,
    module: &'static str,
    function: &'static str,
    block_hash: BlockHash,
    param: StorageParam,
) -> ChainResult<Option<serde_json::Value>> {
    chain
        .storage(&StorageQuery::new(module, function, block_hash).param(param))
        .await
}

async fn read_prefs(
    chain: &dyn ChainSource,
    block_hash: BlockHash,
    stash: &str,
    snapshot: &mut ValidatorSnapshot,
) -> ChainResult<()> {
    let Some(prefs) = lookup(
        chain,
        "Staking",
        "Validators",
        block_hash,
        StorageParam::AccountId(stash.to_string()),
    )
    .await?
    else {
        return Ok(());
    };

    // Early runtimes wrap preferences in a `col1` tuple field
    let prefs = prefs.get("col1").unwrap_or(&prefs);
    snapshot.commission = extract_field(
        prefs,
        &["commission", "validatorPayment", "validator_payment"],
        parse_amount,
    );
    snapshot.unstake_threshold =
        extract_field(prefs, &["unstakeThreshold", "unstake_threshold"], parse_u32);
    Ok(())
}

async fn read_exposure(
    chain: &dyn ChainSource,
    block_hash: BlockHash,
    stash: &str,
    era: Option<u32>,
    snapshot: &mut ValidatorSnapshot,
) -> ChainResult<()> {
    let mut exposure = lookup(
        chain,
        "Staking",
        "Stakers",
        block_hash,
        StorageParam::AccountId(stash.to_string()),
    )
    .await?;

    if exposure.is_none()
        && let Some(era) = era
    {
        exposure = chain
            .storage(
                &StorageQuery::new("Staking", "ErasStakers", block_hash)
                    .param(StorageParam::U32(era))
                    .param(StorageParam::AccountId(stash.to_string())),
            )
            .await?;
    }

    let Some(exposure) = exposure else {
        return Ok(());
    };

    snapshot.exposure_total = extract_field(&exposure, &["total"], parse_amount);
    snapshot.exposure_own = extract_field(&exposure, &["own"], parse_amount);
    snapshot.nominators = exposure
        .get("others")
        .and_then(|o| o.as_array())
        .map(|others| {
            others
                .iter()
                .filter_map(|entry| {
                    let who = extract_field(entry, &["who"], parse_account)?;
                    Some((who, extract_field(entry, &["value"], parse_amount)))
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(())
}

/// Map validator to its grandpa key from `Session.QueuedKeys`.
///
/// Entries are `[validator, keys]` pairs or `{validator, keys}` objects;
/// `keys` is a named key set or a bare key.
fn parse_queued_keys(value: &serde_json::Value) -> HashMap<String, String> {
    let Some(entries) = value.as_array() else {
        return HashMap::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let (validator, keys) = match entry {
                serde_json::Value::Array(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
                serde_json::Value::Object(obj) => (obj.get("validator")?, obj.get("keys")?),
                _ => return None,
            };
            let validator = parse_account(validator)?;
            let key = extract_field(keys, &["grandpa", "ed25519"], parse_hash_hex)
                .or_else(|| parse_hash_hex(keys))?;
            Some((validator, key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hex(byte: &str) -> String {
        "0x".to_string() + &byte.repeat(32)
    }

    #[test]
    fn test_parse_queued_keys_layouts() {
        let value = json!([
            [hex("01"), { "grandpa": hex("aa"), "babe": hex("bb") }],
            { "validator": hex("02"), "keys": { "ed25519": hex("cc") } },
            [hex("03"), hex("dd")],
        ]);
        let keys = parse_queued_keys(&value);

        assert_eq!(keys.get(&"01".repeat(32)), Some(&"aa".repeat(32)));
        assert_eq!(keys.get(&"02".repeat(32)), Some(&"cc".repeat(32)));
        assert_eq!(keys.get(&"03".repeat(32)), Some(&"dd".repeat(32)));
    }

    #[test]
    fn test_parse_queued_keys_skips_malformed_entries() {
        let value = json!([[hex("01")], { "validator": hex("02") }, "garbage"]);
        assert!(parse_queued_keys(&value).is_empty());
        assert!(parse_queued_keys(&json!(null)).is_empty());
    }
}
