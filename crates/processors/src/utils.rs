//! Shared utilities for event processors.
//!
//! This module provides the parsing and extraction functions used across
//! event processors to read typed values out of decoded event attributes
//! and call arguments.

use tracing::warn;

use harvester_core::metrics::record_decode_error;
use harvester_core::models::parse_u128_value;
use harvester_core::ports::EventContext;

// =============================================================================
// Event field extraction
// =============================================================================

/// Read attribute `index` of the event and parse it.
///
/// A value that fails to parse is logged and counted as a decode error;
/// the caller then skips the event.
///
/// # Example
///
/// ```ignore
/// let Some(account_id) = attribute(ctx, 0, "account_id", parse_account) else {
///     return Ok(());
/// };
/// ```
pub fn attribute<T>(
    ctx: &EventContext<'_>,
    index: usize,
    field: &'static str,
    parser: fn(&serde_json::Value) -> Option<T>,
) -> Option<T> {
    let parsed = ctx.event.attr(index).and_then(parser);
    if parsed.is_none() {
        record_decode_error("event", &ctx.event.module_id);
        warn!(
            block = ctx.block.number,
            event = ctx.event.event_idx,
            module = %ctx.event.module_id,
            name = %ctx.event.event_id,
            field,
            "⚠️  Failed to parse event attribute, skipping"
        );
    }
    parsed
}

/// Extract a field from an object, trying multiple key names in order.
///
/// ```ignore
/// let stash = extract_field(ledger, &["stash", "Stash"], parse_account);
/// ```
pub fn extract_field<T>(
    data: &serde_json::Value,
    keys: &[&str],
    parser: fn(&serde_json::Value) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .find_map(|key| data.get(*key))
        .and_then(parser)
}

// =============================================================================
// Account parsing
// =============================================================================

/// Parse an account id from various JSON representations into bare
/// lowercase hex, the form fact tables store.
///
/// Handles:
/// - Hex string: `"0x1234..."` or `"1234..."`
/// - Wrapped object: `{ "Id": "0x..." }`
/// - Array wrapper: `["0x..."]`
/// - Byte array: `[b0, b1, ..., b31]`
pub fn parse_account(value: &serde_json::Value) -> Option<String> {
    parse_hash256(value)
        .or_else(|| match value {
            serde_json::Value::Object(obj) => obj
                .get("Id")
                .or_else(|| obj.get("id"))
                .and_then(parse_hash256),
            serde_json::Value::Array(arr) if arr.len() == 1 => parse_hash256(&arr[0]),
            _ => None,
        })
        .map(hex::encode)
}

// =============================================================================
// Numeric parsing
// =============================================================================

/// Parse an amount (u128) from JSON.
///
/// Handles numbers, decimal strings and `0x` hex strings, which is
/// important because JSON numbers are limited to u64 but amounts can be u128.
pub fn parse_amount(value: &serde_json::Value) -> Option<u128> {
    parse_u128_value(value)
}

/// Parse a u64 from JSON.
pub fn parse_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parse a u32 from JSON.
pub fn parse_u32(value: &serde_json::Value) -> Option<u32> {
    parse_u64(value).and_then(|v| v.try_into().ok())
}

/// Parse a bool from JSON, accepting `"true"`/`"false"` strings.
pub fn parse_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Hash/bytes parsing
// =============================================================================

/// Parse a 32-byte hash from JSON.
///
/// Handles:
/// - Hex string: `"0x1234..."`
/// - Byte array: `[b0, b1, ..., b31]`
pub fn parse_hash256(value: &serde_json::Value) -> Option<[u8; 32]> {
    parse_bytes(value).and_then(|bytes| bytes.try_into().ok())
}

/// Parse a 32-byte hash into bare lowercase hex.
pub fn parse_hash_hex(value: &serde_json::Value) -> Option<String> {
    parse_hash256(value).map(hex::encode)
}

/// Parse arbitrary bytes from JSON.
///
/// Handles:
/// - Hex string: `"0x1234..."`
/// - Byte array: `[b0, b1, ...]`
pub fn parse_bytes(value: &serde_json::Value) -> Option<Vec<u8>> {
    match value {
        serde_json::Value::String(s) => {
            let hex_str = s.strip_prefix("0x").unwrap_or(s);
            hex::decode(hex_str).ok()
        }
        serde_json::Value::Array(arr) => arr
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}

/// Render a value as an identifier string: strings lose their `0x` prefix,
/// anything else is kept as compact JSON.
pub fn parse_identifier(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.strip_prefix("0x").unwrap_or(s).to_string()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
