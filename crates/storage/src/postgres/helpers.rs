//! Shared helper functions for PostgreSQL row conversion.

use sqlx::Row;
use sqlx::postgres::PgRow;

use harvester_core::error::{StorageError, StorageResult};
use harvester_core::models::BlockCounters;

/// Convert a `Vec<u8>` to a fixed-size 32-byte array.
///
/// Returns an error if the length doesn't match.
pub fn bytes_to_hash32(bytes: Vec<u8>, field_name: &str) -> StorageResult<[u8; 32]> {
    bytes.try_into().map_err(|v: Vec<u8>| {
        StorageError::SerializationError(format!(
            "{} has invalid length: expected 32, got {}",
            field_name,
            v.len()
        ))
    })
}

/// Convert a `Vec<u8>` to a 32-byte array, rejecting all-zero values as corrupt.
///
/// Use for block hashes only: genesis legitimately has an all-zero parent.
pub fn bytes_to_hash32_strict(bytes: Vec<u8>, field_name: &str) -> StorageResult<[u8; 32]> {
    let arr = bytes_to_hash32(bytes, field_name)?;

    if arr == [0u8; 32] {
        return Err(StorageError::SerializationError(format!(
            "{} is all zeros, which indicates data corruption",
            field_name
        )));
    }

    Ok(arr)
}

/// Parse a `NUMERIC` read back as text.
pub fn parse_numeric(value: Option<String>, field_name: &str) -> StorageResult<Option<u128>> {
    value
        .map(|s| {
            s.parse::<u128>().map_err(|e| {
                StorageError::SerializationError(format!(
                    "{} is not an unsigned 128-bit integer ({}): {}",
                    field_name, s, e
                ))
            })
        })
        .transpose()
}

/// Like [`parse_numeric`] for `NOT NULL` columns.
pub fn parse_numeric_required(value: String, field_name: &str) -> StorageResult<u128> {
    parse_numeric(Some(value), field_name)?.ok_or_else(|| {
        StorageError::SerializationError(format!("{} is unexpectedly null", field_name))
    })
}

pub fn to_json<T: serde::Serialize>(value: &T, field_name: &str) -> StorageResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| {
        StorageError::SerializationError(format!("{} could not be encoded: {}", field_name, e))
    })
}

// =============================================================================
// Block counter columns
// =============================================================================

/// Counter names, in column order. Stored as `count_<name>` on blocks and
/// `total_<name>` on totals.
pub const COUNTER_NAMES: [&str; 18] = [
    "extrinsics",
    "extrinsics_success",
    "extrinsics_error",
    "extrinsics_signed",
    "extrinsics_unsigned",
    "extrinsics_signedby_address",
    "extrinsics_signedby_index",
    "events",
    "events_system",
    "events_module",
    "events_extrinsic",
    "events_finalization",
    "accounts",
    "accounts_new",
    "accounts_reaped",
    "sessions_new",
    "contracts_new",
    "logs",
];

pub fn counter_values(c: &BlockCounters) -> [i64; 18] {
    [
        c.extrinsics,
        c.extrinsics_success,
        c.extrinsics_error,
        c.extrinsics_signed,
        c.extrinsics_unsigned,
        c.extrinsics_signedby_address,
        c.extrinsics_signedby_index,
        c.events,
        c.events_system,
        c.events_module,
        c.events_extrinsic,
        c.events_finalization,
        c.accounts,
        c.accounts_new,
        c.accounts_reaped,
        c.sessions_new,
        c.contracts_new,
        c.logs,
    ]
}

/// `prefix_a, prefix_b, ...` for a column list.
pub fn counter_columns(prefix: &str) -> String {
    COUNTER_NAMES
        .iter()
        .map(|name| format!("{prefix}{name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `$first, $first+1, ...` placeholders for the counter columns.
pub fn counter_placeholders(first: usize) -> String {
    (first..first + COUNTER_NAMES.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn counters_from_row(row: &PgRow, prefix: &str) -> StorageResult<BlockCounters> {
    let mut v = [0i64; 18];
    for (slot, name) in v.iter_mut().zip(COUNTER_NAMES) {
        *slot = row
            .try_get(format!("{prefix}{name}").as_str())
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    }

    Ok(BlockCounters {
        extrinsics: v[0],
        extrinsics_success: v[1],
        extrinsics_error: v[2],
        extrinsics_signed: v[3],
        extrinsics_unsigned: v[4],
        extrinsics_signedby_address: v[5],
        extrinsics_signedby_index: v[6],
        events: v[7],
        events_system: v[8],
        events_module: v[9],
        events_extrinsic: v[10],
        events_finalization: v[11],
        accounts: v[12],
        accounts_new: v[13],
        accounts_reaped: v[14],
        sessions_new: v[15],
        contracts_new: v[16],
        logs: v[17],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: détecte les données corrompues (all zeros = hash invalide)
    #[test]
    fn test_strict_rejects_zero_hash() {
        let zeros = vec![0u8; 32];
        let result = bytes_to_hash32_strict(zeros, "block.hash");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("corruption"));
    }

    // Test critique: erreurs incluent le nom du champ pour debug
    #[test]
    fn test_error_includes_field_name() {
        let bad_bytes = vec![1u8; 16]; // mauvaise longueur
        let result = bytes_to_hash32(bad_bytes, "block.parent_hash");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("block.parent_hash"));
        assert!(err.contains("expected 32"));
    }

    // Test critique: NUMERIC(65,0) dépasse u64, jamais tronqué
    #[test]
    fn test_parse_numeric_keeps_u128_precision() {
        let big = (u128::from(u64::MAX) * 1000).to_string();
        assert_eq!(
            parse_numeric(Some(big.clone()), "trade.price").unwrap(),
            Some(u64::MAX as u128 * 1000)
        );
        assert_eq!(parse_numeric(None, "trade.price").unwrap(), None);

        let err = parse_numeric(Some("-1".into()), "trade.price").unwrap_err();
        assert!(err.to_string().contains("trade.price"));
    }

    #[test]
    fn test_counter_columns_and_placeholders_line_up() {
        let cols = counter_columns("count_");
        assert!(cols.starts_with("count_extrinsics, count_extrinsics_success"));
        assert!(cols.ends_with("count_logs"));
        assert_eq!(counter_placeholders(3).split(", ").count(), 18);
        assert!(counter_placeholders(3).starts_with("$3, $4"));
        assert!(counter_placeholders(3).ends_with("$20"));

        let c = BlockCounters {
            logs: 7,
            ..Default::default()
        };
        assert_eq!(counter_values(&c)[17], 7);
    }
}
