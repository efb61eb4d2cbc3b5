//! SCALE value to JSON conversion and small decoding helpers.

use subxt::ext::scale_value::{Composite, Primitive, Value, ValueDef};

use harvester_core::models::{Signer, SignerKind};

// =============================================================================
// Type names
// =============================================================================

/// Normalise a metadata type name to the short form processors match on.
///
/// `T::AccountId` becomes `AccountId`, `BalanceOf<T>` becomes `Balance`,
/// `Vec<T::AccountId>` becomes `Vec<AccountId>`.
pub fn normalize_type_name(raw: &str) -> String {
    let mut name = raw.replace("T::", "").replace("<T as frame_system::Config>::", "");
    for generic in ["<T, I>", "<T>", "<I>"] {
        name = name.replace(generic, "");
    }
    match name.trim() {
        "BalanceOf" => "Balance".to_string(),
        other => other.to_string(),
    }
}

fn is_bytes_type(type_name: &str) -> bool {
    matches!(type_name, "Vec<u8>" | "Bytes") || type_name.starts_with("BoundedVec<u8")
}

// =============================================================================
// Values
// =============================================================================

/// Convert one named or positional field, rendering byte vectors as hex.
pub fn field_to_json<T>(type_name: &str, value: &Value<T>) -> serde_json::Value {
    if is_bytes_type(type_name)
        && let ValueDef::Composite(Composite::Unnamed(values)) = &value.value
        && let Some(bytes) = as_bytes(values)
    {
        return serde_json::Value::String(format!("0x{}", hex::encode(bytes)));
    }
    value_to_json(value)
}

/// Fields of a composite in declaration order.
pub fn composite_fields<T>(composite: &Composite<T>) -> Vec<(Option<String>, &Value<T>)> {
    match composite {
        Composite::Named(fields) => fields.iter().map(|(n, v)| (Some(n.clone()), v)).collect(),
        Composite::Unnamed(values) => values.iter().map(|v| (None, v)).collect(),
    }
}

/// Convert a Composite to a JSON value.
pub fn composite_to_json<T>(composite: &Composite<T>) -> serde_json::Value {
    match composite {
        Composite::Unnamed(values) => {
            // Fixed-size byte arrays: account ids, hashes, signatures
            if let Some(hex_str) = try_as_byte_array(values) {
                return serde_json::Value::String(hex_str);
            }
            // Newtype wrappers unwrap to their inner value
            if values.len() == 1 {
                return value_to_json(&values[0]);
            }
            serde_json::Value::Array(values.iter().map(value_to_json).collect())
        }
        Composite::Named(fields) => {
            let obj: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|(name, v)| (name.clone(), value_to_json(v)))
                .collect();
            serde_json::Value::Object(obj)
        }
    }
}

fn as_bytes<T>(values: &[Value<T>]) -> Option<Vec<u8>> {
    values
        .iter()
        .map(|value| match &value.value {
            ValueDef::Primitive(Primitive::U128(n)) => u8::try_from(*n).ok(),
            _ => None,
        })
        .collect()
}

/// Interpret an unnamed composite of 20, 32 or 64 bytes as a hex string.
fn try_as_byte_array<T>(values: &[Value<T>]) -> Option<String> {
    if !matches!(values.len(), 20 | 32 | 64) {
        return None;
    }
    as_bytes(values).map(|bytes| format!("0x{}", hex::encode(bytes)))
}

/// Convert a Value to a JSON value.
pub fn value_to_json<T>(value: &Value<T>) -> serde_json::Value {
    match &value.value {
        ValueDef::Composite(composite) => composite_to_json(composite),
        ValueDef::Variant(variant) => {
            let inner = composite_to_json(&variant.values);
            match variant.name.as_str() {
                "None" => serde_json::Value::Null,
                // Option and MultiAddress wrappers collapse to their payload
                "Some" | "Id" => inner,
                _ if variant.values.is_empty() => serde_json::Value::String(variant.name.clone()),
                _ => {
                    let mut map = serde_json::Map::new();
                    map.insert(variant.name.clone(), inner);
                    serde_json::Value::Object(map)
                }
            }
        }
        ValueDef::Primitive(primitive) => primitive_to_json(primitive),
        ValueDef::BitSequence(bits) => serde_json::Value::String(format!("{bits:?}")),
    }
}

/// Integers are rendered as decimal strings so u128 amounts survive JSON.
fn primitive_to_json(primitive: &Primitive) -> serde_json::Value {
    match primitive {
        Primitive::Bool(b) => serde_json::Value::Bool(*b),
        Primitive::Char(c) => serde_json::Value::String(c.to_string()),
        Primitive::String(s) => serde_json::Value::String(s.clone()),
        Primitive::U128(n) => serde_json::Value::String(n.to_string()),
        Primitive::I128(n) => serde_json::Value::String(n.to_string()),
        Primitive::U256(n) => serde_json::Value::String(format!("{n:?}")),
        Primitive::I256(n) => serde_json::Value::String(format!("{n:?}")),
    }
}

// =============================================================================
// Signers & timestamps
// =============================================================================

/// Decode a SCALE `MultiAddress` (or a bare 32-byte account id).
pub fn decode_signer(bytes: &[u8]) -> Option<Signer> {
    match bytes {
        [raw @ ..] if raw.len() == 32 => Some(Signer {
            address: hex::encode(raw),
            kind: SignerKind::Id,
        }),
        [0, raw @ ..] if raw.len() == 32 => Some(Signer {
            address: hex::encode(raw),
            kind: SignerKind::Id,
        }),
        [1, rest @ ..] => try_decode_compact_u64(rest).map(|index| Signer {
            address: index.to_string(),
            kind: SignerKind::Index,
        }),
        // Pre-MultiAddress runtimes prefix full ids with 0xff
        [0xff, raw @ ..] if raw.len() == 32 => Some(Signer {
            address: hex::encode(raw),
            kind: SignerKind::Id,
        }),
        _ => None,
    }
}

/// Try to decode a Compact<u64> from bytes.
pub fn try_decode_compact_u64(bytes: &[u8]) -> Option<u64> {
    let first = *bytes.first()?;

    match first & 0b11 {
        0b00 => Some((first >> 2) as u64),
        0b01 => {
            let b = bytes.get(..2)?;
            Some((u16::from_le_bytes([b[0], b[1]]) >> 2) as u64)
        }
        0b10 => {
            let b = bytes.get(..4)?;
            Some((u32::from_le_bytes([b[0], b[1], b[2], b[3]]) >> 2) as u64)
        }
        _ => {
            let num_bytes = ((first >> 2) + 4) as usize;
            if num_bytes > 8 {
                return None;
            }
            let raw = bytes.get(1..1 + num_bytes)?;
            let mut value_bytes = [0u8; 8];
            value_bytes[..num_bytes].copy_from_slice(raw);
            Some(u64::from_le_bytes(value_bytes))
        }
    }
}

/// Find a plausible millisecond timestamp in a debug rendering of the
/// `Timestamp.set` arguments.
pub fn parse_timestamp_from_debug(s: &str) -> Option<u64> {
    const MIN_TIMESTAMP_MS: u64 = 1_577_836_800_000;
    const MAX_TIMESTAMP_MS: u64 = 2_524_608_000_000;

    s.split(|c: char| !c.is_ascii_digit())
        .filter_map(|part| part.parse::<u64>().ok())
        .find(|num| (MIN_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(num))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type_name() {
        assert_eq!(normalize_type_name("T::AccountId"), "AccountId");
        assert_eq!(normalize_type_name("BalanceOf<T>"), "Balance");
        assert_eq!(normalize_type_name("BalanceOf<T, I>"), "Balance");
        assert_eq!(normalize_type_name("Vec<T::AccountId>"), "Vec<AccountId>");
        assert_eq!(normalize_type_name("MemberCount"), "MemberCount");
        assert_eq!(normalize_type_name("bool"), "bool");
    }

    #[test]
    fn test_decode_signer_forms() {
        let mut id = vec![0u8];
        id.extend_from_slice(&[7; 32]);
        let signer = decode_signer(&id).unwrap();
        assert_eq!(signer.kind, SignerKind::Id);
        assert_eq!(signer.address, "07".repeat(32));

        let signer = decode_signer(&[1, 4 << 2]).unwrap();
        assert_eq!(signer.kind, SignerKind::Index);
        assert_eq!(signer.address, "4");

        assert!(decode_signer(&[2, 1, 2]).is_none());
    }

    #[test]
    fn test_try_decode_compact_u64_modes() {
        assert_eq!(try_decode_compact_u64(&[252]), Some(63));
        assert_eq!(try_decode_compact_u64(&[0xFD, 0xFF]), Some(16383));
        let encoded = (1_000_000_000u32 << 2 | 0b10).to_le_bytes();
        assert_eq!(try_decode_compact_u64(&encoded), Some(1_000_000_000));
        assert_eq!(try_decode_compact_u64(&[]), None);
    }

    #[test]
    fn test_try_decode_compact_u64_big_integer() {
        let timestamp: u64 = 1_733_097_600_000;
        let mut bytes = vec![0b00001011];
        bytes.extend_from_slice(&timestamp.to_le_bytes()[..6]);
        assert_eq!(try_decode_compact_u64(&bytes), Some(timestamp));
    }

    #[test]
    fn test_parse_timestamp_from_debug() {
        assert_eq!(
            parse_timestamp_from_debug("Compact(1733097600000)"),
            Some(1733097600000)
        );
        assert_eq!(
            parse_timestamp_from_debug("{now: 1700000000000}"),
            Some(1700000000000)
        );
        assert_eq!(parse_timestamp_from_debug("Compact(1500000000000)"), None);
        assert_eq!(parse_timestamp_from_debug("no timestamp here"), None);
    }

    #[test]
    fn test_value_to_json_shapes() {
        let account = Value::unnamed_composite((0..32).map(|_| Value::u128(1)));
        assert_eq!(value_to_json(&account), serde_json::json!("0x".to_string() + &"01".repeat(32)));

        let some = Value::variant("Some", Composite::unnamed([Value::u128(5)]));
        assert_eq!(value_to_json(&some), serde_json::json!("5"));

        let side = Value::variant("Buy", Composite::Unnamed(vec![]));
        assert_eq!(value_to_json(&side), serde_json::json!("Buy"));

        let code = Value::unnamed_composite([Value::u128(0), Value::u128(97)]);
        assert_eq!(field_to_json("Vec<u8>", &code), serde_json::json!("0x0061"));
    }
}
