//! Domain models representing harvested blockchain data.
//!
//! These models are storage-agnostic and represent the canonical
//! form of harvested data within the domain layer.

mod audit;
mod block;
mod chain;
mod entity;
mod market;

pub use audit::*;
pub use block::*;
pub use chain::*;
pub use entity::*;
pub use market::*;

use serde::{Deserialize, Serialize};

// =============================================================================
// 32-byte Hash Types
// =============================================================================

/// Macro to generate 32-byte hash newtypes with common functionality.
///
/// Generates:
/// - `from_hex()` - Parse from hex string (with or without 0x prefix)
/// - `to_hex()` - Convert to 0x-prefixed hex string
/// - `to_plain_hex()` - Convert to bare hex, the form stored in fact tables
/// - `Display` trait implementation
/// - `From<[u8; 32]>` implementation
macro_rules! hash32_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Parse from hex string (with or without 0x prefix).
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }

            /// Convert to 0x-prefixed hex string.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Convert to hex without the 0x prefix.
            pub fn to_plain_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Get the inner bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

hash32_newtype!(
    /// 32-byte block hash (Blake2-256).
    BlockHash
);

hash32_newtype!(
    /// 32-byte account identifier (SS58 decoded public key).
    AccountId
);

/// Strip an optional `0x` prefix from a hex-ish identifier.
///
/// Fact tables store account ids, motion hashes and beneficiaries bare.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Serde helpers for `u128` amounts carried as decimal strings in JSON
/// payloads, so values above 2^53 survive JavaScript consumers and JSONB.
pub mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        super::parse_u128_value(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid u128 amount: {raw}")))
    }

    /// Same encoding for optional amounts.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<u128>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.serialize_some(&v.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<u128>, D::Error> {
            let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
            match raw {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(v) => super::super::parse_u128_value(&v)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid u128 amount: {v}"))),
            }
        }
    }
}

/// Read a `u128` from a JSON number or decimal/hex string.
pub fn parse_u128_value(value: &serde_json::Value) -> Option<u128> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .or_else(|| n.to_string().parse().ok()),
        serde_json::Value::String(s) => {
            if let Some(hex_str) = s.strip_prefix("0x") {
                u128::from_str_radix(hex_str, 16).ok()
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_forms() {
        let hash = BlockHash([0xab; 32]);
        assert!(hash.to_hex().starts_with("0xabab"));
        assert!(!hash.to_plain_hex().starts_with("0x"));
        assert_eq!(BlockHash::from_hex(&hash.to_plain_hex()).unwrap(), hash);
    }

    #[test]
    fn test_parse_u128_value_forms() {
        assert_eq!(parse_u128_value(&serde_json::json!(42)), Some(42));
        assert_eq!(
            parse_u128_value(&serde_json::json!("340282366920938463463374607431768211455")),
            Some(u128::MAX)
        );
        assert_eq!(parse_u128_value(&serde_json::json!("0x10")), Some(16));
        assert_eq!(parse_u128_value(&serde_json::json!(-1)), None);
        assert_eq!(parse_u128_value(&serde_json::json!(true)), None);
    }
}
