//! Audit payloads for the Treasury module.

use serde::{Deserialize, Serialize};

/// Payload of a treasury audit. The subject is the proposal index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "harvester_core::models::u128_string::option"
    )]
    pub value: Option<u128>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "harvester_core::models::u128_string::option"
    )]
    pub slash_value: Option<u128>,
}
