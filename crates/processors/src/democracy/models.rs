//! Audit payloads for the Democracy module.

use serde::{Deserialize, Serialize};

/// Payload of a `Proposed` or `Tabled` audit. The subject is the
/// proposal index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalData {
    #[serde(default, with = "harvester_core::models::u128_string::option")]
    pub bond: Option<u128>,
    /// Call of the `propose` extrinsic; absent on `Tabled`.
    #[serde(default)]
    pub proposal: Option<serde_json::Value>,
}

/// Payload of a referendum audit. The subject is the referendum index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferendumData {
    #[serde(default)]
    pub vote_threshold: Option<String>,
    /// Referendum info merged with its preimage, on `Started` only.
    #[serde(default)]
    pub proposal: Option<serde_json::Value>,
    /// Dispatch result, on `Executed` only.
    #[serde(default)]
    pub success: Option<bool>,
}
