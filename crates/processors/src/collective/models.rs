//! Audit payloads for collective motions.

use serde::{Deserialize, Serialize};

/// Payload of a motion audit. The subject is the bare hex motion hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed: Option<bool>,
}

/// Payload of a vote audit. The subject is the bare hex motion hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteData {
    pub account_id: String,
    pub vote: bool,
    pub yes_votes_count: u32,
    pub no_votes_count: u32,
}
