//! Audit payloads for the Indices module.

use serde::{Deserialize, Serialize};

/// Payload of an account index audit. The audit subject is the account id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIndexData {
    /// `None` on REAPED audits: every index of the account is released.
    pub account_index_id: Option<u32>,
}
