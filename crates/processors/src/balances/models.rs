//! Audit payloads for the Balances module.

use serde::{Deserialize, Serialize};

/// Payload of an account NEW audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountData {
    /// Endowment carried by the event.
    #[serde(default, with = "harvester_core::models::u128_string::option")]
    pub balance: Option<u128>,
}
