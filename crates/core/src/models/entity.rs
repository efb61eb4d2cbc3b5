//! Derived entities, mutated only while sequencing.

use serde::{Deserialize, Serialize};

// =============================================================================
// Accounts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Bare hex account id.
    pub id: String,
    /// SS58 address.
    pub address: String,
    pub is_reaped: bool,
    pub count_reaped: u32,
    #[serde(with = "super::u128_string")]
    pub balance: u128,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIndex {
    pub id: u32,
    pub account_id: Option<String>,
    pub short_address: Option<String>,
    pub is_reclaimable: bool,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

// =============================================================================
// Democracy
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemocracyProposal {
    pub id: u32,
    pub proposal: Option<serde_json::Value>,
    #[serde(with = "super::u128_string::option")]
    pub bond: Option<u128>,
    pub status: String,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemocracyReferendum {
    pub id: u32,
    pub proposal: Option<serde_json::Value>,
    pub vote_threshold: Option<String>,
    pub success: Option<bool>,
    pub status: String,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

// =============================================================================
// Collective Motions
// =============================================================================

/// The two collectives whose motions share one lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collective {
    Council,
    TechnicalCommittee,
}

impl Collective {
    /// Lowercase module id emitting this collective's events.
    pub fn module_id(&self) -> &'static str {
        match self {
            Self::Council => "council",
            Self::TechnicalCommittee => "technicalcommittee",
        }
    }

    pub fn motion_table(&self) -> &'static str {
        match self {
            Self::Council => "data_council_motion",
            Self::TechnicalCommittee => "data_techcomm_proposal",
        }
    }

    pub fn vote_table(&self) -> &'static str {
        match self {
            Self::Council => "data_council_vote",
            Self::TechnicalCommittee => "data_techcomm_proposal_vote",
        }
    }
}

/// Motion status lattice: `Proposed -> {Approved, Disapproved}`,
/// `Approved -> Executed`. Disapproved and Executed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionStatus {
    Proposed,
    Approved,
    Disapproved,
    Executed,
}

impl MotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "Proposed",
            Self::Approved => "Approved",
            Self::Disapproved => "Disapproved",
            Self::Executed => "Executed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Proposed" => Some(Self::Proposed),
            "Approved" => Some(Self::Approved),
            "Disapproved" => Some(Self::Disapproved),
            "Executed" => Some(Self::Executed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disapproved | Self::Executed)
    }

    pub fn can_transition_to(&self, next: MotionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Approved)
                | (Self::Proposed, Self::Disapproved)
                | (Self::Approved, Self::Executed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub collective: Collective,
    /// Proposal index within the collective.
    pub proposal_id: u32,
    /// Bare hex motion hash.
    pub motion_hash: String,
    /// Proposer, bare hex.
    pub account_id: String,
    pub proposal: Option<serde_json::Value>,
    pub member_threshold: u32,
    pub yes_votes_count: u32,
    pub no_votes_count: u32,
    pub status: MotionStatus,
    pub approved: Option<bool>,
    pub executed: Option<bool>,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionVote {
    pub collective: Collective,
    pub proposal_id: u32,
    /// Voter, bare hex.
    pub account_id: String,
    pub vote: bool,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

// =============================================================================
// Treasury
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreasuryStatus {
    Proposed,
    Awarded,
    Rejected,
}

impl TreasuryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "Proposed",
            Self::Awarded => "Awarded",
            Self::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Proposed" => Some(Self::Proposed),
            "Awarded" => Some(Self::Awarded),
            "Rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Proposed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryProposal {
    pub id: u32,
    pub proposed_by: Option<String>,
    pub beneficiary: Option<String>,
    #[serde(with = "super::u128_string::option")]
    pub value: Option<u128>,
    #[serde(with = "super::u128_string::option")]
    pub slash_value: Option<u128>,
    pub status: TreasuryStatus,
    pub created_at_block: u64,
    pub updated_at_block: u64,
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: u32,
    pub start_at_block: u64,
    pub created_at_block: u64,
    pub created_at_extrinsic: Option<u32>,
    pub created_at_event: u32,
    pub count_validators: u32,
    pub count_nominators: u32,
    pub era: Option<u32>,
}

/// Closing figures of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTotal {
    pub id: u32,
    pub end_at_block: u64,
    pub count_blocks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionValidator {
    pub session_id: u32,
    pub rank_validator: u32,
    pub validator_stash: Option<String>,
    pub validator_controller: Option<String>,
    pub validator_session: Option<String>,
    #[serde(with = "super::u128_string::option")]
    pub bonded_total: Option<u128>,
    #[serde(with = "super::u128_string::option")]
    pub bonded_active: Option<u128>,
    #[serde(with = "super::u128_string::option")]
    pub bonded_own: Option<u128>,
    #[serde(with = "super::u128_string::option")]
    pub bonded_nominators: Option<u128>,
    pub unlocking: Option<serde_json::Value>,
    pub count_nominators: u32,
    pub unstake_threshold: Option<u32>,
    #[serde(with = "super::u128_string::option")]
    pub commission: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNominator {
    pub session_id: u32,
    pub rank_validator: u32,
    pub rank_nominator: u32,
    pub nominator_stash: String,
    #[serde(with = "super::u128_string::option")]
    pub bonded: Option<u128>,
}

// =============================================================================
// Prefetched Chain State
// =============================================================================

/// Staking state of one validator, read before accumulation starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorSnapshot {
    pub stash: Option<String>,
    pub controller: Option<String>,
    pub session_key: Option<String>,
    pub bonded_active: Option<u128>,
    pub unlocking: Option<serde_json::Value>,
    pub commission: Option<u128>,
    pub unstake_threshold: Option<u32>,
    pub exposure_total: Option<u128>,
    pub exposure_own: Option<u128>,
    /// `(nominator stash, bonded)` in exposure order.
    pub nominators: Vec<(String, Option<u128>)>,
}

/// Validator set and era at a session rotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub era: Option<u32>,
    pub validators: Vec<ValidatorSnapshot>,
}

// =============================================================================
// Contracts & Logs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Bare hex code hash.
    pub code_hash: String,
    pub bytecode: Option<String>,
    pub created_at_block: u64,
    pub created_at_extrinsic: Option<u32>,
    pub created_at_event: u32,
}

/// A decoded header digest item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub block_id: u64,
    pub log_idx: u32,
    pub type_id: u8,
    #[serde(rename = "type")]
    pub type_name: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: aucune transition ne sort d'un état terminal
    #[test]
    fn test_motion_lattice() {
        use MotionStatus::*;

        assert!(Proposed.can_transition_to(Approved));
        assert!(Proposed.can_transition_to(Disapproved));
        assert!(Approved.can_transition_to(Executed));

        assert!(!Proposed.can_transition_to(Executed));
        assert!(!Approved.can_transition_to(Disapproved));
        for terminal in [Disapproved, Executed] {
            assert!(terminal.is_terminal());
            for next in [Proposed, Approved, Disapproved, Executed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_strings_roundtrip() {
        for s in ["Proposed", "Approved", "Disapproved", "Executed"] {
            assert_eq!(MotionStatus::parse(s).unwrap().as_str(), s);
        }
        assert_eq!(TreasuryStatus::parse("Awarded"), Some(TreasuryStatus::Awarded));
        assert_eq!(TreasuryStatus::parse("Unknown"), None);
    }
}
