//! Append-only audit facts produced during accumulation.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{DomainError, DomainResult};

/// Numeric audit type codes, persisted in `type_id`.
pub mod codes {
    pub const ACCOUNT_NEW: i16 = 1;
    pub const ACCOUNT_REAPED: i16 = 2;

    pub const ACCOUNT_INDEX_NEW: i16 = 1;
    pub const ACCOUNT_INDEX_REAPED: i16 = 2;

    pub const DEMOCRACY_PROPOSAL_PROPOSED: i16 = 1;
    pub const DEMOCRACY_PROPOSAL_TABLED: i16 = 2;

    pub const REFERENDUM_STARTED: i16 = 1;
    pub const REFERENDUM_PASSED: i16 = 2;
    pub const REFERENDUM_NOTPASSED: i16 = 3;
    pub const REFERENDUM_CANCELLED: i16 = 4;
    pub const REFERENDUM_EXECUTED: i16 = 5;

    pub const MOTION_PROPOSED: i16 = 1;
    pub const MOTION_APPROVED: i16 = 2;
    pub const MOTION_DISAPPROVED: i16 = 3;
    pub const MOTION_EXECUTED: i16 = 4;

    /// Vote audits carry no kind of their own.
    pub const VOTE: i16 = 0;

    pub const TREASURY_PROPOSED: i16 = 1;
    pub const TREASURY_AWARDED: i16 = 2;
    pub const TREASURY_REJECTED: i16 = 3;
}

/// Which audit table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Account,
    AccountIndex,
    DemocracyProposal,
    DemocracyReferendum,
    CouncilMotion,
    CouncilVote,
    TechCommMotion,
    TechCommVote,
    TreasuryProposal,
}

impl AuditKind {
    pub const ALL: [AuditKind; 9] = [
        Self::Account,
        Self::AccountIndex,
        Self::DemocracyProposal,
        Self::DemocracyReferendum,
        Self::CouncilMotion,
        Self::CouncilVote,
        Self::TechCommMotion,
        Self::TechCommVote,
        Self::TreasuryProposal,
    ];

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Account => "data_account_audit",
            Self::AccountIndex => "data_account_index_audit",
            Self::DemocracyProposal => "data_democracy_proposal_audit",
            Self::DemocracyReferendum => "data_democracy_referendum_audit",
            Self::CouncilMotion => "data_council_motion_audit",
            Self::CouncilVote => "data_council_vote_audit",
            Self::TechCommMotion => "data_techcomm_proposal_audit",
            Self::TechCommVote => "data_techcomm_vote_audit",
            Self::TreasuryProposal => "data_treasury_proposal_audit",
        }
    }
}

/// Position of the event an audit was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuditLocator {
    pub block_id: u64,
    pub event_idx: u32,
    pub extrinsic_idx: Option<u32>,
}

/// One audit row.
///
/// `subject` is the key of the entity the audit folds into: an account id,
/// an index, a proposal or referendum number, or a motion hash. Everything
/// else travels in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub kind: AuditKind,
    pub locator: AuditLocator,
    pub type_id: i16,
    pub subject: String,
    pub data: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        kind: AuditKind,
        locator: AuditLocator,
        type_id: i16,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            locator,
            type_id,
            subject: subject.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Attach a typed payload.
    pub fn with_data<T: Serialize>(mut self, data: &T) -> DomainResult<Self> {
        self.data = serde_json::to_value(data).map_err(|e| {
            DomainError::DecodingError(format!(
                "Failed to serialize {:?} audit payload: {}",
                self.kind, e
            ))
        })?;
        Ok(self)
    }

    /// Read the payload back as `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            DomainError::DecodingError(format!(
                "Malformed {:?} audit payload at block {} event {}: {}",
                self.kind, self.locator.block_id, self.locator.event_idx, e
            ))
        })
    }

    /// Subject parsed as a numeric id.
    pub fn subject_u32(&self) -> DomainResult<u32> {
        self.subject.parse().map_err(|_| {
            DomainError::ValidationError(format!(
                "{:?} audit subject is not numeric: {}",
                self.kind, self.subject
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        bond: u32,
    }

    #[test]
    fn test_audit_payload_and_subject() {
        let locator = AuditLocator {
            block_id: 7,
            event_idx: 2,
            extrinsic_idx: Some(1),
        };
        let audit = AuditRecord::new(
            AuditKind::DemocracyProposal,
            locator,
            codes::DEMOCRACY_PROPOSAL_PROPOSED,
            "12",
        )
        .with_data(&Payload { bond: 5 })
        .unwrap();

        assert_eq!(audit.data_as::<Payload>().unwrap(), Payload { bond: 5 });
        assert_eq!(audit.subject_u32().unwrap(), 12);
    }

    #[test]
    fn test_audit_tables_are_distinct() {
        let mut tables: Vec<_> = AuditKind::ALL.iter().map(|k| k.table()).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), AuditKind::ALL.len());
    }
}
