//! Event processors shared by the council and the technical committee.

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AuditRecord, Collective, codes};
use harvester_core::ports::{
    BlockAccumulation, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
};

use super::models::{MotionData, VoteData};
use super::{motion_kind, vote_kind};
use crate::utils::{attribute, parse_account, parse_bool, parse_hash_hex, parse_u32};

// =============================================================================
// Motions
// =============================================================================

/// `<module>.Proposed [AccountId, ProposalIndex, Hash, MemberCount]`.
pub struct MotionProposedProcessor {
    collective: Collective,
}

impl MotionProposedProcessor {
    pub fn new(collective: Collective) -> Self {
        Self { collective }
    }
}

#[async_trait]
impl EventProcessor for MotionProposedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new(self.collective.module_id(), "Proposed")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["AccountId", "ProposalIndex", "Hash", "MemberCount"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(proposed_by) = attribute(ctx, 0, "proposed_by", parse_account) else {
            return Ok(());
        };
        let Some(proposal_index) = attribute(ctx, 1, "proposal_index", parse_u32) else {
            return Ok(());
        };
        let Some(motion_hash) = attribute(ctx, 2, "motion_hash", parse_hash_hex) else {
            return Ok(());
        };
        let threshold = attribute(ctx, 3, "threshold", parse_u32);

        let audit = AuditRecord::new(
            motion_kind(self.collective),
            ctx.locator(),
            codes::MOTION_PROPOSED,
            motion_hash.clone(),
        )
        .with_data(&MotionData {
            proposal_index: Some(proposal_index),
            proposed_by: Some(proposed_by),
            threshold,
            proposal_hash: Some(motion_hash),
            proposal: ctx.call_param("proposal").cloned(),
            ..Default::default()
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(motion_kind(self.collective), block_id).await?;
        Ok(())
    }
}

/// `Approved [Hash]`, `Disapproved [Hash]` and `Executed [Hash, bool]`.
pub struct MotionOutcomeProcessor {
    collective: Collective,
    event: &'static str,
    shape: &'static [&'static str],
    type_id: i16,
}

impl MotionOutcomeProcessor {
    pub fn approved(collective: Collective) -> Self {
        Self {
            collective,
            event: "Approved",
            shape: &["Hash"],
            type_id: codes::MOTION_APPROVED,
        }
    }

    pub fn disapproved(collective: Collective) -> Self {
        Self {
            collective,
            event: "Disapproved",
            shape: &["Hash"],
            type_id: codes::MOTION_DISAPPROVED,
        }
    }

    pub fn executed(collective: Collective) -> Self {
        Self {
            collective,
            event: "Executed",
            shape: &["Hash", "bool"],
            type_id: codes::MOTION_EXECUTED,
        }
    }
}

#[async_trait]
impl EventProcessor for MotionOutcomeProcessor {
    fn key(&self) -> EventKey {
        EventKey::new(self.collective.module_id(), self.event)
    }

    fn shape(&self) -> &'static [&'static str] {
        self.shape
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(motion_hash) = attribute(ctx, 0, "motion_hash", parse_hash_hex) else {
            return Ok(());
        };

        let data = match self.type_id {
            codes::MOTION_APPROVED => MotionData {
                approved: Some(true),
                ..Default::default()
            },
            codes::MOTION_DISAPPROVED => MotionData {
                approved: Some(false),
                ..Default::default()
            },
            _ => MotionData {
                executed: attribute(ctx, 1, "executed", parse_bool),
                ..Default::default()
            },
        };

        let audit = AuditRecord::new(
            motion_kind(self.collective),
            ctx.locator(),
            self.type_id,
            motion_hash,
        )
        .with_data(&data)?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(motion_kind(self.collective), block_id).await?;
        Ok(())
    }
}

// =============================================================================
// Votes
// =============================================================================

/// `<module>.Voted [AccountId, Hash, bool, MemberCount, MemberCount]`.
pub struct VotedProcessor {
    collective: Collective,
}

impl VotedProcessor {
    pub fn new(collective: Collective) -> Self {
        Self { collective }
    }
}

#[async_trait]
impl EventProcessor for VotedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new(self.collective.module_id(), "Voted")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["AccountId", "Hash", "bool", "MemberCount", "MemberCount"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(account_id) = attribute(ctx, 0, "account_id", parse_account) else {
            return Ok(());
        };
        let Some(motion_hash) = attribute(ctx, 1, "motion_hash", parse_hash_hex) else {
            return Ok(());
        };
        let Some(vote) = attribute(ctx, 2, "vote", parse_bool) else {
            return Ok(());
        };
        let yes_votes_count = attribute(ctx, 3, "yes_votes_count", parse_u32).unwrap_or(0);
        let no_votes_count = attribute(ctx, 4, "no_votes_count", parse_u32).unwrap_or(0);

        let audit = AuditRecord::new(
            vote_kind(self.collective),
            ctx.locator(),
            codes::VOTE,
            motion_hash,
        )
        .with_data(&VoteData {
            account_id,
            vote,
            yes_votes_count,
            no_votes_count,
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(vote_kind(self.collective), block_id).await?;
        Ok(())
    }
}
