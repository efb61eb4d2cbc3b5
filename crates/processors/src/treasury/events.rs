//! Event processors for the Treasury module.

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AuditKind, AuditRecord, codes, strip_hex_prefix};
use harvester_core::ports::{
    BlockAccumulation, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
};

use super::models::TreasuryData;
use crate::utils::{attribute, parse_account, parse_amount, parse_identifier, parse_u32};

/// Beneficiaries arrive as account ids or, in older runtimes, as
/// addresses we keep verbatim.
fn parse_beneficiary(value: &serde_json::Value) -> Option<String> {
    parse_account(value).or_else(|| parse_identifier(value))
}

/// `treasury.Proposed [ProposalIndex]`.
///
/// The event only carries the index; proposer, beneficiary and value come
/// from the `propose_spend` extrinsic.
pub struct TreasuryProposedProcessor;

#[async_trait]
impl EventProcessor for TreasuryProposedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("treasury", "Proposed")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["ProposalIndex"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(index) = attribute(ctx, 0, "proposal_index", parse_u32) else {
            return Ok(());
        };

        let data = TreasuryData {
            proposed_by: ctx
                .extrinsic
                .and_then(|x| x.address())
                .map(|a| strip_hex_prefix(a).to_string()),
            beneficiary: ctx.call_param("beneficiary").and_then(parse_beneficiary),
            value: ctx.call_param("value").and_then(parse_amount),
            slash_value: None,
        };

        let audit = AuditRecord::new(
            AuditKind::TreasuryProposal,
            ctx.locator(),
            codes::TREASURY_PROPOSED,
            index.to_string(),
        )
        .with_data(&data)?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::TreasuryProposal, block_id).await?;
        Ok(())
    }
}

/// `treasury.Awarded [ProposalIndex, Balance, AccountId]`.
pub struct AwardedProcessor;

#[async_trait]
impl EventProcessor for AwardedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("treasury", "Awarded")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["ProposalIndex", "Balance", "AccountId"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(index) = attribute(ctx, 0, "proposal_index", parse_u32) else {
            return Ok(());
        };

        let audit = AuditRecord::new(
            AuditKind::TreasuryProposal,
            ctx.locator(),
            codes::TREASURY_AWARDED,
            index.to_string(),
        )
        .with_data(&TreasuryData {
            value: attribute(ctx, 1, "value", parse_amount),
            beneficiary: attribute(ctx, 2, "beneficiary", parse_account),
            ..Default::default()
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::TreasuryProposal, block_id).await?;
        Ok(())
    }
}

/// `treasury.Rejected [ProposalIndex, Balance]`.
pub struct RejectedProcessor;

#[async_trait]
impl EventProcessor for RejectedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("treasury", "Rejected")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["ProposalIndex", "Balance"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(index) = attribute(ctx, 0, "proposal_index", parse_u32) else {
            return Ok(());
        };

        let audit = AuditRecord::new(
            AuditKind::TreasuryProposal,
            ctx.locator(),
            codes::TREASURY_REJECTED,
            index.to_string(),
        )
        .with_data(&TreasuryData {
            slash_value: attribute(ctx, 1, "slash_value", parse_amount),
            ..Default::default()
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::TreasuryProposal, block_id).await?;
        Ok(())
    }
}
