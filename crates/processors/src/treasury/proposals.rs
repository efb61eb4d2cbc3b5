//! Treasury proposal entity fold.

use async_trait::async_trait;
use tracing::debug;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AuditKind, TreasuryProposal, TreasuryStatus, codes};
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

use super::models::TreasuryData;

/// Creates proposals on `Proposed` and closes open ones on `Awarded` or
/// `Rejected`. Closed proposals are never reopened.
pub struct TreasuryProposalProcessor;

#[async_trait]
impl BlockProcessor for TreasuryProposalProcessor {
    fn name(&self) -> &'static str {
        "treasury_proposal"
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for audit in tx.audits(AuditKind::TreasuryProposal, block_id).await? {
            let id = audit.subject_u32()?;
            let data: TreasuryData = audit.data_as()?;

            if audit.type_id == codes::TREASURY_PROPOSED {
                let proposal = TreasuryProposal {
                    id,
                    proposed_by: data.proposed_by,
                    beneficiary: data.beneficiary,
                    value: data.value,
                    slash_value: None,
                    status: TreasuryStatus::Proposed,
                    created_at_block: block_id,
                    updated_at_block: block_id,
                };
                tx.upsert_treasury_proposal(&proposal).await?;
                continue;
            }

            let Some(mut proposal) = tx.open_treasury_proposal(id).await? else {
                debug!(block = block_id, proposal = id, "No open treasury proposal, skipping");
                continue;
            };

            match audit.type_id {
                codes::TREASURY_AWARDED => {
                    proposal.status = TreasuryStatus::Awarded;
                }
                codes::TREASURY_REJECTED => {
                    proposal.status = TreasuryStatus::Rejected;
                    proposal.slash_value = data.slash_value;
                }
                other => {
                    debug!(block = block_id, type_id = other, "Unknown treasury audit type");
                    continue;
                }
            }
            proposal.updated_at_block = block_id;
            tx.upsert_treasury_proposal(&proposal).await?;
        }

        Ok(())
    }
}
