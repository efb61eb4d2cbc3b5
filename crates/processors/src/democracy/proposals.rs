//! Democracy proposal entity fold.

use async_trait::async_trait;
use tracing::debug;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AuditKind, DemocracyProposal, codes};
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

use super::models::ProposalData;

pub struct DemocracyProposalProcessor;

#[async_trait]
impl BlockProcessor for DemocracyProposalProcessor {
    fn name(&self) -> &'static str {
        "democracy_proposal"
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for audit in tx.audits(AuditKind::DemocracyProposal, block_id).await? {
            let status = match audit.type_id {
                codes::DEMOCRACY_PROPOSAL_PROPOSED => "Proposed",
                codes::DEMOCRACY_PROPOSAL_TABLED => "Tabled",
                other => {
                    debug!(block = block_id, type_id = other, "Unknown proposal audit type");
                    continue;
                }
            };
            let id = audit.subject_u32()?;

            let proposal = match tx.democracy_proposal(id).await? {
                Some(mut proposal) => {
                    proposal.status = status.to_string();
                    proposal.updated_at_block = block_id;
                    proposal
                }
                None => {
                    let data: ProposalData = audit.data_as()?;
                    DemocracyProposal {
                        id,
                        proposal: data.proposal,
                        bond: data.bond,
                        status: status.to_string(),
                        created_at_block: block_id,
                        updated_at_block: block_id,
                    }
                }
            };
            tx.upsert_democracy_proposal(&proposal).await?;
        }

        Ok(())
    }
}
