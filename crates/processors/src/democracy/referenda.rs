//! Referendum entity fold.

use async_trait::async_trait;
use tracing::debug;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AuditKind, DemocracyReferendum, codes};
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

use super::models::ReferendumData;

/// Folds referendum audits. `success` is only ever set by `Executed`.
pub struct DemocracyReferendumProcessor;

fn status_for(type_id: i16) -> Option<&'static str> {
    match type_id {
        codes::REFERENDUM_STARTED => Some("Started"),
        codes::REFERENDUM_PASSED => Some("Passed"),
        codes::REFERENDUM_NOTPASSED => Some("NotPassed"),
        codes::REFERENDUM_CANCELLED => Some("Cancelled"),
        codes::REFERENDUM_EXECUTED => Some("Executed"),
        _ => None,
    }
}

#[async_trait]
impl BlockProcessor for DemocracyReferendumProcessor {
    fn name(&self) -> &'static str {
        "democracy_referendum"
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for audit in tx.audits(AuditKind::DemocracyReferendum, block_id).await? {
            let Some(status) = status_for(audit.type_id) else {
                debug!(block = block_id, type_id = audit.type_id, "Unknown referendum audit type");
                continue;
            };
            let id = audit.subject_u32()?;
            let data: ReferendumData = audit.data_as()?;

            let referendum = match tx.referendum(id).await? {
                Some(mut referendum) => {
                    referendum.status = status.to_string();
                    referendum.success = data.success;
                    if data.proposal.is_some() {
                        referendum.proposal = data.proposal;
                    }
                    if data.vote_threshold.is_some() {
                        referendum.vote_threshold = data.vote_threshold;
                    }
                    referendum.updated_at_block = block_id;
                    referendum
                }
                None => DemocracyReferendum {
                    id,
                    proposal: data.proposal,
                    vote_threshold: data.vote_threshold,
                    success: data.success,
                    status: status.to_string(),
                    created_at_block: block_id,
                    updated_at_block: block_id,
                },
            };
            tx.upsert_referendum(&referendum).await?;
        }

        Ok(())
    }
}
