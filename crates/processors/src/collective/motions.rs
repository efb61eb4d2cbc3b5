//! Motion entity fold.

use async_trait::async_trait;
use tracing::{debug, warn};

use harvester_core::error::HarvesterResult;
use harvester_core::models::{Collective, Motion, MotionStatus, codes};
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

use super::models::MotionData;
use super::motion_kind;

/// Folds motion audits of one collective, enforcing the status lattice.
pub struct MotionProcessor {
    collective: Collective,
}

impl MotionProcessor {
    pub fn new(collective: Collective) -> Self {
        Self { collective }
    }
}

#[async_trait]
impl BlockProcessor for MotionProcessor {
    fn name(&self) -> &'static str {
        match self.collective {
            Collective::Council => "council_motion",
            Collective::TechnicalCommittee => "technicalcommittee_motion",
        }
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for audit in tx.audits(motion_kind(self.collective), block_id).await? {
            let data: MotionData = audit.data_as()?;

            if audit.type_id == codes::MOTION_PROPOSED {
                let motion = Motion {
                    collective: self.collective,
                    proposal_id: data.proposal_index.unwrap_or_default(),
                    motion_hash: audit.subject.clone(),
                    account_id: data.proposed_by.unwrap_or_default(),
                    proposal: data.proposal,
                    member_threshold: data.threshold.unwrap_or_default(),
                    yes_votes_count: 0,
                    no_votes_count: 0,
                    status: MotionStatus::Proposed,
                    approved: None,
                    executed: None,
                    created_at_block: block_id,
                    updated_at_block: block_id,
                };
                tx.upsert_motion(&motion).await?;
                continue;
            }

            let next = match audit.type_id {
                codes::MOTION_APPROVED => MotionStatus::Approved,
                codes::MOTION_DISAPPROVED => MotionStatus::Disapproved,
                codes::MOTION_EXECUTED => MotionStatus::Executed,
                other => {
                    debug!(block = block_id, type_id = other, "Unknown motion audit type");
                    continue;
                }
            };

            let Some(mut motion) = tx.open_motion(self.collective, &audit.subject).await? else {
                debug!(
                    block = block_id,
                    collective = self.collective.module_id(),
                    motion = %audit.subject,
                    "No open motion for audit, skipping"
                );
                continue;
            };

            if !motion.status.can_transition_to(next) {
                warn!(
                    block = block_id,
                    collective = self.collective.module_id(),
                    motion = %audit.subject,
                    from = motion.status.as_str(),
                    to = next.as_str(),
                    "⚠️  Invalid motion transition, skipping"
                );
                continue;
            }

            motion.status = next;
            if data.approved.is_some() {
                motion.approved = data.approved;
            }
            if data.executed.is_some() {
                motion.executed = data.executed;
            }
            motion.updated_at_block = block_id;
            tx.upsert_motion(&motion).await?;
        }

        Ok(())
    }
}
