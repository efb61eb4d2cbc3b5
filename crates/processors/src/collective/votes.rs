//! Motion vote fold.

use async_trait::async_trait;
use tracing::debug;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{Collective, MotionVote};
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

use super::models::VoteData;
use super::vote_kind;

/// Records each member's latest vote and the motion's running tally.
pub struct MotionVoteProcessor {
    collective: Collective,
}

impl MotionVoteProcessor {
    pub fn new(collective: Collective) -> Self {
        Self { collective }
    }
}

#[async_trait]
impl BlockProcessor for MotionVoteProcessor {
    fn name(&self) -> &'static str {
        match self.collective {
            Collective::Council => "council_vote",
            Collective::TechnicalCommittee => "technicalcommittee_vote",
        }
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for audit in tx.audits(vote_kind(self.collective), block_id).await? {
            let data: VoteData = audit.data_as()?;

            let Some(mut motion) = tx.open_motion(self.collective, &audit.subject).await? else {
                debug!(
                    block = block_id,
                    collective = self.collective.module_id(),
                    motion = %audit.subject,
                    "Vote on unknown motion, skipping"
                );
                continue;
            };

            let vote = match tx
                .motion_vote(self.collective, motion.proposal_id, &data.account_id)
                .await?
            {
                Some(mut existing) => {
                    existing.vote = data.vote;
                    existing.updated_at_block = block_id;
                    existing
                }
                None => MotionVote {
                    collective: self.collective,
                    proposal_id: motion.proposal_id,
                    account_id: data.account_id,
                    vote: data.vote,
                    created_at_block: block_id,
                    updated_at_block: block_id,
                },
            };
            tx.upsert_motion_vote(&vote).await?;

            motion.yes_votes_count = data.yes_votes_count;
            motion.no_votes_count = data.no_votes_count;
            motion.updated_at_block = block_id;
            tx.upsert_motion(&motion).await?;
        }

        Ok(())
    }
}
