//! Session closing figures.

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::SessionTotal;
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

/// When a block opens session `n`, writes the totals of session `n - 1`.
pub struct SessionProcessor;

#[async_trait]
impl BlockProcessor for SessionProcessor {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for session in tx.sessions_created_at(block_id).await? {
            let Some(previous_id) = session.id.checked_sub(1) else {
                continue;
            };

            let count_blocks = match tx.session(previous_id).await? {
                Some(previous) => (block_id + 1).saturating_sub(previous.start_at_block),
                // The first observed session started at genesis
                None => block_id,
            };

            tx.upsert_session_total(&SessionTotal {
                id: previous_id,
                end_at_block: block_id,
                count_blocks,
            })
            .await?;
        }

        Ok(())
    }
}
