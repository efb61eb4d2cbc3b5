//! Account index entity fold.

use async_trait::async_trait;
use tracing::debug;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AccountIndex, AuditKind, codes};
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

use super::models::AccountIndexData;

/// Assigns indices on NEW audits and releases every index of a reaped
/// account on REAPED audits.
pub struct AccountIndexProcessor;

#[async_trait]
impl BlockProcessor for AccountIndexProcessor {
    fn name(&self) -> &'static str {
        "account_index"
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for audit in tx.audits(AuditKind::AccountIndex, block_id).await? {
            match audit.type_id {
                codes::ACCOUNT_INDEX_NEW => {
                    let data: AccountIndexData = audit.data_as()?;
                    let Some(id) = data.account_index_id else {
                        debug!(block = block_id, "Index audit without index, skipping");
                        continue;
                    };

                    let mut index = tx.account_index(id).await?.unwrap_or(AccountIndex {
                        id,
                        account_id: None,
                        short_address: None,
                        is_reclaimable: false,
                        created_at_block: block_id,
                        updated_at_block: block_id,
                    });
                    index.account_id = Some(audit.subject.clone());
                    index.short_address = Some(ctx.codec.encode_index(id));
                    index.is_reclaimable = false;
                    index.updated_at_block = block_id;
                    tx.upsert_account_index(&index).await?;
                }
                codes::ACCOUNT_INDEX_REAPED => {
                    for mut index in tx.account_indices_for(&audit.subject).await? {
                        index.account_id = None;
                        index.is_reclaimable = true;
                        index.updated_at_block = block_id;
                        tx.upsert_account_index(&index).await?;
                    }
                }
                other => debug!(block = block_id, type_id = other, "Unknown index audit type"),
            }
        }

        Ok(())
    }
}
