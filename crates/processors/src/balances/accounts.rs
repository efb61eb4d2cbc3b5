//! Account entity fold.

use std::collections::HashSet;

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{Account, AuditKind, codes};
use harvester_core::ports::{BlockAccumulation, BlockProcessor, FactTx, SequencingContext};

use super::models::NewAccountData;

/// Counts distinct new and reaped accounts during accumulation, then folds
/// account audits into `data_account` while sequencing.
pub struct AccountProcessor;

#[async_trait]
impl BlockProcessor for AccountProcessor {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn accumulation_hook(
        &self,
        acc: &mut BlockAccumulation,
        _tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let new = acc.accounts_new.iter().collect::<HashSet<_>>().len() as i64;
        let reaped = acc.accounts_reaped.iter().collect::<HashSet<_>>().len() as i64;

        let counters = &mut acc.block.counters;
        counters.accounts_new += new;
        counters.accounts_reaped += reaped;
        counters.accounts = counters.accounts_new - counters.accounts_reaped;
        Ok(())
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block_id = ctx.block.id;

        for audit in tx.audits(AuditKind::Account, block_id).await? {
            let account = match tx.account(&audit.subject).await? {
                Some(mut account) => {
                    if audit.type_id == codes::ACCOUNT_REAPED {
                        account.count_reaped += 1;
                        account.is_reaped = true;
                    } else if audit.type_id == codes::ACCOUNT_NEW {
                        account.is_reaped = false;
                    }
                    account.updated_at_block = block_id;
                    account
                }
                None => {
                    let created = audit.type_id == codes::ACCOUNT_NEW;
                    let balance = if created {
                        audit.data_as::<NewAccountData>()?.balance.unwrap_or(0)
                    } else {
                        0
                    };
                    // A reap without a known creation still yields a (reaped) account
                    Account {
                        address: ctx
                            .codec
                            .encode_account(&audit.subject)
                            .unwrap_or_else(|| audit.subject.clone()),
                        id: audit.subject.clone(),
                        is_reaped: !created,
                        count_reaped: u32::from(!created),
                        balance,
                        created_at_block: block_id,
                        updated_at_block: block_id,
                    }
                }
            };

            tx.upsert_account(&account).await?;
        }

        Ok(())
    }
}
