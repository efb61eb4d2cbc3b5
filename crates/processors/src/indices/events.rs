//! Event processors for the Indices module.

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AuditKind, AuditRecord, codes};
use harvester_core::ports::{
    BlockAccumulation, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
};

use super::models::AccountIndexData;
use crate::utils::{attribute, parse_account, parse_u32};

/// `indices.NewAccountIndex [AccountId, AccountIndex]`.
pub struct NewAccountIndexProcessor;

#[async_trait]
impl EventProcessor for NewAccountIndexProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("indices", "NewAccountIndex")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["AccountId", "AccountIndex"]
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
        let Some(index) = attribute(ctx, 1, "account_index", parse_u32) else {
            return Ok(());
        };

        let audit = AuditRecord::new(
            AuditKind::AccountIndex,
            ctx.locator(),
            codes::ACCOUNT_INDEX_NEW,
            account_id,
        )
        .with_data(&AccountIndexData {
            account_index_id: Some(index),
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::AccountIndex, block_id).await?;
        Ok(())
    }
}
