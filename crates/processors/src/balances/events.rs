//! Event processors for the Balances module.

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::{AuditKind, AuditRecord, codes};
use harvester_core::ports::{
    BlockAccumulation, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
};

use super::models::NewAccountData;
use crate::indices::AccountIndexData;
use crate::utils::{attribute, parse_account, parse_amount};

// =============================================================================
// NewAccount
// =============================================================================

/// `balances.NewAccount [AccountId, Balance]`.
pub struct NewAccountProcessor;

#[async_trait]
impl EventProcessor for NewAccountProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("balances", "NewAccount")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["AccountId", "Balance"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(account_id) = attribute(ctx, 0, "account_id", parse_account) else {
            return Ok(());
        };
        let data = NewAccountData {
            balance: ctx.event.attr(1).and_then(parse_amount),
        };

        acc.accounts_new.push(account_id.clone());

        let audit = AuditRecord::new(
            AuditKind::Account,
            ctx.locator(),
            codes::ACCOUNT_NEW,
            account_id,
        )
        .with_data(&data)?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::Account, block_id).await?;
        Ok(())
    }
}

// =============================================================================
// ReapedAccount
// =============================================================================

/// `balances.ReapedAccount [AccountId]`.
pub struct ReapedAccountProcessor;

#[async_trait]
impl EventProcessor for ReapedAccountProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("balances", "ReapedAccount")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["AccountId"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(account_id) = attribute(ctx, 0, "account_id", parse_account) else {
            return Ok(());
        };

        acc.accounts_reaped.push(account_id.clone());

        let account_audit = AuditRecord::new(
            AuditKind::Account,
            ctx.locator(),
            codes::ACCOUNT_REAPED,
            account_id.clone(),
        );
        tx.insert_audit(&account_audit).await?;

        // The index is unknown here; sequencing frees every index of the account
        let index_audit = AuditRecord::new(
            AuditKind::AccountIndex,
            ctx.locator(),
            codes::ACCOUNT_INDEX_REAPED,
            account_id,
        )
        .with_data(&AccountIndexData {
            account_index_id: None,
        })?;
        tx.insert_audit(&index_audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::AccountIndex, block_id).await?;
        tx.delete_audits(AuditKind::Account, block_id).await?;
        Ok(())
    }
}
