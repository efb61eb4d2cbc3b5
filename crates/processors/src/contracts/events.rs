//! Event processors for the Contracts module.

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::Contract;
use harvester_core::ports::{
    BlockAccumulation, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
};

use crate::utils::{attribute, parse_hash_hex, parse_identifier};

/// `contract.CodeStored [Hash]`.
pub struct CodeStoredProcessor;

#[async_trait]
impl EventProcessor for CodeStoredProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("contract", "CodeStored")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["Hash"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(code_hash) = attribute(ctx, 0, "code_hash", parse_hash_hex) else {
            return Ok(());
        };

        acc.block.counters.contracts_new += 1;
        tx.insert_contract(&Contract {
            code_hash,
            bytecode: ctx.call_param("code").and_then(parse_identifier),
            created_at_block: acc.block.id,
            created_at_extrinsic: ctx.event.extrinsic_idx,
            created_at_event: ctx.event.event_idx,
        })
        .await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_contracts_created_at(block_id).await?;
        Ok(())
    }
}
