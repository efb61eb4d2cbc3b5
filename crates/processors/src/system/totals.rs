//! Running totals, chained block by block.

use async_trait::async_trait;

use harvester_core::error::{DomainError, HarvesterResult};
use harvester_core::models::BlockTotal;
use harvester_core::ports::{BlockProcessor, FactTx, SequencingContext};

/// Computes [`BlockTotal`] from the parent's total and the block's counters.
///
/// Genesis chains to the zero sentinel: blocktime 0 and its own timestamp
/// as `parent_datetime`. The session id advances on the block after a
/// `NewSession`.
pub struct TotalsProcessor;

#[async_trait]
impl BlockProcessor for TotalsProcessor {
    fn name(&self) -> &'static str {
        "totals"
    }

    async fn sequencing_hook(
        &self,
        ctx: &mut SequencingContext<'_>,
        _tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let block = ctx.block;
        let parent_total = ctx.parent_total;

        let (parent_datetime, blocktime) = match ctx.parent {
            Some(parent) => (
                parent.datetime,
                (block.datetime - parent.datetime).num_seconds(),
            ),
            None => (block.datetime, 0),
        };

        let totals = parent_total.totals.checked_add(&block.counters)?;
        let total_blocktime = parent_total
            .total_blocktime
            .checked_add(blocktime)
            .ok_or_else(|| DomainError::ArithmeticOverflow("total_blocktime".into()))?;

        let mut session_id = parent_total.session_id;
        if ctx.parent.is_some_and(|p| p.counters.sessions_new > 0) {
            session_id += 1;
        }

        ctx.total = Some(BlockTotal {
            id: block.id,
            session_id,
            parent_datetime,
            blocktime,
            total_blocktime,
            totals,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use harvester_core::models::{Block, BlockCounters, BlockHash};
    use harvester_storage::MemoryStore;
    use harvester_core::ports::FactStore;

    use crate::testing::TestCodec;

    fn block(id: u64, secs: i64, counters: BlockCounters) -> Block {
        Block {
            id,
            hash: BlockHash([id as u8 + 1; 32]),
            parent_hash: BlockHash([id as u8; 32]),
            state_root: BlockHash([0; 32]),
            extrinsics_root: BlockHash([0; 32]),
            datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs),
            spec_version: 1,
            counters,
        }
    }

    async fn run(block: &Block, parent: Option<&Block>, parent_total: &BlockTotal) -> BlockTotal {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut ctx = SequencingContext::new(block, parent, parent_total, &TestCodec);
        TotalsProcessor
            .sequencing_hook(&mut ctx, tx.as_mut())
            .await
            .unwrap();
        ctx.total.unwrap()
    }

    // Test critique: le genesis est chaîné à la sentinelle zéro
    #[tokio::test]
    async fn test_genesis_chains_to_zero() {
        let genesis = block(
            0,
            0,
            BlockCounters {
                extrinsics: 1,
                ..Default::default()
            },
        );
        let total = run(&genesis, None, &BlockTotal::zero()).await;

        assert_eq!(total.id, 0);
        assert_eq!(total.blocktime, 0);
        assert_eq!(total.parent_datetime, genesis.datetime);
        assert_eq!(total.session_id, 0);
        assert_eq!(total.totals.extrinsics, 1);
    }

    // Test critique: total_X = parent.total_X + count_X, et session_id avance après NewSession
    #[tokio::test]
    async fn test_totals_follow_parent() {
        let parent = block(
            4,
            0,
            BlockCounters {
                sessions_new: 1,
                ..Default::default()
            },
        );
        let parent_total = BlockTotal {
            id: 4,
            session_id: 2,
            parent_datetime: parent.datetime,
            blocktime: 6,
            total_blocktime: 30,
            totals: BlockCounters {
                events: 10,
                accounts: 3,
                ..Default::default()
            },
        };
        let child = block(
            5,
            6,
            BlockCounters {
                events: 4,
                accounts: -1,
                ..Default::default()
            },
        );

        let total = run(&child, Some(&parent), &parent_total).await;
        assert_eq!(total.blocktime, 6);
        assert_eq!(total.total_blocktime, 36);
        assert_eq!(total.parent_datetime, parent.datetime);
        assert_eq!(total.totals.events, 14);
        assert_eq!(total.totals.accounts, 2);
        assert_eq!(total.session_id, 3);
    }
}
