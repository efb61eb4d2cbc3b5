//! Event processors for the Democracy module.

use async_trait::async_trait;
use tracing::debug;

use harvester_core::error::{ChainResult, HarvesterResult};
use harvester_core::models::{AuditKind, AuditRecord, StorageParam, StorageQuery, codes};
use harvester_core::ports::{
    BlockAccumulation, ChainSource, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
};

use super::models::{ProposalData, ReferendumData};
use crate::utils::{
    attribute, extract_field, parse_amount, parse_bool, parse_hash_hex, parse_identifier,
    parse_u32,
};

// =============================================================================
// Proposals
// =============================================================================

/// `democracy.Proposed [PropIndex, Balance]`.
pub struct ProposedProcessor;

#[async_trait]
impl EventProcessor for ProposedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("democracy", "Proposed")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["PropIndex", "Balance"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(index) = attribute(ctx, 0, "proposal_index", parse_u32) else {
            return Ok(());
        };
        let bond = attribute(ctx, 1, "bond", parse_amount);

        let audit = AuditRecord::new(
            AuditKind::DemocracyProposal,
            ctx.locator(),
            codes::DEMOCRACY_PROPOSAL_PROPOSED,
            index.to_string(),
        )
        .with_data(&ProposalData {
            bond,
            proposal: ctx.call_param("proposal").cloned(),
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::DemocracyProposal, block_id).await?;
        Ok(())
    }
}

/// `democracy.Tabled [PropIndex, Balance, Vec<AccountId>]`.
pub struct TabledProcessor;

#[async_trait]
impl EventProcessor for TabledProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("democracy", "Tabled")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["PropIndex", "Balance", "Vec<AccountId>"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(index) = attribute(ctx, 0, "proposal_index", parse_u32) else {
            return Ok(());
        };
        let bond = attribute(ctx, 1, "bond", parse_amount);

        let audit = AuditRecord::new(
            AuditKind::DemocracyProposal,
            ctx.locator(),
            codes::DEMOCRACY_PROPOSAL_TABLED,
            index.to_string(),
        )
        .with_data(&ProposalData {
            bond,
            proposal: None,
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::DemocracyProposal, block_id).await?;
        Ok(())
    }
}

// =============================================================================
// Referenda
// =============================================================================

/// `democracy.Started [ReferendumIndex, VoteThreshold]`.
pub struct ReferendumStartedProcessor;

#[async_trait]
impl EventProcessor for ReferendumStartedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("democracy", "Started")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["ReferendumIndex", "VoteThreshold"]
    }

    async fn prefetch(
        &self,
        ctx: &EventContext<'_>,
        chain: &dyn ChainSource,
    ) -> ChainResult<Prefetched> {
        let Some(index) = ctx.event.attr(0).and_then(parse_u32) else {
            return Ok(Prefetched::Nothing);
        };

        let info_query = StorageQuery::new("Democracy", "ReferendumInfoOf", ctx.block.hash)
            .param(StorageParam::U32(index));
        let Some(info) = chain.storage(&info_query).await? else {
            debug!(referendum = index, "No referendum info in state");
            return Ok(Prefetched::Referendum(None));
        };

        let Some(proposal_hash) = proposal_hash(&info) else {
            return Ok(Prefetched::Referendum(Some(info)));
        };
        let preimage_query = StorageQuery::new("Democracy", "Preimages", ctx.block.hash)
            .param(StorageParam::Hash(proposal_hash));
        let preimage = chain.storage(&preimage_query).await?;

        Ok(Prefetched::Referendum(Some(merge_preimage(info, preimage))))
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(index) = attribute(ctx, 0, "referendum_index", parse_u32) else {
            return Ok(());
        };
        let vote_threshold = attribute(ctx, 1, "vote_threshold", parse_identifier);
        let proposal = match prefetched {
            Prefetched::Referendum(info) => info.clone(),
            _ => None,
        };

        let audit = AuditRecord::new(
            AuditKind::DemocracyReferendum,
            ctx.locator(),
            codes::REFERENDUM_STARTED,
            index.to_string(),
        )
        .with_data(&ReferendumData {
            vote_threshold,
            proposal,
            success: None,
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::DemocracyReferendum, block_id).await?;
        Ok(())
    }
}

/// Hash of the proposal behind a referendum, for both the flat and the
/// `Ongoing`-wrapped layouts of `ReferendumInfoOf`.
fn proposal_hash(info: &serde_json::Value) -> Option<String> {
    let keys = ["proposalHash", "proposal_hash"];
    extract_field(info, &keys, parse_hash_hex).or_else(|| {
        info.get("Ongoing")
            .and_then(|ongoing| extract_field(ongoing, &keys, parse_hash_hex))
    })
}

fn merge_preimage(
    mut info: serde_json::Value,
    preimage: Option<serde_json::Value>,
) -> serde_json::Value {
    if let (Some(target), Some(serde_json::Value::Object(extra))) =
        (info.as_object_mut(), preimage)
    {
        target.extend(extra);
    }
    info
}

/// Referendum events carrying only the index, plus `Executed` with its
/// dispatch result.
pub struct ReferendumOutcomeProcessor {
    event: &'static str,
    shape: &'static [&'static str],
    type_id: i16,
}

impl ReferendumOutcomeProcessor {
    pub fn passed() -> Self {
        Self {
            event: "Passed",
            shape: &["ReferendumIndex"],
            type_id: codes::REFERENDUM_PASSED,
        }
    }

    pub fn not_passed() -> Self {
        Self {
            event: "NotPassed",
            shape: &["ReferendumIndex"],
            type_id: codes::REFERENDUM_NOTPASSED,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            event: "Cancelled",
            shape: &["ReferendumIndex"],
            type_id: codes::REFERENDUM_CANCELLED,
        }
    }

    pub fn executed() -> Self {
        Self {
            event: "Executed",
            shape: &["ReferendumIndex", "bool"],
            type_id: codes::REFERENDUM_EXECUTED,
        }
    }
}

#[async_trait]
impl EventProcessor for ReferendumOutcomeProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("democracy", self.event)
    }

    fn shape(&self) -> &'static [&'static str] {
        self.shape
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        _acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(index) = attribute(ctx, 0, "referendum_index", parse_u32) else {
            return Ok(());
        };
        let success = if self.type_id == codes::REFERENDUM_EXECUTED {
            attribute(ctx, 1, "success", parse_bool)
        } else {
            None
        };

        let audit = AuditRecord::new(
            AuditKind::DemocracyReferendum,
            ctx.locator(),
            self.type_id,
            index.to_string(),
        )
        .with_data(&ReferendumData {
            success,
            ..Default::default()
        })?;
        tx.insert_audit(&audit).await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_audits(AuditKind::DemocracyReferendum, block_id).await?;
        Ok(())
    }
}
