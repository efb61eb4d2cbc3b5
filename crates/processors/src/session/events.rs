//! `session.NewSession` processor.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, instrument};

use harvester_core::error::{ChainResult, HarvesterResult};
use harvester_core::models::{Session, SessionNominator, SessionSnapshot, SessionValidator};
use harvester_core::ports::{
    BlockAccumulation, ChainSource, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
    SessionRecord,
};

use super::snapshot::read_session_snapshot;
use crate::utils::{attribute, parse_u32};

/// `session.NewSession [SessionIndex]`.
pub struct NewSessionProcessor;

#[async_trait]
impl EventProcessor for NewSessionProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("session", "NewSession")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["SessionIndex"]
    }

    #[instrument(skip_all, fields(block = ctx.block.number))]
    async fn prefetch(
        &self,
        ctx: &EventContext<'_>,
        chain: &dyn ChainSource,
    ) -> ChainResult<Prefetched> {
        let snapshot =
            read_session_snapshot(chain, ctx.block.hash, ctx.legacy_session_lookup).await?;
        debug!(
            era = ?snapshot.era,
            validators = snapshot.validators.len(),
            "Session snapshot read"
        );
        Ok(Prefetched::Session(snapshot))
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        prefetched: &Prefetched,
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        acc.block.counters.sessions_new += 1;
        let Some(session_id) = attribute(ctx, 0, "session_index", parse_u32) else {
            return Ok(());
        };

        let empty = SessionSnapshot::default();
        let snapshot = match prefetched {
            Prefetched::Session(snapshot) => snapshot,
            _ => &empty,
        };
        let (session, validators, nominators) =
            build_session_rows(session_id, ctx, acc.block.id, snapshot);

        tx.insert_session(SessionRecord {
            session: &session,
            validators: &validators,
            nominators: &nominators,
        })
        .await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_sessions_created_at(block_id).await?;
        Ok(())
    }
}

fn build_session_rows(
    session_id: u32,
    ctx: &EventContext<'_>,
    block_id: u64,
    snapshot: &SessionSnapshot,
) -> (Session, Vec<SessionValidator>, Vec<SessionNominator>) {
    let mut validators = Vec::with_capacity(snapshot.validators.len());
    let mut nominators = Vec::new();
    let mut distinct = HashSet::new();

    for (rank_validator, v) in (0u32..).zip(&snapshot.validators) {
        let bonded_nominators = match (v.exposure_total, v.exposure_own) {
            (Some(total), Some(own)) => total.checked_sub(own),
            _ => None,
        };

        validators.push(SessionValidator {
            session_id,
            rank_validator,
            validator_stash: v.stash.clone(),
            validator_controller: v.controller.clone(),
            validator_session: v.session_key.clone(),
            bonded_total: v.exposure_total,
            bonded_active: v.bonded_active,
            bonded_own: v.exposure_own,
            bonded_nominators,
            unlocking: v.unlocking.clone(),
            count_nominators: v.nominators.len() as u32,
            unstake_threshold: v.unstake_threshold,
            commission: v.commission,
        });

        for (rank_nominator, (stash, bonded)) in (0u32..).zip(&v.nominators) {
            distinct.insert(stash.as_str());
            nominators.push(SessionNominator {
                session_id,
                rank_validator,
                rank_nominator,
                nominator_stash: stash.clone(),
                bonded: *bonded,
            });
        }
    }

    let session = Session {
        id: session_id,
        start_at_block: block_id + 1,
        created_at_block: block_id,
        created_at_extrinsic: ctx.event.extrinsic_idx,
        created_at_event: ctx.event.event_idx,
        count_validators: validators.len() as u32,
        count_nominators: distinct.len() as u32,
        era: snapshot.era,
    };

    (session, validators, nominators)
}
