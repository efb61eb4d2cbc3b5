//! Transactional fact writes for PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use harvester_core::error::{StorageError, StorageResult};
use harvester_core::models::{
    Account, AccountIndex, AuditKind, AuditRecord, Block, BlockCounters, BlockTotal, Candle,
    ChainEvent, ChainExtrinsic, Collective, Contract, DemocracyProposal, DemocracyReferendum,
    Interval, Log, Motion, MotionVote, NewCandle, Session, SessionTotal, SignerKind, Trade,
    TreasuryProposal,
};
use harvester_core::ports::{FactTx, SessionRecord};

use super::helpers::{
    COUNTER_NAMES, counter_columns, counter_placeholders, counter_values, to_json,
};
use super::rows::{
    AccountIndexRow, AccountRow, AuditRow, CANDLE_COLUMNS, CandleRow, DemocracyProposalRow,
    MotionRow, MotionVoteRow, ReferendumRow, SessionRow, TradeRow, TreasuryProposalRow,
    total_from_row, total_select,
};

/// Map a driver error, surfacing unique violations as constraint errors.
pub(crate) fn query_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::ConstraintViolation(db.message().to_string())
        }
        _ => StorageError::QueryError(e.to_string()),
    }
}

/// One open PostgreSQL transaction.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

const MOTION_COLUMNS: &str = "proposal_id, motion_hash, account_id, proposal, member_threshold, \
     yes_votes_count, no_votes_count, status, approved, executed, created_at_block, \
     updated_at_block";

const SESSION_COLUMNS: &str = "id, start_at_block, created_at_block, created_at_extrinsic, \
     created_at_event, count_validators, count_nominators, era";

const TRADE_COLUMNS: &str = "t.trade_hash, t.block_id, t.extrinsic_idx, t.event_idx, t.base, \
     t.quote, t.buyer, t.seller, t.maker, t.taker, t.otype, t.price::TEXT AS price, \
     t.base_amount::TEXT AS base_amount, t.quote_amount::TEXT AS quote_amount";

#[async_trait]
impl FactTx for PgTx {
    // ---- Blocks -------------------------------------------------------------

    async fn insert_block(&mut self, block: &Block) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO data_block (id, hash, parent_hash, state_root, extrinsics_root, \
             datetime, spec_version, {}) VALUES ($1, $2, $3, $4, $5, $6, $7, {})",
            counter_columns("count_"),
            counter_placeholders(8)
        );

        let mut query = sqlx::query(&sql)
            .bind(block.id as i64)
            .bind(&block.hash.0[..])
            .bind(&block.parent_hash.0[..])
            .bind(&block.state_root.0[..])
            .bind(&block.extrinsics_root.0[..])
            .bind(block.datetime)
            .bind(block.spec_version as i32);
        for value in counter_values(&block.counters) {
            query = query.bind(value);
        }

        query.execute(&mut *self.tx).await.map_err(query_err)?;
        Ok(())
    }

    async fn update_block_counters(
        &mut self,
        block_id: u64,
        counters: &BlockCounters,
    ) -> StorageResult<()> {
        let assignments = COUNTER_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| format!("count_{name} = ${}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE data_block SET {assignments} WHERE id = $1");

        let mut query = sqlx::query(&sql).bind(block_id as i64);
        for value in counter_values(counters) {
            query = query.bind(value);
        }

        let result = query.execute(&mut *self.tx).await.map_err(query_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("block {block_id}")));
        }
        Ok(())
    }

    async fn insert_extrinsics(
        &mut self,
        block_id: u64,
        extrinsics: &[ChainExtrinsic],
    ) -> StorageResult<()> {
        for x in extrinsics {
            let (signer, signer_kind) = match &x.signer {
                Some(s) => (
                    Some(s.address.as_str()),
                    Some(match s.kind {
                        SignerKind::Id => "id",
                        SignerKind::Index => "index",
                    }),
                ),
                None => (None, None),
            };

            sqlx::query(
                r#"
                INSERT INTO data_extrinsic (
                    block_id, extrinsic_idx, module_id, call_id, signer, signer_kind,
                    success, params
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(block_id as i64)
            .bind(x.extrinsic_idx as i32)
            .bind(&x.module_id)
            .bind(&x.call_id)
            .bind(signer)
            .bind(signer_kind)
            .bind(x.success)
            .bind(to_json(&x.params, "extrinsic.params")?)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        }
        Ok(())
    }

    async fn insert_events(&mut self, block_id: u64, events: &[ChainEvent]) -> StorageResult<()> {
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO data_event (
                    block_id, event_idx, phase, extrinsic_idx, module_id, event_id, attributes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(block_id as i64)
            .bind(event.event_idx as i32)
            .bind(event.phase.as_str())
            .bind(event.extrinsic_idx.map(|i| i as i32))
            .bind(&event.module_id)
            .bind(&event.event_id)
            .bind(to_json(&event.attributes, "event.attributes")?)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        }
        Ok(())
    }

    async fn insert_logs(&mut self, logs: &[Log]) -> StorageResult<()> {
        for log in logs {
            sqlx::query(
                r#"
                INSERT INTO data_log (block_id, log_idx, type_id, type, data)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(log.block_id as i64)
            .bind(log.log_idx as i32)
            .bind(log.type_id as i16)
            .bind(&log.type_name)
            .bind(&log.data)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        }
        Ok(())
    }

    async fn delete_logs(&mut self, block_id: u64) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM data_log WHERE block_id = $1")
            .bind(block_id as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }

    async fn block_total(&mut self, block_id: u64) -> StorageResult<Option<BlockTotal>> {
        let sql = format!("{} WHERE id = $1", total_select());
        let row = sqlx::query(&sql)
            .bind(block_id as i64)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_err)?;
        row.as_ref().map(total_from_row).transpose()
    }

    async fn insert_block_total(&mut self, total: &BlockTotal) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO data_block_total (id, session_id, parent_datetime, blocktime, \
             total_blocktime, {}) VALUES ($1, $2, $3, $4, $5, {})",
            counter_columns("total_"),
            counter_placeholders(6)
        );

        let mut query = sqlx::query(&sql)
            .bind(total.id as i64)
            .bind(total.session_id as i64)
            .bind(total.parent_datetime)
            .bind(total.blocktime)
            .bind(total.total_blocktime);
        for value in counter_values(&total.totals) {
            query = query.bind(value);
        }

        query.execute(&mut *self.tx).await.map_err(query_err)?;
        Ok(())
    }

    // ---- Audits -------------------------------------------------------------

    async fn insert_audit(&mut self, audit: &AuditRecord) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO {} (block_id, event_idx, extrinsic_idx, type_id, subject, data) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            audit.kind.table()
        );
        sqlx::query(&sql)
            .bind(audit.locator.block_id as i64)
            .bind(audit.locator.event_idx as i32)
            .bind(audit.locator.extrinsic_idx.map(|i| i as i32))
            .bind(audit.type_id)
            .bind(&audit.subject)
            .bind(&audit.data)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn audits(
        &mut self,
        kind: AuditKind,
        block_id: u64,
    ) -> StorageResult<Vec<AuditRecord>> {
        let sql = format!(
            "SELECT block_id, event_idx, extrinsic_idx, type_id, subject, data FROM {} \
             WHERE block_id = $1 ORDER BY event_idx, id",
            kind.table()
        );
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(block_id as i64)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(rows.into_iter().map(|r| r.into_audit(kind)).collect())
    }

    async fn delete_audits(&mut self, kind: AuditKind, block_id: u64) -> StorageResult<u64> {
        let sql = format!("DELETE FROM {} WHERE block_id = $1", kind.table());
        let result = sqlx::query(&sql)
            .bind(block_id as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }

    // ---- Accounts -----------------------------------------------------------

    async fn account(&mut self, id: &str) -> StorageResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, address, is_reaped, count_reaped, balance::TEXT AS balance,
                   created_at_block, updated_at_block
            FROM data_account
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_err)?;
        row.map(AccountRow::into_account).transpose()
    }

    async fn upsert_account(&mut self, account: &Account) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_account (
                id, address, is_reaped, count_reaped, balance, created_at_block, updated_at_block
            )
            VALUES ($1, $2, $3, $4, $5::NUMERIC, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                address = EXCLUDED.address,
                is_reaped = EXCLUDED.is_reaped,
                count_reaped = EXCLUDED.count_reaped,
                balance = EXCLUDED.balance,
                updated_at_block = EXCLUDED.updated_at_block
            "#,
        )
        .bind(&account.id)
        .bind(&account.address)
        .bind(account.is_reaped)
        .bind(account.count_reaped as i32)
        .bind(account.balance.to_string())
        .bind(account.created_at_block as i64)
        .bind(account.updated_at_block as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn account_index(&mut self, id: u32) -> StorageResult<Option<AccountIndex>> {
        let row = sqlx::query_as::<_, AccountIndexRow>(
            r#"
            SELECT id, account_id, short_address, is_reclaimable, created_at_block, updated_at_block
            FROM data_account_index
            WHERE id = $1
            "#,
        )
        .bind(id as i32)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(row.map(AccountIndexRow::into_index))
    }

    async fn account_indices_for(
        &mut self,
        account_id: &str,
    ) -> StorageResult<Vec<AccountIndex>> {
        let rows = sqlx::query_as::<_, AccountIndexRow>(
            r#"
            SELECT id, account_id, short_address, is_reclaimable, created_at_block, updated_at_block
            FROM data_account_index
            WHERE account_id = $1
            ORDER BY id
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(rows.into_iter().map(AccountIndexRow::into_index).collect())
    }

    async fn upsert_account_index(&mut self, index: &AccountIndex) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_account_index (
                id, account_id, short_address, is_reclaimable, created_at_block, updated_at_block
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                short_address = EXCLUDED.short_address,
                is_reclaimable = EXCLUDED.is_reclaimable,
                updated_at_block = EXCLUDED.updated_at_block
            "#,
        )
        .bind(index.id as i32)
        .bind(&index.account_id)
        .bind(&index.short_address)
        .bind(index.is_reclaimable)
        .bind(index.created_at_block as i64)
        .bind(index.updated_at_block as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    // ---- Democracy ----------------------------------------------------------

    async fn democracy_proposal(&mut self, id: u32) -> StorageResult<Option<DemocracyProposal>> {
        let row = sqlx::query_as::<_, DemocracyProposalRow>(
            r#"
            SELECT id, proposal, bond::TEXT AS bond, status, created_at_block, updated_at_block
            FROM data_democracy_proposal
            WHERE id = $1
            "#,
        )
        .bind(id as i32)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_err)?;
        row.map(DemocracyProposalRow::into_proposal).transpose()
    }

    async fn upsert_democracy_proposal(
        &mut self,
        proposal: &DemocracyProposal,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_democracy_proposal (
                id, proposal, bond, status, created_at_block, updated_at_block
            )
            VALUES ($1, $2, $3::NUMERIC, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                proposal = EXCLUDED.proposal,
                bond = EXCLUDED.bond,
                status = EXCLUDED.status,
                updated_at_block = EXCLUDED.updated_at_block
            "#,
        )
        .bind(proposal.id as i32)
        .bind(&proposal.proposal)
        .bind(proposal.bond.map(|b| b.to_string()))
        .bind(&proposal.status)
        .bind(proposal.created_at_block as i64)
        .bind(proposal.updated_at_block as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn referendum(&mut self, id: u32) -> StorageResult<Option<DemocracyReferendum>> {
        let row = sqlx::query_as::<_, ReferendumRow>(
            r#"
            SELECT id, proposal, vote_threshold, success, status, created_at_block, updated_at_block
            FROM data_democracy_referendum
            WHERE id = $1
            "#,
        )
        .bind(id as i32)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(row.map(ReferendumRow::into_referendum))
    }

    async fn upsert_referendum(&mut self, referendum: &DemocracyReferendum) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_democracy_referendum (
                id, proposal, vote_threshold, success, status, created_at_block, updated_at_block
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                proposal = EXCLUDED.proposal,
                vote_threshold = EXCLUDED.vote_threshold,
                success = EXCLUDED.success,
                status = EXCLUDED.status,
                updated_at_block = EXCLUDED.updated_at_block
            "#,
        )
        .bind(referendum.id as i32)
        .bind(&referendum.proposal)
        .bind(&referendum.vote_threshold)
        .bind(referendum.success)
        .bind(&referendum.status)
        .bind(referendum.created_at_block as i64)
        .bind(referendum.updated_at_block as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    // ---- Collective motions -------------------------------------------------

    async fn open_motion(
        &mut self,
        collective: Collective,
        motion_hash: &str,
    ) -> StorageResult<Option<Motion>> {
        let sql = format!(
            "SELECT {MOTION_COLUMNS} FROM {} \
             WHERE motion_hash = $1 AND status NOT IN ('Disapproved', 'Executed') \
             ORDER BY proposal_id LIMIT 1",
            collective.motion_table()
        );
        let row = sqlx::query_as::<_, MotionRow>(&sql)
            .bind(motion_hash)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_err)?;
        row.map(|r| r.into_motion(collective)).transpose()
    }

    async fn upsert_motion(&mut self, motion: &Motion) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO {} ({MOTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (proposal_id) DO UPDATE SET \
                 motion_hash = EXCLUDED.motion_hash, \
                 account_id = EXCLUDED.account_id, \
                 proposal = EXCLUDED.proposal, \
                 member_threshold = EXCLUDED.member_threshold, \
                 yes_votes_count = EXCLUDED.yes_votes_count, \
                 no_votes_count = EXCLUDED.no_votes_count, \
                 status = EXCLUDED.status, \
                 approved = EXCLUDED.approved, \
                 executed = EXCLUDED.executed, \
                 updated_at_block = EXCLUDED.updated_at_block",
            motion.collective.motion_table()
        );
        sqlx::query(&sql)
            .bind(motion.proposal_id as i32)
            .bind(&motion.motion_hash)
            .bind(&motion.account_id)
            .bind(&motion.proposal)
            .bind(motion.member_threshold as i32)
            .bind(motion.yes_votes_count as i32)
            .bind(motion.no_votes_count as i32)
            .bind(motion.status.as_str())
            .bind(motion.approved)
            .bind(motion.executed)
            .bind(motion.created_at_block as i64)
            .bind(motion.updated_at_block as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn motion_vote(
        &mut self,
        collective: Collective,
        proposal_id: u32,
        account_id: &str,
    ) -> StorageResult<Option<MotionVote>> {
        let sql = format!(
            "SELECT proposal_id, account_id, vote, created_at_block, updated_at_block FROM {} \
             WHERE proposal_id = $1 AND account_id = $2",
            collective.vote_table()
        );
        let row = sqlx::query_as::<_, MotionVoteRow>(&sql)
            .bind(proposal_id as i32)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(row.map(|r| r.into_vote(collective)))
    }

    async fn upsert_motion_vote(&mut self, vote: &MotionVote) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO {} (proposal_id, account_id, vote, created_at_block, updated_at_block) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (proposal_id, account_id) DO UPDATE SET \
                 vote = EXCLUDED.vote, \
                 updated_at_block = EXCLUDED.updated_at_block",
            vote.collective.vote_table()
        );
        sqlx::query(&sql)
            .bind(vote.proposal_id as i32)
            .bind(&vote.account_id)
            .bind(vote.vote)
            .bind(vote.created_at_block as i64)
            .bind(vote.updated_at_block as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    // ---- Treasury -----------------------------------------------------------

    async fn open_treasury_proposal(
        &mut self,
        id: u32,
    ) -> StorageResult<Option<TreasuryProposal>> {
        let row = sqlx::query_as::<_, TreasuryProposalRow>(
            r#"
            SELECT id, proposed_by, beneficiary, value::TEXT AS value,
                   slash_value::TEXT AS slash_value, status, created_at_block, updated_at_block
            FROM data_treasury_proposal
            WHERE id = $1 AND status = 'Proposed'
            "#,
        )
        .bind(id as i32)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_err)?;
        row.map(TreasuryProposalRow::into_proposal).transpose()
    }

    async fn upsert_treasury_proposal(
        &mut self,
        proposal: &TreasuryProposal,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_treasury_proposal (
                id, proposed_by, beneficiary, value, slash_value, status,
                created_at_block, updated_at_block
            )
            VALUES ($1, $2, $3, $4::NUMERIC, $5::NUMERIC, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                proposed_by = EXCLUDED.proposed_by,
                beneficiary = EXCLUDED.beneficiary,
                value = EXCLUDED.value,
                slash_value = EXCLUDED.slash_value,
                status = EXCLUDED.status,
                updated_at_block = EXCLUDED.updated_at_block
            "#,
        )
        .bind(proposal.id as i32)
        .bind(&proposal.proposed_by)
        .bind(&proposal.beneficiary)
        .bind(proposal.value.map(|v| v.to_string()))
        .bind(proposal.slash_value.map(|v| v.to_string()))
        .bind(proposal.status.as_str())
        .bind(proposal.created_at_block as i64)
        .bind(proposal.updated_at_block as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    // ---- Sessions -----------------------------------------------------------

    async fn insert_session(&mut self, record: SessionRecord<'_>) -> StorageResult<()> {
        let session = record.session;
        sqlx::query(&format!(
            "INSERT INTO data_session ({SESSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(session.id as i32)
        .bind(session.start_at_block as i64)
        .bind(session.created_at_block as i64)
        .bind(session.created_at_extrinsic.map(|i| i as i32))
        .bind(session.created_at_event as i32)
        .bind(session.count_validators as i32)
        .bind(session.count_nominators as i32)
        .bind(session.era.map(|e| e as i32))
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;

        for v in record.validators {
            sqlx::query(
                r#"
                INSERT INTO data_session_validator (
                    session_id, rank_validator, validator_stash, validator_controller,
                    validator_session, bonded_total, bonded_active, bonded_own,
                    bonded_nominators, unlocking, count_nominators, unstake_threshold, commission
                )
                VALUES ($1, $2, $3, $4, $5, $6::NUMERIC, $7::NUMERIC, $8::NUMERIC,
                        $9::NUMERIC, $10, $11, $12, $13::NUMERIC)
                "#,
            )
            .bind(v.session_id as i32)
            .bind(v.rank_validator as i32)
            .bind(&v.validator_stash)
            .bind(&v.validator_controller)
            .bind(&v.validator_session)
            .bind(v.bonded_total.map(|n| n.to_string()))
            .bind(v.bonded_active.map(|n| n.to_string()))
            .bind(v.bonded_own.map(|n| n.to_string()))
            .bind(v.bonded_nominators.map(|n| n.to_string()))
            .bind(&v.unlocking)
            .bind(v.count_nominators as i32)
            .bind(v.unstake_threshold.map(|n| n as i32))
            .bind(v.commission.map(|n| n.to_string()))
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        }

        for n in record.nominators {
            sqlx::query(
                r#"
                INSERT INTO data_session_nominator (
                    session_id, rank_validator, rank_nominator, nominator_stash, bonded
                )
                VALUES ($1, $2, $3, $4, $5::NUMERIC)
                "#,
            )
            .bind(n.session_id as i32)
            .bind(n.rank_validator as i32)
            .bind(n.rank_nominator as i32)
            .bind(&n.nominator_stash)
            .bind(n.bonded.map(|b| b.to_string()))
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        }

        Ok(())
    }

    async fn session(&mut self, id: u32) -> StorageResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM data_session WHERE id = $1"
        ))
        .bind(id as i32)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(row.map(SessionRow::into_session))
    }

    async fn sessions_created_at(&mut self, block_id: u64) -> StorageResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM data_session WHERE created_at_block = $1 ORDER BY id"
        ))
        .bind(block_id as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    async fn delete_sessions_created_at(&mut self, block_id: u64) -> StorageResult<u64> {
        sqlx::query(
            r#"
            DELETE FROM data_session_nominator
            WHERE session_id IN (SELECT id FROM data_session WHERE created_at_block = $1)
            "#,
        )
        .bind(block_id as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;

        sqlx::query(
            r#"
            DELETE FROM data_session_validator
            WHERE session_id IN (SELECT id FROM data_session WHERE created_at_block = $1)
            "#,
        )
        .bind(block_id as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;

        let result = sqlx::query("DELETE FROM data_session WHERE created_at_block = $1")
            .bind(block_id as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }

    async fn upsert_session_total(&mut self, total: &SessionTotal) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_session_total (id, end_at_block, count_blocks)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                end_at_block = EXCLUDED.end_at_block,
                count_blocks = EXCLUDED.count_blocks
            "#,
        )
        .bind(total.id as i32)
        .bind(total.end_at_block as i64)
        .bind(total.count_blocks as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    // ---- Contracts ----------------------------------------------------------

    async fn insert_contract(&mut self, contract: &Contract) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_contract (
                code_hash, bytecode, created_at_block, created_at_extrinsic, created_at_event
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&contract.code_hash)
        .bind(&contract.bytecode)
        .bind(contract.created_at_block as i64)
        .bind(contract.created_at_extrinsic.map(|i| i as i32))
        .bind(contract.created_at_event as i32)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn delete_contracts_created_at(&mut self, block_id: u64) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM data_contract WHERE created_at_block = $1")
            .bind(block_id as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }

    // ---- Market -------------------------------------------------------------

    async fn insert_trade(&mut self, trade: &Trade) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_trade (
                trade_hash, block_id, extrinsic_idx, event_idx, base, quote,
                buyer, seller, maker, taker, otype, price, base_amount, quote_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12::NUMERIC, $13::NUMERIC, $14::NUMERIC)
            "#,
        )
        .bind(&trade.trade_hash)
        .bind(trade.block_id as i64)
        .bind(trade.extrinsic_idx.map(|i| i as i32))
        .bind(trade.event_idx as i32)
        .bind(&trade.base)
        .bind(&trade.quote)
        .bind(&trade.buyer)
        .bind(&trade.seller)
        .bind(&trade.maker)
        .bind(&trade.taker)
        .bind(trade.otype)
        .bind(trade.price.to_string())
        .bind(trade.base_amount.to_string())
        .bind(trade.quote_amount.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn delete_trades(&mut self, block_id: u64) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM data_trade WHERE block_id = $1")
            .bind(block_id as i64)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }

    async fn trades_in_window(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_block: u64,
    ) -> StorageResult<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {TRADE_COLUMNS} FROM data_trade t \
             JOIN data_block b ON b.id = t.block_id \
             WHERE b.datetime >= $1 AND b.datetime < $2 AND t.block_id <= $3 \
             ORDER BY t.block_id, t.event_idx"
        ))
        .bind(from)
        .bind(to)
        .bind(max_block as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(query_err)?;
        rows.into_iter().map(TradeRow::into_trade).collect()
    }

    async fn candles_in_range(
        &mut self,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Candle>> {
        let sql = format!(
            "SELECT {CANDLE_COLUMNS} FROM {} WHERE time >= $1 AND time < $2 ORDER BY time, id",
            interval.table()
        );
        let rows = sqlx::query_as::<_, CandleRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(query_err)?;
        rows.into_iter().map(|r| r.into_candle(interval)).collect()
    }

    async fn candles_at(
        &mut self,
        interval: Interval,
        time: DateTime<Utc>,
    ) -> StorageResult<Vec<Candle>> {
        let sql = format!(
            "SELECT {CANDLE_COLUMNS} FROM {} WHERE time = $1 ORDER BY id",
            interval.table()
        );
        let rows = sqlx::query_as::<_, CandleRow>(&sql)
            .bind(time)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(query_err)?;
        rows.into_iter().map(|r| r.into_candle(interval)).collect()
    }

    async fn insert_candle(&mut self, candle: &NewCandle) -> StorageResult<i64> {
        let sql = format!(
            "INSERT INTO {} (time, base, quote, open, high, low, close, base_amount, quote_amount) \
             VALUES ($1, $2, $3, $4::NUMERIC, $5::NUMERIC, $6::NUMERIC, $7::NUMERIC, \
                     $8::NUMERIC, $9::NUMERIC) \
             RETURNING id",
            candle.interval.table()
        );
        let v = &candle.values;
        let (id,): (i64,) = sqlx::query_as(&sql)
            .bind(candle.time)
            .bind(&candle.base)
            .bind(&candle.quote)
            .bind(v.open.to_string())
            .bind(v.high.to_string())
            .bind(v.low.to_string())
            .bind(v.close.to_string())
            .bind(v.base_amount.to_string())
            .bind(v.quote_amount.to_string())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(query_err)?;
        Ok(id)
    }

    async fn update_candle(&mut self, candle: &Candle) -> StorageResult<()> {
        let sql = format!(
            "UPDATE {} SET open = $2::NUMERIC, high = $3::NUMERIC, low = $4::NUMERIC, \
             close = $5::NUMERIC, base_amount = $6::NUMERIC, quote_amount = $7::NUMERIC \
             WHERE id = $1",
            candle.interval.table()
        );
        let v = &candle.values;
        let result = sqlx::query(&sql)
            .bind(candle.id)
            .bind(v.open.to_string())
            .bind(v.high.to_string())
            .bind(v.low.to_string())
            .bind(v.close.to_string())
            .bind(v.base_amount.to_string())
            .bind(v.quote_amount.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("candle {}", candle.id)));
        }
        Ok(())
    }

    // ---- Lifecycle ----------------------------------------------------------

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))
    }
}
