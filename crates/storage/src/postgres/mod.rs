//! PostgreSQL storage adapter.
//!
//! This module implements the fact store ports defined in `harvester-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgFactStore`] - Reads, status flags and transaction factory
//! - [`PgTx`] - One open transaction implementing every fact write
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_harvester(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let store = PgFactStore::new(Arc::new(db));
//! ```

mod database;
mod helpers;
mod rows;
mod tx;

pub use database::{Database, DatabaseConfig, PurgeStats};
pub use tx::PgTx;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use harvester_core::error::{BlockRange, StorageError, StorageResult};
use harvester_core::models::{Block, BlockHash, BlockTotal, Candle};
use harvester_core::ports::{FactStore, FactTx, MarketHistoryQuery};

use rows::{CANDLE_COLUMNS, CandleRow, block_from_row, block_select, total_from_row, total_select};
use tx::query_err;

// =============================================================================
// Fact Store
// =============================================================================

/// PostgreSQL fact store.
pub struct PgFactStore {
    db: Arc<Database>,
}

impl PgFactStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FactStore for PgFactStore {
    async fn begin(&self) -> StorageResult<Box<dyn FactTx>> {
        let tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;
        Ok(Box::new(PgTx::new(tx)))
    }

    async fn block(&self, id: u64) -> StorageResult<Option<Block>> {
        let sql = format!("{} WHERE id = $1", block_select());
        let row = sqlx::query(&sql)
            .bind(id as i64)
            .fetch_optional(self.db.pool())
            .await
            .map_err(query_err)?;
        row.as_ref().map(block_from_row).transpose()
    }

    async fn block_by_hash(&self, hash: &BlockHash) -> StorageResult<Option<Block>> {
        let sql = format!("{} WHERE hash = $1", block_select());
        let row = sqlx::query(&sql)
            .bind(&hash.0[..])
            .fetch_optional(self.db.pool())
            .await
            .map_err(query_err)?;
        row.as_ref().map(block_from_row).transpose()
    }

    async fn block_total(&self, id: u64) -> StorageResult<Option<BlockTotal>> {
        let sql = format!("{} WHERE id = $1", total_select());
        let row = sqlx::query(&sql)
            .bind(id as i64)
            .fetch_optional(self.db.pool())
            .await
            .map_err(query_err)?;
        row.as_ref().map(total_from_row).transpose()
    }

    async fn latest_block_id(&self) -> StorageResult<Option<u64>> {
        // MAX returns NULL when table is empty, so we need Option<i64> in the tuple
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM data_block")
            .fetch_one(self.db.pool())
            .await
            .map_err(query_err)?;
        Ok(row.0.map(|n| n as u64))
    }

    async fn latest_sequenced_id(&self) -> StorageResult<Option<u64>> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM data_block_total")
            .fetch_one(self.db.pool())
            .await
            .map_err(query_err)?;
        Ok(row.0.map(|n| n as u64))
    }

    async fn missing_block_ranges(&self) -> StorageResult<Vec<BlockRange>> {
        // Gaps between consecutive ids, plus the gap below the lowest id
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT gap_from, gap_to FROM (
                SELECT
                    COALESCE(LAG(id) OVER (ORDER BY id), -1) + 1 AS gap_from,
                    id - 1 AS gap_to
                FROM data_block
            ) gaps
            WHERE gap_from <= gap_to
            ORDER BY gap_from
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|(from, to)| BlockRange {
                from: from as u64,
                to: to as u64,
            })
            .collect())
    }

    async fn try_acquire_flag(
        &self,
        key: &str,
        value: &str,
        lease: Duration,
    ) -> StorageResult<bool> {
        sqlx::query("INSERT INTO harvester_status (key, value) VALUES ($1, NULL) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .execute(self.db.pool())
            .await
            .map_err(query_err)?;

        // Yields the previous holder, NULL when the flag was free
        let taken: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            WITH previous AS (
                SELECT value FROM harvester_status WHERE key = $1 FOR UPDATE
            )
            UPDATE harvester_status
            SET value = $2, updated_at = NOW()
            WHERE key = $1
              AND (value IS NULL OR updated_at < NOW() - make_interval(secs => $3))
            RETURNING (SELECT value FROM previous)
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(lease.as_secs_f64())
        .fetch_optional(self.db.pool())
        .await
        .map_err(query_err)?;

        if let Some((Some(previous),)) = &taken {
            warn!(flag = key, previous = %previous, "⚠️  Reclaiming stale status flag");
        }
        let acquired = taken.is_some();
        debug!(flag = key, acquired, "Status flag acquisition");
        Ok(acquired)
    }

    async fn refresh_flag(&self, key: &str, value: &str) -> StorageResult<bool> {
        let result =
            sqlx::query("UPDATE harvester_status SET updated_at = NOW() WHERE key = $1 AND value = $2")
                .bind(key)
                .bind(value)
                .execute(self.db.pool())
                .await
                .map_err(query_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_flag(&self, key: &str, value: &str) -> StorageResult<()> {
        sqlx::query(
            "UPDATE harvester_status SET value = NULL, updated_at = NOW() WHERE key = $1 AND value = $2",
        )
        .bind(key)
        .bind(value)
        .execute(self.db.pool())
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn market_history(&self, query: &MarketHistoryQuery) -> StorageResult<Vec<Candle>> {
        let sql = format!(
            "SELECT {CANDLE_COLUMNS} FROM {} \
             WHERE base = $1 AND quote = $2 AND time <= $3 \
             ORDER BY id \
             LIMIT $4",
            query.interval.table()
        );
        let rows = sqlx::query_as::<_, CandleRow>(&sql)
            .bind(&query.base)
            .bind(&query.quote)
            .bind(query.cutoff)
            .bind(query.limit as i64)
            .fetch_all(self.db.pool())
            .await
            .map_err(query_err)?;
        rows.into_iter()
            .map(|r| r.into_candle(query.interval))
            .collect()
    }
}
