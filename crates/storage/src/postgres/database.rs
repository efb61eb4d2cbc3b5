//! PostgreSQL pool, migrations and purge.

use std::time::Duration;

use sqlx::PgConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};

use harvester_core::error::{StorageError, StorageResult};

use super::tx::query_err;

/// Pool sizing for one consumer of the database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Harvest loop pool.
    ///
    /// A block transaction plus the reads and flag updates issued between
    /// transactions never need more than two connections.
    pub fn for_harvester(url: &str) -> Self {
        Self {
            url: url.to_string(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// HTTP API pool. Requests fail fast rather than queue behind the harvester.
    pub fn for_api(url: &str) -> Self {
        Self {
            url: url.to_string(),
            max_connections: 8,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip_all, fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        debug!("Connection pool created");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationError(e.to_string()))?;
        debug!("Migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Empty every harvested table and the status flags in one transaction.
    ///
    /// Children of `data_block` (extrinsics, events, logs, audits, trades,
    /// totals) go with it through `CASCADE`. The schema is kept.
    #[instrument(skip(self))]
    pub async fn purge(&self) -> StorageResult<PurgeStats> {
        let mut tx = self.pool.begin().await.map_err(query_err)?;

        let stats = PurgeStats {
            blocks_removed: count_rows(&mut tx, "data_block").await?,
            totals_removed: count_rows(&mut tx, "data_block_total").await?,
            trades_removed: count_rows(&mut tx, "data_trade").await?,
        };

        sqlx::query(&format!(
            "TRUNCATE {}, harvester_status CASCADE",
            PURGED_TABLES.join(", ")
        ))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        info!(tables = PURGED_TABLES.len(), "🧹 Harvester tables truncated");
        Ok(stats)
    }
}

async fn count_rows(conn: &mut PgConnection, table: &str) -> StorageResult<u64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(conn)
        .await
        .map_err(query_err)?;
    Ok(count as u64)
}

/// Tables emptied by [`Database::purge`].
const PURGED_TABLES: [&str; 17] = [
    "data_block",
    "data_account",
    "data_account_index",
    "data_democracy_proposal",
    "data_democracy_referendum",
    "data_council_motion",
    "data_council_vote",
    "data_techcomm_proposal",
    "data_techcomm_proposal_vote",
    "data_treasury_proposal",
    "data_session",
    "data_session_total",
    "data_contract",
    "data_market_history_1m",
    "data_market_history_5m",
    "data_market_history_1h",
    "data_market_history_1d",
];

/// Rows removed by a purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub blocks_removed: u64,
    pub totals_removed: u64,
    pub trades_removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_pool_fails_faster_than_harvester_pool() {
        let harvester = DatabaseConfig::for_harvester("postgres://localhost/h");
        let api = DatabaseConfig::for_api("postgres://localhost/h");
        assert!(api.acquire_timeout < harvester.acquire_timeout);
        assert!(harvester.max_connections >= 2);
        assert_eq!(api.url, harvester.url);
    }
}
