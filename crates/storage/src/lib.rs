//! Storage layer for the block harvester.
//!
//! This crate provides two implementations of the fact store ports defined
//! in `harvester-core`:
//!
//! - [`postgres`] - PostgreSQL, with connection pooling and migrations
//! - [`memory`] - In-memory, for tests and throwaway runs
//!
//! # Usage
//!
//! ```ignore
//! use harvester_storage::{Database, DatabaseConfig, PgFactStore};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_harvester(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! let store = Arc::new(PgFactStore::new(Arc::new(db)));
//! ```

pub mod memory;
pub mod postgres;

pub use memory::{MemoryState, MemoryStore};
pub use postgres::{Database, DatabaseConfig, PgFactStore, PgTx, PurgeStats};
