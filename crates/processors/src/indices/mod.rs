//! Indices bundle.
//!
//! Tracks short account indices.
//!
//! # Indexed Events
//!
//! - `indices.NewAccountIndex` - account index audit NEW
//!
//! Index REAPED audits come from `balances.ReapedAccount`.
//!
//! # Entities
//!
//! - `data_account_index` - folded by [`AccountIndexProcessor`]

mod events;
mod index;
pub mod models;

use std::sync::Arc;

use harvester_core::ports::{BlockProcessor, EventProcessor};

use crate::ProcessorBundle;

pub use events::NewAccountIndexProcessor;
pub use index::AccountIndexProcessor;
pub use models::AccountIndexData;

/// Processor bundle for the Indices module.
pub struct IndicesBundle;

impl ProcessorBundle for IndicesBundle {
    fn name(&self) -> &'static str {
        "indices"
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        vec![Arc::new(NewAccountIndexProcessor)]
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        vec![Arc::new(AccountIndexProcessor)]
    }

    fn priority(&self) -> i32 {
        80
    }
}
