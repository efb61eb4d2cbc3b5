//! Balances bundle.
//!
//! Tracks account creation and reaping.
//!
//! # Indexed Events
//!
//! - `balances.NewAccount` - account audit NEW
//! - `balances.ReapedAccount` - account audit REAPED, plus an account index
//!   audit REAPED so the account's indices become reclaimable
//!
//! # Entities
//!
//! - `data_account` - folded by [`AccountProcessor`]

mod accounts;
mod events;
pub mod models;

use std::sync::Arc;

use harvester_core::ports::{BlockProcessor, EventProcessor};

use crate::ProcessorBundle;

pub use accounts::AccountProcessor;
pub use events::{NewAccountProcessor, ReapedAccountProcessor};
pub use models::NewAccountData;

/// Processor bundle for the Balances module.
pub struct BalancesBundle;

impl ProcessorBundle for BalancesBundle {
    fn name(&self) -> &'static str {
        "balances"
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        vec![Arc::new(NewAccountProcessor), Arc::new(ReapedAccountProcessor)]
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        vec![Arc::new(AccountProcessor)]
    }

    fn priority(&self) -> i32 {
        // Accounts exist before indices point at them
        90
    }
}
