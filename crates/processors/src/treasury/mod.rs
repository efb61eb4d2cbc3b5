//! Treasury bundle.
//!
//! # Indexed Events
//!
//! - `treasury.Proposed` - proposer and value read from the extrinsic
//! - `treasury.Awarded`, `treasury.Rejected` - close an open proposal

mod events;
mod proposals;
pub mod models;

use std::sync::Arc;

use harvester_core::ports::{BlockProcessor, EventProcessor};

use crate::ProcessorBundle;

pub use events::{AwardedProcessor, RejectedProcessor, TreasuryProposedProcessor};
pub use proposals::TreasuryProposalProcessor;

/// Processor bundle for the Treasury module.
pub struct TreasuryBundle;

impl ProcessorBundle for TreasuryBundle {
    fn name(&self) -> &'static str {
        "treasury"
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        vec![
            Arc::new(TreasuryProposedProcessor),
            Arc::new(AwardedProcessor),
            Arc::new(RejectedProcessor),
        ]
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        vec![Arc::new(TreasuryProposalProcessor)]
    }

    fn priority(&self) -> i32 {
        40
    }
}
