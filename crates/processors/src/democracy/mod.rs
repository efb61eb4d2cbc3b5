//! Democracy bundle.
//!
//! Public proposals and referenda.
//!
//! # Indexed Events
//!
//! - `democracy.Proposed`, `democracy.Tabled` - proposal audits
//! - `democracy.Started`, `Passed`, `NotPassed`, `Cancelled`, `Executed` -
//!   referendum audits
//!
//! `Started` reads the referendum info and its preimage from chain state
//! before the accumulation transaction opens.

mod events;
mod proposals;
mod referenda;
pub mod models;

use std::sync::Arc;

use harvester_core::ports::{BlockProcessor, EventProcessor};

use crate::ProcessorBundle;

pub use events::{
    ProposedProcessor, ReferendumOutcomeProcessor, ReferendumStartedProcessor, TabledProcessor,
};
pub use proposals::DemocracyProposalProcessor;
pub use referenda::DemocracyReferendumProcessor;

/// Processor bundle for the Democracy module.
pub struct DemocracyBundle;

impl ProcessorBundle for DemocracyBundle {
    fn name(&self) -> &'static str {
        "democracy"
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        vec![
            Arc::new(ProposedProcessor),
            Arc::new(TabledProcessor),
            Arc::new(ReferendumStartedProcessor),
            Arc::new(ReferendumOutcomeProcessor::passed()),
            Arc::new(ReferendumOutcomeProcessor::not_passed()),
            Arc::new(ReferendumOutcomeProcessor::cancelled()),
            Arc::new(ReferendumOutcomeProcessor::executed()),
        ]
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        vec![
            Arc::new(DemocracyProposalProcessor),
            Arc::new(DemocracyReferendumProcessor),
        ]
    }

    fn priority(&self) -> i32 {
        70
    }
}
