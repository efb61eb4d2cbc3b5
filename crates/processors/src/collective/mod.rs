//! Collective bundle.
//!
//! One bundle per collective. The council and the technical committee emit
//! the same events under their own module ids and fold into their own
//! motion and vote tables.
//!
//! # Indexed Events
//!
//! - `<module>.Proposed`, `Approved`, `Disapproved`, `Executed` - motion audits
//! - `<module>.Voted` - vote audits
//!
//! Motions follow `Proposed -> {Approved, Disapproved}`, `Approved -> Executed`.
//! Audits that would leave a terminal state are logged and skipped.

mod events;
mod motions;
mod votes;
pub mod models;

use std::sync::Arc;

use harvester_core::models::{AuditKind, Collective};
use harvester_core::ports::{BlockProcessor, EventProcessor};

use crate::ProcessorBundle;

pub use events::{MotionOutcomeProcessor, MotionProposedProcessor, VotedProcessor};
pub use motions::MotionProcessor;
pub use votes::MotionVoteProcessor;

/// Processor bundle for one collective.
pub struct CollectiveBundle {
    collective: Collective,
}

impl CollectiveBundle {
    pub fn new(collective: Collective) -> Self {
        Self { collective }
    }
}

impl ProcessorBundle for CollectiveBundle {
    fn name(&self) -> &'static str {
        self.collective.module_id()
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        let c = self.collective;
        vec![
            Arc::new(MotionProposedProcessor::new(c)),
            Arc::new(MotionOutcomeProcessor::approved(c)),
            Arc::new(MotionOutcomeProcessor::disapproved(c)),
            Arc::new(MotionOutcomeProcessor::executed(c)),
            Arc::new(VotedProcessor::new(c)),
        ]
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        // Votes update motion counters, so motions fold first
        vec![
            Arc::new(MotionProcessor::new(self.collective)),
            Arc::new(MotionVoteProcessor::new(self.collective)),
        ]
    }

    fn priority(&self) -> i32 {
        match self.collective {
            Collective::Council => 60,
            Collective::TechnicalCommittee => 50,
        }
    }
}

fn motion_kind(collective: Collective) -> AuditKind {
    match collective {
        Collective::Council => AuditKind::CouncilMotion,
        Collective::TechnicalCommittee => AuditKind::TechCommMotion,
    }
}

fn vote_kind(collective: Collective) -> AuditKind {
    match collective {
        Collective::Council => AuditKind::CouncilVote,
        Collective::TechnicalCommittee => AuditKind::TechCommVote,
    }
}
