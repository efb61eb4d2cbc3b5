//! Session bundle.
//!
//! Materialises the validator set at every session rotation and closes the
//! previous session once the rotation block is sequenced.
//!
//! # Indexed Events
//!
//! - `session.NewSession` - session, validator and nominator rows
//!
//! Staking state is read at the rotation block before accumulation begins.
//! With `legacy_session_lookup` set, validators are treated as controllers
//! and session keys come from `Session.NextKeyFor`; otherwise they are
//! stashes mapped through `Session.QueuedKeys`.

mod events;
mod snapshot;
mod totals;

use std::sync::Arc;

use harvester_core::ports::{BlockProcessor, EventProcessor};

use crate::ProcessorBundle;

pub use events::NewSessionProcessor;
pub use snapshot::read_session_snapshot;
pub use totals::SessionProcessor;

/// Processor bundle for the Session and Staking modules.
pub struct SessionBundle;

impl ProcessorBundle for SessionBundle {
    fn name(&self) -> &'static str {
        "session"
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        vec![Arc::new(NewSessionProcessor)]
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        vec![Arc::new(SessionProcessor)]
    }

    fn priority(&self) -> i32 {
        30
    }
}
