//! Contracts bundle.
//!
//! # Indexed Events
//!
//! - `contract.CodeStored` - contract code row, bytecode from the
//!   `put_code` extrinsic

mod events;

use std::sync::Arc;

use harvester_core::ports::EventProcessor;

use crate::ProcessorBundle;

pub use events::CodeStoredProcessor;

/// Processor bundle for the Contracts module.
pub struct ContractsBundle;

impl ProcessorBundle for ContractsBundle {
    fn name(&self) -> &'static str {
        "contracts"
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        vec![Arc::new(CodeStoredProcessor)]
    }

    fn priority(&self) -> i32 {
        20
    }
}
