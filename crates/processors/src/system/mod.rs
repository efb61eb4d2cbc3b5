//! System bundle.
//!
//! Per-block bookkeeping that does not depend on any runtime module:
//!
//! - [`LogProcessor`] - decodes header digest items into `data_log` rows
//! - [`TotalsProcessor`] - chains the block's running totals to its parent

mod logs;
mod totals;

use std::sync::Arc;

use harvester_core::ports::BlockProcessor;

use crate::ProcessorBundle;

pub use logs::{LogProcessor, decode_log};
pub use totals::TotalsProcessor;

/// Processor bundle for block-level bookkeeping.
pub struct SystemBundle;

impl ProcessorBundle for SystemBundle {
    fn name(&self) -> &'static str {
        "system"
    }

    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        vec![Arc::new(LogProcessor), Arc::new(TotalsProcessor)]
    }

    fn priority(&self) -> i32 {
        // Totals are computed before any entity is touched
        100
    }
}
