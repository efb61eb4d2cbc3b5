//! Processor bundle trait definition.

use std::sync::Arc;

use harvester_core::ports::{BlockProcessor, EventProcessor};

/// A self-contained bundle of processors for one runtime module.
///
/// Bundles provide a plugin-like architecture where each bundle can:
/// - Register the event processors for its module's events
/// - Register the block processors that fold its audits into entities
/// - Be independently developed and tested
///
/// # Example
///
/// ```ignore
/// pub struct MyBundle;
///
/// impl ProcessorBundle for MyBundle {
///     fn name(&self) -> &'static str { "my_module" }
///
///     fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
///         vec![Arc::new(MyEventProcessor)]
///     }
/// }
/// ```
pub trait ProcessorBundle: Send + Sync {
    /// Unique name identifying this bundle.
    ///
    /// Used for logging.
    fn name(&self) -> &'static str;

    /// Event processors provided by this bundle.
    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        Vec::new()
    }

    /// Block processors provided by this bundle, in run order.
    fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
        Vec::new()
    }

    /// Priority for block processor ordering (higher = earlier).
    ///
    /// Bundles whose sequencing hooks read state written by another bundle
    /// must use a lower priority. Default is 0.
    fn priority(&self) -> i32 {
        0
    }
}
