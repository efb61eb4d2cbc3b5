//! Bundle registry for managing processor bundles.

use std::cmp::Reverse;

use tracing::{debug, info, warn};

use harvester_core::models::{Collective, Interval};
use harvester_core::ports::ProcessorRegistry;

use crate::bundle::ProcessorBundle;
use crate::{
    BalancesBundle, CollectiveBundle, ContractsBundle, DemocracyBundle, IndicesBundle,
    MarketBundle, SessionBundle, SystemBundle, TreasuryBundle,
};

/// Registry for managing processor bundles.
///
/// The registry handles:
/// - Bundle registration with priority ordering
/// - Processor extraction for the harvester
///
/// # Example
///
/// ```ignore
/// let mut registry = BundleRegistry::new();
///
/// // Register bundles (order doesn't matter - priority determines run order)
/// registry.register(Box::new(SystemBundle));
/// registry.register(Box::new(MarketBundle::new(&Interval::ALL)));
///
/// // Convert to ProcessorRegistry for the harvester
/// let processors = registry.into_processor_registry();
/// ```
pub struct BundleRegistry {
    bundles: Vec<Box<dyn ProcessorBundle>>,
}

impl BundleRegistry {
    /// Create a new empty bundle registry.
    pub fn new() -> Self {
        Self {
            bundles: Vec::new(),
        }
    }

    /// Every bundle this crate ships, in their standard priorities.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SystemBundle));
        registry.register(Box::new(BalancesBundle));
        registry.register(Box::new(IndicesBundle));
        registry.register(Box::new(DemocracyBundle));
        registry.register(Box::new(CollectiveBundle::new(Collective::Council)));
        registry.register(Box::new(CollectiveBundle::new(
            Collective::TechnicalCommittee,
        )));
        registry.register(Box::new(TreasuryBundle));
        registry.register(Box::new(SessionBundle));
        registry.register(Box::new(ContractsBundle));
        registry.register(Box::new(MarketBundle::new(&Interval::ALL)));
        registry
    }

    /// Register a processor bundle.
    pub fn register(&mut self, bundle: Box<dyn ProcessorBundle>) {
        info!(bundle = bundle.name(), "📦 Registering processor bundle");
        self.bundles.push(bundle);
    }

    /// Convert this registry into a ProcessorRegistry.
    ///
    /// Block processors are appended bundle by bundle, higher priority
    /// first; bundles of equal priority keep their registration order.
    /// The BundleRegistry is consumed.
    pub fn into_processor_registry(self) -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();

        let mut sorted = self.bundles;
        sorted.sort_by_key(|b| Reverse(b.priority()));

        for bundle in sorted {
            let events = bundle.event_processors();
            let blocks = bundle.block_processors();
            debug!(
                bundle = bundle.name(),
                events = events.len(),
                blocks = blocks.len(),
                "Extracting processors"
            );

            for processor in events {
                let key = processor.key();
                if registry.event(key.module, key.event).is_some() {
                    warn!(bundle = bundle.name(), key = %key, "⚠️  Event processor overridden");
                }
                registry.register_event(processor);
            }
            for processor in blocks {
                registry.register_block(processor);
            }
        }

        registry
    }

    /// Get the names of all registered bundles.
    pub fn bundle_names(&self) -> Vec<&'static str> {
        self.bundles.iter().map(|b| b.name()).collect()
    }

    /// Get the number of registered bundles.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Check if no bundles are registered.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

impl Default for BundleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use harvester_core::ports::BlockProcessor;

    struct Named(&'static str);

    #[async_trait]
    impl BlockProcessor for Named {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    struct MockBundle {
        name: &'static str,
        priority: i32,
        blocks: Vec<&'static str>,
    }

    impl ProcessorBundle for MockBundle {
        fn name(&self) -> &'static str {
            self.name
        }
        fn block_processors(&self) -> Vec<Arc<dyn BlockProcessor>> {
            self.blocks
                .iter()
                .map(|n| Arc::new(Named(n)) as Arc<dyn BlockProcessor>)
                .collect()
        }
        fn priority(&self) -> i32 {
            self.priority
        }
    }

    // Test critique: les block processors sont extraits dans l'ordre de priorité des bundles
    #[test]
    fn test_bundle_priority_orders_block_processors() {
        let mut registry = BundleRegistry::new();
        registry.register(Box::new(MockBundle {
            name: "low_priority",
            priority: 0,
            blocks: vec!["market_1m"],
        }));
        registry.register(Box::new(MockBundle {
            name: "high_priority",
            priority: 100,
            blocks: vec!["totals", "logs"],
        }));
        assert_eq!(registry.bundle_names(), vec!["low_priority", "high_priority"]);

        let processors = registry.into_processor_registry();
        let names: Vec<_> = processors.blocks().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["totals", "logs", "market_1m"]);
    }

    // Test critique: l'ordre intra-bloc fixé (motions avant votes, 1m avant 5m...)
    #[test]
    fn test_standard_block_order() {
        let registry = BundleRegistry::standard();
        assert_eq!(registry.len(), 10);

        let processors = registry.into_processor_registry();
        let names: Vec<_> = processors.blocks().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "logs",
                "totals",
                "accounts",
                "account_index",
                "democracy_proposal",
                "democracy_referendum",
                "council_motion",
                "council_vote",
                "technicalcommittee_motion",
                "technicalcommittee_vote",
                "treasury_proposal",
                "session",
                "market_history_1m",
                "market_history_5m",
                "market_history_1h",
                "market_history_1d",
            ]
        );
    }

    #[test]
    fn test_standard_event_keys() {
        let processors = BundleRegistry::standard().into_processor_registry();
        let keys = processors.event_keys();

        for expected in [
            "balances.NewAccount",
            "balances.ReapedAccount",
            "indices.NewAccountIndex",
            "democracy.Started",
            "council.Voted",
            "technicalcommittee.Executed",
            "treasury.Rejected",
            "session.NewSession",
            "contract.CodeStored",
            "trademodule.TradeCreated",
        ] {
            assert!(keys.contains(&expected.to_string()), "missing {expected}");
        }
        assert_eq!(keys.len(), 26);
    }
}
