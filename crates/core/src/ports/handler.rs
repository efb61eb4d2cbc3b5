//! Port traits for event and block processors.
//!
//! This is the main extensibility point for the harvester. An
//! [`EventProcessor`] turns one decoded event into audit facts during
//! accumulation; a [`BlockProcessor`] runs once per block in both phases.
//! Both are collected in a [`ProcessorRegistry`] built once at startup.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ChainResult, HarvesterResult};
use crate::models::{
    AuditLocator, Block, BlockTotal, ChainBlock, ChainEvent, ChainExtrinsic, Interval,
    SessionSnapshot,
};
use crate::ports::block_source::{AddressCodec, ChainSource};
use crate::ports::repository::FactTx;

// =============================================================================
// Contexts
// =============================================================================

/// `(module, event)` key an event processor is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    /// Lowercase module id.
    pub module: &'static str,
    pub event: &'static str,
}

impl EventKey {
    pub const fn new(module: &'static str, event: &'static str) -> Self {
        Self { module, event }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.event)
    }
}

/// Everything an event processor may read about its event.
pub struct EventContext<'a> {
    pub block: &'a ChainBlock,
    pub event: &'a ChainEvent,
    /// Extrinsic that emitted the event, if any.
    pub extrinsic: Option<&'a ChainExtrinsic>,
    /// Map validators to session keys via controller ledgers instead of
    /// `Session.QueuedKeys`.
    pub legacy_session_lookup: bool,
}

impl EventContext<'_> {
    pub fn locator(&self) -> AuditLocator {
        AuditLocator {
            block_id: self.block.number,
            event_idx: self.event.event_idx,
            extrinsic_idx: self.event.extrinsic_idx,
        }
    }

    /// Named argument of the enclosing extrinsic.
    pub fn call_param(&self, name: &str) -> Option<&serde_json::Value> {
        self.extrinsic.and_then(|x| x.param(name))
    }
}

/// Chain state read before the accumulation transaction opens.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Prefetched {
    #[default]
    Nothing,
    Session(SessionSnapshot),
    /// Referendum info merged with its preimage, if any.
    Referendum(Option<serde_json::Value>),
}

/// Block being accumulated, with the scratch state processors share.
#[derive(Debug, Clone)]
pub struct BlockAccumulation {
    pub block: Block,
    /// Raw digest items of the header.
    pub logs: Vec<Vec<u8>>,
    /// Bare hex ids seen in `NewAccount` events, with repeats.
    pub accounts_new: Vec<String>,
    /// Bare hex ids seen in `ReapedAccount` events, with repeats.
    pub accounts_reaped: Vec<String>,
}

impl BlockAccumulation {
    pub fn new(block: Block, logs: Vec<Vec<u8>>) -> Self {
        Self {
            block,
            logs,
            accounts_new: Vec::new(),
            accounts_reaped: Vec::new(),
        }
    }
}

/// Inputs and outputs of one sequencing pass.
///
/// `parent` and `parent_total` are snapshots; nothing writes through them.
pub struct SequencingContext<'a> {
    pub block: &'a Block,
    /// `None` for genesis.
    pub parent: Option<&'a Block>,
    /// The zero sentinel for genesis.
    pub parent_total: &'a BlockTotal,
    /// Filled in by the totals processor.
    pub total: Option<BlockTotal>,
    pub codec: &'a dyn AddressCodec,
    rolled: Vec<Interval>,
}

impl<'a> SequencingContext<'a> {
    pub fn new(
        block: &'a Block,
        parent: Option<&'a Block>,
        parent_total: &'a BlockTotal,
        codec: &'a dyn AddressCodec,
    ) -> Self {
        Self {
            block,
            parent,
            parent_total,
            total: None,
            codec,
            rolled: Vec::new(),
        }
    }

    /// Record that `interval` candles are up to date for this block.
    pub fn mark_rolled(&mut self, interval: Interval) {
        if !self.rolled.contains(&interval) {
            self.rolled.push(interval);
        }
    }

    pub fn has_rolled(&self, interval: Interval) -> bool {
        self.rolled.contains(&interval)
    }
}

// =============================================================================
// Processor Traits
// =============================================================================

/// Turns one `(module, event)` into audit facts.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    fn key(&self) -> EventKey;

    /// Expected attribute type names; `"_"` accepts any type.
    ///
    /// Events that do not match are skipped, never failed.
    fn shape(&self) -> &'static [&'static str];

    /// Read chain state needed by [`EventProcessor::accumulation_hook`].
    ///
    /// Runs before the accumulation transaction opens.
    async fn prefetch(
        &self,
        _ctx: &EventContext<'_>,
        _chain: &dyn ChainSource,
    ) -> ChainResult<Prefetched> {
        Ok(Prefetched::Nothing)
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        prefetched: &Prefetched,
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()>;

    /// Delete everything [`EventProcessor::accumulation_hook`] wrote for a block.
    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx)
    -> HarvesterResult<()>;
}

/// Per-block hooks for one cross-cutting concern.
#[async_trait]
pub trait BlockProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn accumulation_hook(
        &self,
        _acc: &mut BlockAccumulation,
        _tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        Ok(())
    }

    async fn accumulation_revert(
        &self,
        _block_id: u64,
        _tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        Ok(())
    }

    async fn sequencing_hook(
        &self,
        _ctx: &mut SequencingContext<'_>,
        _tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of event processors by key and block processors in run order.
pub struct ProcessorRegistry {
    events: HashMap<(String, String), Arc<dyn EventProcessor>>,
    blocks: Vec<Arc<dyn BlockProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            events: HashMap::new(),
            blocks: Vec::new(),
        }
    }

    /// Register an event processor. A later registration for the same key wins.
    pub fn register_event(&mut self, processor: Arc<dyn EventProcessor>) {
        let key = processor.key();
        self.events.insert(
            (key.module.to_lowercase(), key.event.to_string()),
            processor,
        );
    }

    /// Append a block processor. Hooks run in registration order.
    pub fn register_block(&mut self, processor: Arc<dyn BlockProcessor>) {
        self.blocks.push(processor);
    }

    /// Processor for an event; the module id is matched case-insensitively.
    pub fn event(&self, module_id: &str, event_id: &str) -> Option<&Arc<dyn EventProcessor>> {
        self.events
            .get(&(module_id.to_lowercase(), event_id.to_string()))
    }

    /// Block processors in run order.
    pub fn blocks(&self) -> &[Arc<dyn BlockProcessor>] {
        &self.blocks
    }

    /// All registered event keys as `module.event`, sorted.
    pub fn event_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .events
            .keys()
            .map(|(m, e)| format!("{m}.{e}"))
            .collect();
        keys.sort();
        keys
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(EventKey);

    #[async_trait]
    impl EventProcessor for Noop {
        fn key(&self) -> EventKey {
            self.0
        }
        fn shape(&self) -> &'static [&'static str] {
            &[]
        }
        async fn accumulation_hook(
            &self,
            _: &EventContext<'_>,
            _: &Prefetched,
            _: &mut BlockAccumulation,
            _: &mut dyn FactTx,
        ) -> HarvesterResult<()> {
            Ok(())
        }
        async fn accumulation_revert(&self, _: u64, _: &mut dyn FactTx) -> HarvesterResult<()> {
            Ok(())
        }
    }

    struct Named(&'static str);

    #[async_trait]
    impl BlockProcessor for Named {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    // Test critique: la recherche ignore la casse du module
    #[test]
    fn test_registry_lookup_is_case_insensitive_on_module() {
        let mut registry = ProcessorRegistry::new();
        registry.register_event(Arc::new(Noop(EventKey::new("balances", "NewAccount"))));

        assert!(registry.event("Balances", "NewAccount").is_some());
        assert!(registry.event("balances", "NewAccount").is_some());
        // L'identifiant d'événement reste sensible à la casse
        assert!(registry.event("balances", "newaccount").is_none());
        assert_eq!(registry.event_keys(), vec!["balances.NewAccount"]);
    }

    // Test critique: l'ordre d'enregistrement des block processors est conservé
    #[test]
    fn test_registry_keeps_block_order() {
        let mut registry = ProcessorRegistry::new();
        registry.register_block(Arc::new(Named("motions")));
        registry.register_block(Arc::new(Named("votes")));
        registry.register_block(Arc::new(Named("treasury")));

        let names: Vec<_> = registry.blocks().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["motions", "votes", "treasury"]);
    }
}
