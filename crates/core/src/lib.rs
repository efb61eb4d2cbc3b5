//! Core domain layer for the block harvester.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! services of the harvester. It is the innermost layer and has no
//! dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     harvester (binary)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  harvester-api  │  harvester-processors  │ harvester-substrate│
//! │    (HTTP)       │   (event/block hooks)  │     (RPC)         │
//! ├─────────────────┴────────────────────────┴───────────────────┤
//! │                    harvester-storage                        │
//! │                 (PostgreSQL / in-memory)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   harvester-core  ← YOU ARE HERE            │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Block, BlockTotal, audits, entities, candles)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - The [`services::Harvester`] orchestrator and candle planning
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Two phases
//!
//! Every block goes through two transactions:
//!
//! 1. **Accumulation** (`add_block`) stores the block with its extrinsics and
//!    events, and lets each matching [`ports::EventProcessor`] write audit
//!    facts. Blocks may be accumulated in any order.
//! 2. **Sequencing** (`sequence_block`) runs every [`ports::BlockProcessor`]
//!    against the parent's snapshot, turning audits into entities and
//!    chaining [`models::BlockTotal`]. Blocks are sequenced strictly in id
//!    order.
//!
//! ## Ports
//!
//! - [`ports::ChainSource`] - Fetch decoded blocks and storage from the chain
//! - [`ports::AddressCodec`] - Render account ids and indices as addresses
//! - [`ports::FactStore`] / [`ports::FactTx`] - Persist and query facts

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
