//! Harvester Processors - runtime module processors for the block harvester.
//!
//! This crate provides the event and block processors that turn decoded
//! blocks into audit facts and fold those facts into derived entities.
//!
//! # Architecture
//!
//! Processors are organized into **bundles**, one per runtime module:
//!
//! - **System**: header digest logs and the per-block running totals
//! - **Balances**: account creation and reaping
//! - **Indices**: short account indices
//! - **Democracy**: public proposals and referenda
//! - **Collective**: council and technical committee motions and votes
//! - **Treasury**: spend proposals
//! - **Session**: validator sets at session rotations
//! - **Contracts**: stored contract code
//! - **Market**: DEX trades and their candles
//!
//! # Usage
//!
//! ```ignore
//! use harvester_processors::BundleRegistry;
//!
//! let registry = BundleRegistry::standard().into_processor_registry();
//! let harvester = Harvester::new(config, chain, store, Arc::new(registry), codec);
//! ```
//!
//! # Run Order
//!
//! Block processors run bundle by bundle in descending priority. Totals
//! come first, accounts before indices, motions before their votes and
//! each candle resolution after the one it is built from.

mod bundle;
mod registry;
pub mod utils;

pub mod balances;
pub mod collective;
pub mod contracts;
pub mod democracy;
pub mod indices;
pub mod market;
pub mod session;
pub mod system;
pub mod treasury;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod testing;

pub use bundle::ProcessorBundle;
pub use registry::BundleRegistry;

pub use balances::BalancesBundle;
pub use collective::CollectiveBundle;
pub use contracts::ContractsBundle;
pub use democracy::DemocracyBundle;
pub use indices::IndicesBundle;
pub use market::MarketBundle;
pub use session::SessionBundle;
pub use system::SystemBundle;
pub use treasury::TreasuryBundle;
