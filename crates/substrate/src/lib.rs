//! Substrate RPC adapter for the block harvester.
//!
//! This crate implements the [`ChainSource`] and [`AddressCodec`] ports from
//! `harvester-core`, providing connectivity to Substrate-based blockchains
//! via WebSocket RPC.
//!
//! # Features
//!
//! - Block lookup by number and by hash
//! - Dynamic metadata decoding using subxt
//! - SCALE to JSON conversion for events, call arguments and storage
//! - Compact timestamp extraction from `Timestamp.set` inherent
//! - SS58 rendering of account ids and account indices
//!
//! # Usage
//!
//! ```ignore
//! use harvester_substrate::{Ss58Codec, SubstrateClient, SubstrateClientConfig};
//!
//! let config = SubstrateClientConfig {
//!     ws_url: "ws://localhost:9944".to_string(),
//! };
//!
//! let client = SubstrateClient::connect(config).await?;
//! let head = client.finalized_head().await?;
//! let block = client.fetch_block(&head.hash).await?;
//! ```
//!
//! [`ChainSource`]: harvester_core::ports::ChainSource
//! [`AddressCodec`]: harvester_core::ports::AddressCodec

mod client;
mod decode;
mod ss58;

pub use client::{SubstrateClient, SubstrateClientConfig};
pub use decode::normalize_type_name;
pub use ss58::Ss58Codec;
