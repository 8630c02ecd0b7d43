//! solana-txkit
//!
//! Typed account layouts, deterministic address derivation and transaction
//! assembly for Solana, with an escrow protocol and M-of-N token
//! authorities on top.
//!
//! Layers, leaves first:
//!
//! - [`codec`]: fixed binary schemas for account state
//! - [`address`]: seeded and program-derived addresses
//! - [`instruction`]: instructions and payload enums
//! - [`tx_builder`]: the transaction assembler and durable-nonce planning
//! - [`transport`]: the ledger interface and its RPC implementation
//! - [`client`]: the explicit context every operation runs in
//! - [`nonce`], [`token`], [`escrow`], [`multisig`], [`programs`]: flows

#![warn(unused_must_use)]

pub mod address;
pub mod client;
pub mod codec;
pub mod compat;
pub mod config;
pub mod errors;
pub mod escrow;
pub mod instruction;
pub mod multisig;
pub mod nonce;
pub mod programs;
pub mod structured_logging;
pub mod test_utils;
pub mod token;
pub mod transport;
pub mod tx_builder;
pub mod wallet;

pub use client::ClientContext;
pub use errors::{ProtocolError, Result};
