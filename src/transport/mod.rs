//! Ledger transport
//!
//! The protocol layer reaches the ledger only through [`LedgerTransport`].
//! [`rpc::RpcTransport`] talks to a real node; the in-memory ledger in
//! `test_utils` implements the same trait for tests.

pub mod backoff;
pub mod errors;
pub mod rpc;

use async_trait::async_trait;
use solana_sdk::{account::Account, hash::Hash, pubkey::Pubkey, signature::Signature};

pub use backoff::{retry_with_backoff, ExponentialBackoff, Retryable};
pub use errors::{RejectionReason, TransportError};
pub use rpc::RpcTransport;

/// Result of a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub success: bool,
    pub error: Option<RejectionReason>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

/// Operations the protocol layer needs from a ledger node
///
/// Calls are awaited one at a time by a flow; implementations must be
/// shareable across tasks.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Full account record; `TransportError::NotFound` if it does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Account, TransportError>;

    async fn get_account_bytes(&self, address: &Pubkey) -> Result<Vec<u8>, TransportError> {
        Ok(self.get_account(address).await?.data)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, TransportError>;

    /// Lamports needed to keep an account of `size` bytes rent exempt
    async fn get_minimum_balance_for_size(&self, size: usize) -> Result<u64, TransportError>;

    /// Submit bincode-encoded transaction bytes
    async fn submit_transaction(&self, wire: &[u8]) -> Result<Signature, TransportError>;

    async fn confirm_transaction(&self, signature: &Signature) -> Result<(), TransportError>;

    /// Dry-run bincode-encoded transaction bytes without signature checks
    async fn simulate_transaction(&self, wire: &[u8]) -> Result<SimulationOutcome, TransportError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, TransportError>;
}
