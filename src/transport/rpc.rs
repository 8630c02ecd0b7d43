//! RPC-backed ledger transport

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSimulateTransactionConfig};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use super::errors::{RejectionReason, TransportError};
use super::{LedgerTransport, SimulationOutcome};

/// [`LedgerTransport`] over a node's JSON-RPC interface
pub struct RpcTransport {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcTransport {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig, request_timeout: Duration) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(url.into(), request_timeout, commitment);
        Self::from_client(Arc::new(client), commitment)
    }

    pub fn from_client(client: Arc<RpcClient>, commitment: CommitmentConfig) -> Self {
        Self {
            client,
            commitment,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    fn decode_wire(wire: &[u8]) -> Result<Transaction, TransportError> {
        bincode::deserialize(wire).map_err(TransportError::malformed)
    }
}

#[async_trait]
impl LedgerTransport for RpcTransport {
    async fn get_account(&self, address: &Pubkey) -> Result<Account, TransportError> {
        self.client
            .get_account_with_commitment(address, self.commitment)
            .await?
            .value
            .ok_or(TransportError::NotFound(*address))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, TransportError> {
        Ok(self
            .client
            .get_balance_with_commitment(address, self.commitment)
            .await?
            .value)
    }

    async fn get_minimum_balance_for_size(&self, size: usize) -> Result<u64, TransportError> {
        Ok(self.client.get_minimum_balance_for_rent_exemption(size).await?)
    }

    async fn submit_transaction(&self, wire: &[u8]) -> Result<Signature, TransportError> {
        let transaction = Self::decode_wire(wire)?;
        let signature = self.client.send_transaction(&transaction).await?;
        info!(%signature, "transaction submitted");
        Ok(signature)
    }

    async fn confirm_transaction(&self, signature: &Signature) -> Result<(), TransportError> {
        let started = Instant::now();
        loop {
            match self
                .client
                .get_signature_status_with_commitment(signature, self.commitment)
                .await?
            {
                Some(Ok(())) => {
                    info!(%signature, elapsed_ms = started.elapsed().as_millis() as u64, "transaction confirmed");
                    return Ok(());
                }
                Some(Err(err)) => {
                    warn!(%signature, error = %err, "transaction failed on ledger");
                    return Err(TransportError::Rejected(RejectionReason::from_transaction_error(&err)));
                }
                None => {}
            }

            if started.elapsed() >= self.confirm_timeout {
                return Err(TransportError::TimedOut {
                    signature: *signature,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            debug!(%signature, "awaiting confirmation");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn simulate_transaction(&self, wire: &[u8]) -> Result<SimulationOutcome, TransportError> {
        let transaction = Self::decode_wire(wire)?;
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            commitment: Some(self.commitment),
            ..RpcSimulateTransactionConfig::default()
        };
        let result = self
            .client
            .simulate_transaction_with_config(&transaction, config)
            .await?
            .value;

        Ok(SimulationOutcome {
            success: result.err.is_none(),
            error: result
                .err
                .as_ref()
                .map(|err| RejectionReason::from_message(&format!("{err:?}"))),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, TransportError> {
        let (blockhash, _last_valid_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await?;
        Ok(blockhash)
    }
}
