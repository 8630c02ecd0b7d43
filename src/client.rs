//! Client context
//!
//! Every protocol operation receives a [`ClientContext`] explicitly: the
//! transport handle, the active fee payer and the flow's correlation id.
//! There is no process-wide connection or payer.

use std::sync::Arc;
use std::time::Instant;

use solana_sdk::{
    account::Account,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tracing::debug;

use crate::codec::AccountRecord;
use crate::errors::{ProtocolError, Result};
use crate::structured_logging::{FlowContext, FlowLogger};
use crate::transport::{
    retry_with_backoff, ExponentialBackoff, LedgerTransport, RejectionReason, SimulationOutcome, TransportError,
};
use crate::tx_builder::{FreshnessAnchor, SignedTransaction, TransactionAssembler};

#[derive(Clone)]
pub struct ClientContext {
    transport: Arc<dyn LedgerTransport>,
    payer: Arc<Keypair>,
    flow: FlowContext,
    backoff: ExponentialBackoff,
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("payer", &self.payer.pubkey())
            .field("request_id", &self.flow.request_id)
            .field("operation", &self.flow.operation)
            .finish()
    }
}

impl ClientContext {
    pub fn new(transport: Arc<dyn LedgerTransport>, payer: Arc<Keypair>) -> Self {
        Self {
            transport,
            payer,
            flow: FlowContext::new("client"),
            backoff: ExponentialBackoff::default(),
        }
    }

    /// Retry policy for read calls
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Same transport, different fee payer
    pub fn with_payer(&self, payer: Arc<Keypair>) -> Self {
        Self {
            payer,
            flow: self.flow.child("client"),
            ..self.clone()
        }
    }

    /// Child context for a named flow
    pub fn for_operation(&self, operation: &str) -> Self {
        Self {
            flow: self.flow.child(operation),
            ..self.clone()
        }
    }

    pub fn transport(&self) -> &dyn LedgerTransport {
        self.transport.as_ref()
    }

    pub fn payer(&self) -> &Keypair {
        &self.payer
    }

    pub fn payer_pubkey(&self) -> Pubkey {
        self.payer.pubkey()
    }

    pub fn logger(&self) -> &FlowLogger {
        &self.flow.logger
    }

    pub fn flow(&self) -> &FlowContext {
        &self.flow
    }

    pub async fn fetch_account(&self, address: &Pubkey) -> Result<Account> {
        let transport = self.transport.clone();
        let address = *address;
        let account = retry_with_backoff("get_account", self.backoff.clone(), move || {
            let transport = transport.clone();
            async move { transport.get_account(&address).await }
        })
        .await?;
        Ok(account)
    }

    /// Fetch and decode a typed account record
    pub async fn fetch_record<R: AccountRecord>(&self, address: &Pubkey) -> Result<R> {
        let transport = self.transport.clone();
        let target = *address;
        let bytes = retry_with_backoff("get_account_bytes", self.backoff.clone(), move || {
            let transport = transport.clone();
            async move { transport.get_account_bytes(&target).await }
        })
        .await?;
        debug!(address = %address, len = bytes.len(), schema = R::SCHEMA.name(), "decoding account");
        Ok(R::unpack(&bytes)?)
    }

    pub async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        match self.fetch_account(address).await {
            Ok(_) => Ok(true),
            Err(ProtocolError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn rent_exempt_balance(&self, size: usize) -> Result<u64> {
        let transport = self.transport.clone();
        let lamports = retry_with_backoff("get_minimum_balance", self.backoff.clone(), move || {
            let transport = transport.clone();
            async move { transport.get_minimum_balance_for_size(size).await }
        })
        .await?;
        Ok(lamports)
    }

    pub async fn balance(&self, address: &Pubkey) -> Result<u64> {
        let transport = self.transport.clone();
        let address = *address;
        let lamports = retry_with_backoff("get_balance", self.backoff.clone(), move || {
            let transport = transport.clone();
            async move { transport.get_balance(&address).await }
        })
        .await?;
        Ok(lamports)
    }

    /// Fail early when the fee payer cannot cover `required` lamports
    pub async fn ensure_funded(&self, required: u64) -> Result<u64> {
        let available = self.balance(&self.payer_pubkey()).await?;
        if available < required {
            return Err(ProtocolError::InsufficientFunds { required, available });
        }
        Ok(available)
    }

    /// Check that `program_id` names a deployed, executable program
    pub async fn check_program(&self, program_id: &Pubkey) -> Result<()> {
        let account = match self.fetch_account(program_id).await {
            Ok(account) => account,
            Err(ProtocolError::NotFound(_)) => {
                return Err(ProtocolError::configuration(format!("program {program_id} is not deployed")))
            }
            Err(err) => return Err(err),
        };
        if !account.executable {
            return Err(ProtocolError::configuration(format!(
                "account {program_id} is not an executable program"
            )));
        }
        Ok(())
    }

    pub async fn latest_anchor(&self) -> Result<FreshnessAnchor> {
        let transport = self.transport.clone();
        let blockhash = retry_with_backoff("get_latest_blockhash", self.backoff.clone(), move || {
            let transport = transport.clone();
            async move { transport.get_latest_blockhash().await }
        })
        .await?;
        Ok(FreshnessAnchor::RecentBlockhash(blockhash))
    }

    /// Assembler paid by this context's payer, anchored on a fresh blockhash
    pub async fn assembler(&self) -> Result<TransactionAssembler> {
        let anchor = self.latest_anchor().await?;
        Ok(TransactionAssembler::with_anchor(self.payer_pubkey(), anchor))
    }

    /// Finalize and broadcast; marks the assembler submitted on success
    pub async fn submit(&self, operation: &str, assembler: &mut TransactionAssembler) -> Result<Signature> {
        let signed = assembler.finalize()?;
        let signature = match self.transport.submit_transaction(&signed.wire).await {
            Ok(signature) => signature,
            Err(err) => return Err(self.classify_failure(operation, err, &signed, true)),
        };
        assembler.mark_submitted()?;
        self.logger().log_submission(
            operation,
            &signature.to_string(),
            signed.transaction.message.instructions.len(),
            signed.is_durable(),
        );
        Ok(signature)
    }

    pub async fn submit_and_confirm(&self, operation: &str, assembler: &mut TransactionAssembler) -> Result<Signature> {
        let started = Instant::now();
        let signed = assembler.finalize()?;
        let signature = self.submit(operation, assembler).await?;
        if let Err(err) = self.transport.confirm_transaction(&signature).await {
            return Err(self.classify_failure(operation, err, &signed, false));
        }
        self.logger()
            .log_confirmed(operation, &signature.to_string(), started.elapsed().as_millis() as u64);
        Ok(signature)
    }

    /// Build, sign with the payer plus `signers`, submit and confirm
    pub async fn send_instructions(
        &self,
        operation: &str,
        instructions: Vec<Instruction>,
        signers: &[&dyn Signer],
    ) -> Result<Signature> {
        let mut assembler = self.assembler().await?;
        assembler.add_many(instructions)?;
        assembler.sign(self.payer.as_ref())?;
        assembler.sign_all(signers)?;
        self.submit_and_confirm(operation, &mut assembler).await
    }

    /// Dry run without consuming a durable nonce
    pub async fn simulate(&self, operation: &str, assembler: &TransactionAssembler) -> Result<SimulationOutcome> {
        let blockhash = self.latest_anchor().await?.blockhash();
        let transaction = assembler.simulation_transaction(blockhash)?;
        let wire = bincode::serialize(&transaction)
            .map_err(|e| ProtocolError::Transport(TransportError::malformed(e)))?;
        let outcome = self.transport.simulate_transaction(&wire).await?;
        self.logger()
            .log_simulation(operation, outcome.success, outcome.units_consumed);
        Ok(outcome)
    }

    pub async fn simulate_instructions(&self, operation: &str, instructions: Vec<Instruction>) -> Result<SimulationOutcome> {
        let mut assembler = TransactionAssembler::new(self.payer_pubkey());
        assembler.add_many(instructions)?;
        self.simulate(operation, &assembler).await
    }

    fn classify_failure(
        &self,
        operation: &str,
        err: TransportError,
        signed: &SignedTransaction,
        during_submit: bool,
    ) -> ProtocolError {
        let classified = classify_transport_error(err, signed, during_submit);
        self.logger()
            .log_rejected(operation, classified.category(), &classified.to_string());
        classified
    }
}

/// Map a transport failure for `signed` into a protocol outcome
///
/// - a missing required signature becomes `Authorization`
/// - in durable mode, an unknown anchor, an already processed message or a
///   failing advance-nonce instruction becomes `StaleNonce`
/// - a connection failure while submitting is `Ambiguous`
pub fn classify_transport_error(err: TransportError, signed: &SignedTransaction, during_submit: bool) -> ProtocolError {
    if let (TransportError::Rejected(reason), Some(nonce)) = (&err, signed.durable_nonce.as_ref()) {
        let stale = match reason {
            RejectionReason::BlockhashNotFound | RejectionReason::AlreadyProcessed => true,
            RejectionReason::InstructionFailed { instruction, .. } => *instruction == 0,
            _ => false,
        };
        if stale {
            return ProtocolError::StaleNonce {
                nonce_account: nonce.nonce_account,
            };
        }
    }
    match err {
        TransportError::Network(detail) if during_submit => ProtocolError::Ambiguous(detail),
        other => ProtocolError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{hash::Hash, instruction::AccountMeta};

    fn signed(durable: bool) -> SignedTransaction {
        let payer = Keypair::new();
        let anchor = if durable {
            FreshnessAnchor::durable(Pubkey::new_unique(), payer.pubkey(), Hash::new_unique())
        } else {
            FreshnessAnchor::RecentBlockhash(Hash::new_unique())
        };
        let mut assembler = TransactionAssembler::with_anchor(payer.pubkey(), anchor);
        assembler
            .add(Instruction::new_with_bytes(
                Pubkey::new_unique(),
                &[0],
                vec![AccountMeta::new(Pubkey::new_unique(), false)],
            ))
            .unwrap();
        assembler.sign(&payer).unwrap();
        assembler.finalize().unwrap()
    }

    #[test]
    fn test_durable_blockhash_rejection_is_stale_nonce() {
        let tx = signed(true);
        let nonce_account = tx.durable_nonce.unwrap().nonce_account;
        let err = classify_transport_error(TransportError::Rejected(RejectionReason::BlockhashNotFound), &tx, true);
        assert_eq!(err, ProtocolError::StaleNonce { nonce_account });

        let err = classify_transport_error(
            TransportError::Rejected(RejectionReason::InstructionFailed {
                instruction: 0,
                detail: "invalid account data".into(),
            }),
            &tx,
            false,
        );
        assert!(matches!(err, ProtocolError::StaleNonce { .. }));
    }

    #[test]
    fn test_durable_duplicate_is_stale_nonce() {
        let tx = signed(true);
        let err = classify_transport_error(TransportError::Rejected(RejectionReason::AlreadyProcessed), &tx, true);
        assert!(matches!(err, ProtocolError::StaleNonce { .. }));

        let err = classify_transport_error(
            TransportError::Rejected(RejectionReason::AlreadyProcessed),
            &signed(false),
            true,
        );
        assert_eq!(err, ProtocolError::Rejected(RejectionReason::AlreadyProcessed));
    }

    #[test]
    fn test_blockhash_rejection_without_nonce_is_rejected() {
        let err = classify_transport_error(
            TransportError::Rejected(RejectionReason::BlockhashNotFound),
            &signed(false),
            true,
        );
        assert_eq!(err, ProtocolError::Rejected(RejectionReason::BlockhashNotFound));
    }

    #[test]
    fn test_missing_signature_is_authorization() {
        let err = classify_transport_error(
            TransportError::Rejected(RejectionReason::MissingRequiredSignature { instruction: 1 }),
            &signed(true),
            true,
        );
        assert!(matches!(err, ProtocolError::Authorization { .. }));
    }

    #[test]
    fn test_network_failure_during_submit_is_ambiguous() {
        let err = classify_transport_error(TransportError::Network("reset".into()), &signed(false), true);
        assert_eq!(err, ProtocolError::Ambiguous("reset".into()));

        let err = classify_transport_error(TransportError::Network("reset".into()), &signed(false), false);
        assert!(matches!(err, ProtocolError::Transport(_)));
    }
}
