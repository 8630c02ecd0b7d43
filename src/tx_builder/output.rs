//! Finalized transaction output

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};

use super::context::DurableNonceAnchor;
use super::errors::AssemblerError;
use crate::compat;

/// A fully signed transaction ready for broadcast
///
/// `wire` is the bincode encoding of the legacy transaction, exactly what
/// the ledger node receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub wire: Vec<u8>,
    /// Required signers in signature-slot order, fee payer first
    pub required_signers: Vec<Pubkey>,
    /// Nonce consumed by this transaction, if durable
    pub durable_nonce: Option<DurableNonceAnchor>,
}

impl SignedTransaction {
    pub fn new(
        transaction: Transaction,
        durable_nonce: Option<DurableNonceAnchor>,
    ) -> Result<Self, AssemblerError> {
        let wire = bincode::serialize(&transaction).map_err(AssemblerError::serialization)?;
        let required_signers = compat::required_signers(&transaction.message).to_vec();
        Ok(Self {
            transaction,
            wire,
            required_signers,
            durable_nonce,
        })
    }

    /// Transaction id: the fee payer's signature
    pub fn signature(&self) -> Signature {
        self.transaction.signatures.first().copied().unwrap_or_default()
    }

    pub fn is_durable(&self) -> bool {
        self.durable_nonce.is_some()
    }

    pub fn wire_base64(&self) -> String {
        STANDARD.encode(&self.wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        hash::Hash,
        message::Message,
        signature::{Keypair, Signer},
    };

    #[test]
    fn test_signed_transaction_wire_and_signature() {
        let payer = Keypair::new();
        let ix = solana_sdk::instruction::Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[0],
            vec![solana_sdk::instruction::AccountMeta::new(Pubkey::new_unique(), false)],
        );
        let message = Message::new_with_blockhash(&[ix], Some(&payer.pubkey()), &Hash::new_unique());
        let tx = Transaction::new(&[&payer], message, Hash::default());
        let expected_signature = tx.signatures[0];

        let signed = SignedTransaction::new(tx, None).unwrap();
        assert_eq!(signed.signature(), expected_signature);
        assert_eq!(signed.required_signers, vec![payer.pubkey()]);
        assert!(!signed.is_durable());
        assert_eq!(STANDARD.decode(signed.wire_base64()).unwrap(), signed.wire);
    }
}
