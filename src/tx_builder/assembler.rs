//! Transaction assembler
//!
//! Collects instructions, freezes them into an exact message, and gathers
//! signatures over those bytes, either from local signers or out of band.
//!
//! ```text
//! Empty -> Composing -> MessageFrozen -> PartiallySigned -> FullySigned -> Submitted
//! ```
//!
//! Once frozen the message bytes never change. A signature only counts if it
//! comes from a required signer and verifies against the frozen bytes, so a
//! reordered or edited message can never inherit old signatures.

use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::Transaction,
};
use tracing::{debug, trace};

use super::context::{DurableNonceAnchor, FreshnessAnchor};
use super::errors::AssemblerError;
use super::instructions::{is_advance_nonce, plan_instructions};
use super::output::SignedTransaction;
use super::simulate::{decompile_instructions, strip_nonce_for_simulation};
use crate::compat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblerState {
    Empty,
    Composing,
    MessageFrozen,
    PartiallySigned,
    FullySigned,
    Submitted,
}

impl fmt::Display for AssemblerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Composing => "composing",
            Self::MessageFrozen => "message-frozen",
            Self::PartiallySigned => "partially-signed",
            Self::FullySigned => "fully-signed",
            Self::Submitted => "submitted",
        })
    }
}

/// A compiled message whose bytes are fixed
///
/// This is the unit exchanged between parties during out-of-band signing:
/// every participant signs exactly [`bytes`](Self::bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenMessage {
    message: Message,
    bytes: Vec<u8>,
    durable_nonce: Option<DurableNonceAnchor>,
}

impl FrozenMessage {
    fn compile(fee_payer: &Pubkey, anchor: &FreshnessAnchor, instructions: &[Instruction]) -> Result<Self, AssemblerError> {
        let plan = plan_instructions(anchor.nonce_coordinates(), instructions)?;
        let message = Message::new_with_blockhash(&plan.instructions, Some(fee_payer), &anchor.blockhash());
        let bytes = message.serialize();
        Ok(Self {
            message,
            bytes,
            durable_nonce: anchor.nonce().copied(),
        })
    }

    /// Rebuild a frozen message from serialized bytes received out of band
    ///
    /// The durable anchor is recovered from a leading advance-nonce
    /// instruction, if present.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssemblerError> {
        let message: Message = bincode::deserialize(bytes).map_err(AssemblerError::serialization)?;
        let reencoded = message.serialize();
        if reencoded != bytes {
            return Err(AssemblerError::Serialization(
                "message bytes are not in canonical form".to_string(),
            ));
        }
        if message.header.num_required_signatures == 0 {
            return Err(AssemblerError::Serialization(
                "message declares no required signers".to_string(),
            ));
        }

        let instructions = decompile_instructions(&message);
        let durable_nonce = instructions
            .first()
            .filter(|ix| is_advance_nonce(ix))
            .and_then(|ix| match ix.accounts.as_slice() {
                [nonce, _recent_blockhashes, authority, ..] => Some(DurableNonceAnchor {
                    nonce_account: nonce.pubkey,
                    authority: authority.pubkey,
                    nonce_value: message.recent_blockhash,
                }),
                _ => None,
            });

        Ok(Self {
            message,
            bytes: reencoded,
            durable_nonce,
        })
    }

    pub fn from_base64(encoded: &str) -> Result<Self, AssemblerError> {
        let bytes = STANDARD.decode(encoded.trim()).map_err(AssemblerError::serialization)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        compat::required_signers(&self.message)
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        compat::fee_payer(&self.message)
    }

    pub fn recent_blockhash(&self) -> Hash {
        self.message.recent_blockhash
    }

    pub fn durable_nonce(&self) -> Option<&DurableNonceAnchor> {
        self.durable_nonce.as_ref()
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        decompile_instructions(&self.message)
    }
}

/// Builds one transaction through its signing lifecycle
#[derive(Debug, Clone)]
pub struct TransactionAssembler {
    fee_payer: Pubkey,
    anchor: Option<FreshnessAnchor>,
    instructions: Vec<Instruction>,
    frozen: Option<FrozenMessage>,
    signatures: HashMap<Pubkey, Signature>,
    submitted: bool,
}

impl TransactionAssembler {
    pub fn new(fee_payer: Pubkey) -> Self {
        Self {
            fee_payer,
            anchor: None,
            instructions: Vec::new(),
            frozen: None,
            signatures: HashMap::new(),
            submitted: false,
        }
    }

    pub fn with_anchor(fee_payer: Pubkey, anchor: FreshnessAnchor) -> Self {
        let mut assembler = Self::new(fee_payer);
        assembler.anchor = Some(anchor);
        assembler
    }

    /// Aggregate signatures for a message frozen elsewhere
    pub fn from_frozen(frozen: FrozenMessage) -> Self {
        let fee_payer = frozen.fee_payer().copied().unwrap_or_default();
        let anchor = match frozen.durable_nonce() {
            Some(nonce) => FreshnessAnchor::DurableNonce(*nonce),
            None => FreshnessAnchor::RecentBlockhash(frozen.recent_blockhash()),
        };
        Self {
            fee_payer,
            anchor: Some(anchor),
            instructions: Vec::new(),
            frozen: Some(frozen),
            signatures: HashMap::new(),
            submitted: false,
        }
    }

    pub fn state(&self) -> AssemblerState {
        if self.submitted {
            return AssemblerState::Submitted;
        }
        match &self.frozen {
            Some(frozen) => {
                let required = frozen.required_signers();
                let signed = required.iter().filter(|key| self.signatures.contains_key(*key)).count();
                if signed == required.len() {
                    AssemblerState::FullySigned
                } else if signed > 0 {
                    AssemblerState::PartiallySigned
                } else {
                    AssemblerState::MessageFrozen
                }
            }
            None if self.instructions.is_empty() => AssemblerState::Empty,
            None => AssemblerState::Composing,
        }
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn anchor(&self) -> Option<&FreshnessAnchor> {
        self.anchor.as_ref()
    }

    pub fn is_durable(&self) -> bool {
        self.anchor.as_ref().is_some_and(FreshnessAnchor::is_durable)
    }

    /// Caller-supplied instructions, without the advance-nonce prefix
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn frozen(&self) -> Option<&FrozenMessage> {
        self.frozen.as_ref()
    }

    /// Set or replace the freshness anchor; only before freezing
    pub fn set_anchor(&mut self, anchor: FreshnessAnchor) -> Result<(), AssemblerError> {
        self.require_unfrozen("set anchor")?;
        self.anchor = Some(anchor);
        Ok(())
    }

    pub fn add(&mut self, ix: Instruction) -> Result<&mut Self, AssemblerError> {
        self.require_unfrozen("add instruction")?;
        trace!(program = %ix.program_id, accounts = ix.accounts.len(), "instruction added");
        self.instructions.push(ix);
        Ok(self)
    }

    pub fn add_many(&mut self, ixs: impl IntoIterator<Item = Instruction>) -> Result<&mut Self, AssemblerError> {
        self.require_unfrozen("add instruction")?;
        self.instructions.extend(ixs);
        Ok(self)
    }

    /// Compile the message and fix its bytes
    pub fn freeze(&mut self) -> Result<&FrozenMessage, AssemblerError> {
        match self.state() {
            AssemblerState::Composing => {}
            AssemblerState::Empty => return Err(AssemblerError::NothingToFreeze("no instructions")),
            state => return Err(AssemblerError::state("freeze", state)),
        }
        let anchor = self
            .anchor
            .ok_or(AssemblerError::NothingToFreeze("no freshness anchor"))?;

        let frozen = FrozenMessage::compile(&self.fee_payer, &anchor, &self.instructions)?;
        debug!(
            fee_payer = %self.fee_payer,
            durable = anchor.is_durable(),
            instructions = frozen.message.instructions.len(),
            required_signers = frozen.required_signers().len(),
            message_len = frozen.bytes.len(),
            "message frozen"
        );
        let frozen = self.frozen.insert(frozen);
        Ok(&*frozen)
    }

    pub fn message_bytes(&self) -> Result<&[u8], AssemblerError> {
        self.frozen
            .as_ref()
            .map(FrozenMessage::bytes)
            .ok_or_else(|| AssemblerError::state("read message bytes", self.state()))
    }

    /// Sign the frozen message, freezing first if still composing
    pub fn sign<S: Signer + ?Sized>(&mut self, signer: &S) -> Result<Signature, AssemblerError> {
        match self.state() {
            AssemblerState::Composing => {
                self.freeze()?;
            }
            AssemblerState::MessageFrozen | AssemblerState::PartiallySigned | AssemblerState::FullySigned => {}
            state => return Err(AssemblerError::state("sign", state)),
        }

        let frozen = self
            .frozen
            .as_ref()
            .ok_or_else(|| AssemblerError::state("sign", self.state()))?;
        let pubkey = signer
            .try_pubkey()
            .map_err(|e| AssemblerError::Signing(e.to_string()))?;
        if compat::signer_position(&frozen.message, &pubkey).is_none() {
            return Err(AssemblerError::UnexpectedSigner(pubkey));
        }
        let signature = signer
            .try_sign_message(&frozen.bytes)
            .map_err(|e| AssemblerError::Signing(e.to_string()))?;

        self.signatures.insert(pubkey, signature);
        debug!(signer = %pubkey, state = %self.state(), "signature added");
        Ok(signature)
    }

    pub fn sign_all(&mut self, signers: &[&dyn Signer]) -> Result<(), AssemblerError> {
        for signer in signers {
            self.sign(*signer)?;
        }
        Ok(())
    }

    /// Attach a signature produced out of band
    pub fn add_signature(&mut self, pubkey: Pubkey, signature: Signature) -> Result<(), AssemblerError> {
        let frozen = match self.state() {
            AssemblerState::MessageFrozen | AssemblerState::PartiallySigned | AssemblerState::FullySigned => {
                self.frozen
                    .as_ref()
                    .ok_or_else(|| AssemblerError::state("add signature", self.state()))?
            }
            state => return Err(AssemblerError::state("add signature", state)),
        };

        if compat::signer_position(&frozen.message, &pubkey).is_none() {
            return Err(AssemblerError::UnexpectedSigner(pubkey));
        }
        if !signature.verify(pubkey.as_ref(), &frozen.bytes) {
            return Err(AssemblerError::InvalidSignature(pubkey));
        }

        self.signatures.insert(pubkey, signature);
        debug!(signer = %pubkey, state = %self.state(), "out-of-band signature added");
        Ok(())
    }

    /// Signature attached for `pubkey`, if any
    pub fn signature_of(&self, pubkey: &Pubkey) -> Option<&Signature> {
        self.signatures.get(pubkey)
    }

    /// Signers whose signature is attached and verifies
    pub fn valid_signers(&self) -> Vec<Pubkey> {
        let Some(frozen) = &self.frozen else {
            return Vec::new();
        };
        frozen
            .required_signers()
            .iter()
            .filter(|key| {
                self.signatures
                    .get(*key)
                    .is_some_and(|sig| sig.verify(key.as_ref(), &frozen.bytes))
            })
            .copied()
            .collect()
    }

    /// `true` when every required signer has a valid signature
    pub fn verify(&self) -> bool {
        match &self.frozen {
            Some(frozen) => self.valid_signers().len() == frozen.required_signers().len(),
            None => false,
        }
    }

    /// Required signers still lacking a valid signature
    ///
    /// Before freezing this is computed from the instructions added so far.
    pub fn missing_signers(&self) -> Vec<Pubkey> {
        match &self.frozen {
            Some(frozen) => {
                let valid = self.valid_signers();
                frozen
                    .required_signers()
                    .iter()
                    .filter(|key| !valid.contains(*key))
                    .copied()
                    .collect()
            }
            None => {
                let durable = self.anchor.and_then(|anchor| anchor.nonce_coordinates());
                match plan_instructions(durable, &self.instructions) {
                    Ok(plan) => {
                        let preview = Message::new(&plan.instructions, Some(&self.fee_payer));
                        compat::required_signers(&preview).to_vec()
                    }
                    Err(_) => vec![self.fee_payer],
                }
            }
        }
    }

    /// Produce the broadcastable transaction
    pub fn finalize(&self) -> Result<SignedTransaction, AssemblerError> {
        let frozen = match self.state() {
            AssemblerState::FullySigned => self
                .frozen
                .as_ref()
                .ok_or_else(|| AssemblerError::state("finalize", self.state()))?,
            AssemblerState::MessageFrozen | AssemblerState::PartiallySigned => {
                return Err(AssemblerError::IncompleteSignature {
                    missing: self.missing_signers(),
                })
            }
            state => return Err(AssemblerError::state("finalize", state)),
        };
        if !self.verify() {
            return Err(AssemblerError::IncompleteSignature {
                missing: self.missing_signers(),
            });
        }

        let signatures = frozen
            .required_signers()
            .iter()
            .map(|key| {
                self.signatures
                    .get(key)
                    .copied()
                    .ok_or_else(|| AssemblerError::IncompleteSignature { missing: vec![*key] })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let transaction = Transaction {
            signatures,
            message: frozen.message.clone(),
        };
        SignedTransaction::new(transaction, frozen.durable_nonce)
    }

    pub fn mark_submitted(&mut self) -> Result<(), AssemblerError> {
        match self.state() {
            AssemblerState::FullySigned => {
                self.submitted = true;
                Ok(())
            }
            state => Err(AssemblerError::state("mark submitted", state)),
        }
    }

    /// Unsigned copy for simulation, re-anchored on `blockhash`
    ///
    /// The advance-nonce instruction is dropped so simulating never
    /// consumes the nonce.
    pub fn simulation_transaction(&self, blockhash: Hash) -> Result<Transaction, AssemblerError> {
        let instructions = match &self.frozen {
            Some(frozen) => {
                strip_nonce_for_simulation(&frozen.instructions(), frozen.durable_nonce.is_some())
            }
            None => self.instructions.clone(),
        };
        if instructions.is_empty() {
            return Err(AssemblerError::NothingToFreeze("no instructions"));
        }
        let message = Message::new_with_blockhash(&instructions, Some(&self.fee_payer), &blockhash);
        Ok(Transaction::new_unsigned(message))
    }

    fn require_unfrozen(&self, operation: &'static str) -> Result<(), AssemblerError> {
        match self.state() {
            AssemblerState::Empty | AssemblerState::Composing => Ok(()),
            state => Err(AssemblerError::state(operation, state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        instruction::AccountMeta,
        signature::Keypair,
    };

    fn program_ix(signer: &Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[0],
            vec![
                AccountMeta::new_readonly(*signer, true),
                AccountMeta::new(Pubkey::new_unique(), false),
            ],
        )
    }

    fn composing(payer: &Keypair, cosigner: &Keypair) -> TransactionAssembler {
        let mut assembler =
            TransactionAssembler::with_anchor(payer.pubkey(), FreshnessAnchor::RecentBlockhash(Hash::new_unique()));
        assembler.add(program_ix(&cosigner.pubkey())).unwrap();
        assembler
    }

    #[test]
    fn test_state_progression() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut assembler =
            TransactionAssembler::with_anchor(payer.pubkey(), FreshnessAnchor::RecentBlockhash(Hash::new_unique()));
        assert_eq!(assembler.state(), AssemblerState::Empty);

        assembler.add(program_ix(&cosigner.pubkey())).unwrap();
        assert_eq!(assembler.state(), AssemblerState::Composing);

        assembler.freeze().unwrap();
        assert_eq!(assembler.state(), AssemblerState::MessageFrozen);

        assembler.sign(&payer).unwrap();
        assert_eq!(assembler.state(), AssemblerState::PartiallySigned);
        assert!(!assembler.verify());

        assembler.sign(&cosigner).unwrap();
        assert_eq!(assembler.state(), AssemblerState::FullySigned);
        assert!(assembler.verify());

        assembler.finalize().unwrap();
        assembler.mark_submitted().unwrap();
        assert_eq!(assembler.state(), AssemblerState::Submitted);
    }

    #[test]
    fn test_add_after_freeze_is_state_error() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut assembler = composing(&payer, &cosigner);
        assembler.freeze().unwrap();

        let err = assembler.add(program_ix(&payer.pubkey())).unwrap_err();
        assert_eq!(err, AssemblerError::state("add instruction", AssemblerState::MessageFrozen));

        let err = assembler
            .set_anchor(FreshnessAnchor::RecentBlockhash(Hash::new_unique()))
            .unwrap_err();
        assert!(matches!(err, AssemblerError::State { .. }));
    }

    #[test]
    fn test_freeze_requires_anchor_and_instructions() {
        let payer = Keypair::new();
        let mut assembler = TransactionAssembler::new(payer.pubkey());
        assert_eq!(
            assembler.freeze().unwrap_err(),
            AssemblerError::NothingToFreeze("no instructions")
        );

        assembler.add(program_ix(&payer.pubkey())).unwrap();
        assert_eq!(
            assembler.freeze().unwrap_err(),
            AssemblerError::NothingToFreeze("no freshness anchor")
        );
    }

    #[test]
    fn test_sign_freezes_implicitly_and_rejects_strangers() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut assembler = composing(&payer, &cosigner);

        assembler.sign(&payer).unwrap();
        assert!(assembler.frozen().is_some());

        let stranger = Keypair::new();
        assert_eq!(
            assembler.sign(&stranger).unwrap_err(),
            AssemblerError::UnexpectedSigner(stranger.pubkey())
        );
    }

    #[test]
    fn test_finalize_reports_missing_signers() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut assembler = composing(&payer, &cosigner);
        assembler.sign(&payer).unwrap();

        assert_eq!(assembler.missing_signers(), vec![cosigner.pubkey()]);
        assert_eq!(
            assembler.finalize().unwrap_err(),
            AssemblerError::IncompleteSignature {
                missing: vec![cosigner.pubkey()]
            }
        );
    }

    #[test]
    fn test_out_of_band_signature_must_verify() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut assembler = composing(&payer, &cosigner);
        let bytes = assembler.freeze().unwrap().bytes().to_vec();

        let forged = cosigner.sign_message(b"some other message");
        assert_eq!(
            assembler.add_signature(cosigner.pubkey(), forged).unwrap_err(),
            AssemblerError::InvalidSignature(cosigner.pubkey())
        );

        assembler
            .add_signature(cosigner.pubkey(), cosigner.sign_message(&bytes))
            .unwrap();
        assert_eq!(assembler.missing_signers(), vec![payer.pubkey()]);
    }

    #[test]
    fn test_finalized_transaction_matches_sdk_verification() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut assembler = composing(&payer, &cosigner);
        assembler.sign(&cosigner).unwrap();
        assembler.sign(&payer).unwrap();

        let signed = assembler.finalize().unwrap();
        assert!(signed.transaction.verify().is_ok());
        assert_eq!(signed.transaction.signatures.len(), 2);
        assert_eq!(signed.required_signers, vec![payer.pubkey(), cosigner.pubkey()]);

        let decoded: Transaction = bincode::deserialize(&signed.wire).unwrap();
        assert_eq!(decoded, signed.transaction);
    }

    #[test]
    fn test_reordered_message_invalidates_signatures() {
        let payer = Keypair::new();
        let first = program_ix(&payer.pubkey());
        let second = program_ix(&payer.pubkey());
        let anchor = FreshnessAnchor::RecentBlockhash(Hash::new_unique());

        let mut original = TransactionAssembler::with_anchor(payer.pubkey(), anchor);
        original.add_many([first.clone(), second.clone()]).unwrap();
        let signature = original.sign(&payer).unwrap();

        let mut reordered = TransactionAssembler::with_anchor(payer.pubkey(), anchor);
        reordered.add_many([second, first]).unwrap();
        reordered.freeze().unwrap();
        assert_eq!(
            reordered.add_signature(payer.pubkey(), signature).unwrap_err(),
            AssemblerError::InvalidSignature(payer.pubkey())
        );
    }

    #[test]
    fn test_durable_freeze_prepends_single_advance() {
        let payer = Keypair::new();
        let authority = Keypair::new();
        let nonce_account = Pubkey::new_unique();
        let nonce_value = Hash::new_unique();

        let mut assembler = TransactionAssembler::with_anchor(
            payer.pubkey(),
            FreshnessAnchor::durable(nonce_account, authority.pubkey(), nonce_value),
        );
        assembler.add(program_ix(&payer.pubkey())).unwrap();
        let frozen = assembler.freeze().unwrap().clone();

        assert_eq!(frozen.recent_blockhash(), nonce_value);
        let instructions = frozen.instructions();
        assert!(is_advance_nonce(&instructions[0]));
        assert_eq!(instructions.iter().filter(|ix| is_advance_nonce(ix)).count(), 1);
        assert!(frozen.required_signers().contains(&authority.pubkey()));
        assert_eq!(frozen.durable_nonce().map(|n| n.nonce_account), Some(nonce_account));
    }

    #[test]
    fn test_from_frozen_aggregates_signatures() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut origin = composing(&payer, &cosigner);
        let exported = origin.freeze().unwrap().to_base64();

        let frozen = FrozenMessage::from_base64(&exported).unwrap();
        let mut aggregator = TransactionAssembler::from_frozen(frozen);
        assert_eq!(aggregator.state(), AssemblerState::MessageFrozen);
        assert_eq!(aggregator.fee_payer(), &payer.pubkey());

        aggregator
            .add_signature(payer.pubkey(), payer.sign_message(origin.message_bytes().unwrap()))
            .unwrap();
        aggregator.sign(&cosigner).unwrap();
        assert!(aggregator.verify());
        assert!(aggregator.finalize().is_ok());
    }

    #[test]
    fn test_missing_signers_before_freeze() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let assembler = composing(&payer, &cosigner);
        assert_eq!(assembler.missing_signers(), vec![payer.pubkey(), cosigner.pubkey()]);
    }

    #[test]
    fn test_mark_submitted_requires_full_signatures() {
        let payer = Keypair::new();
        let cosigner = Keypair::new();
        let mut assembler = composing(&payer, &cosigner);
        assembler.sign(&payer).unwrap();
        assert!(matches!(
            assembler.mark_submitted().unwrap_err(),
            AssemblerError::State { state: AssemblerState::PartiallySigned, .. }
        ));
    }
}
