//! M-of-N token authorities and offline signature collection
//!
//! A [`MultisigAuthority`] is a token-program multisig account: operations
//! it authorizes name the authority plus the participating members as
//! signers, and the token program accepts them once at least `M` distinct
//! members have signed.
//!
//! Members rarely sit in one process. [`OfflineSigningSession`] freezes a
//! durable-nonce message once, exports it, and aggregates the signatures
//! that come back. The nonce keeps the message valid for as long as the
//! collection takes.

use std::collections::HashSet;

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Multisig;
use tracing::{debug, info};

use crate::client::ClientContext;
use crate::codec::LayoutError;
use crate::compat;
use crate::errors::{ProtocolError, Result};
use crate::tx_builder::{AssemblerError, FreshnessAnchor, FrozenMessage, TransactionAssembler};

/// Token-program limit on multisig members
pub const MAX_SIGNERS: usize = spl_token::instruction::MAX_SIGNERS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigAuthority {
    address: Pubkey,
    threshold: u8,
    signers: Vec<Pubkey>,
}

impl MultisigAuthority {
    /// Validate `1 <= m <= n <= 11` and distinct members
    pub fn new(address: Pubkey, m: u8, signers: Vec<Pubkey>) -> Result<Self> {
        let n = signers.len();
        if n == 0 || n > MAX_SIGNERS {
            return Err(ProtocolError::configuration(format!(
                "multisig needs between 1 and {MAX_SIGNERS} signers, got {n}"
            )));
        }
        if m == 0 || m as usize > n {
            return Err(ProtocolError::configuration(format!(
                "threshold {m} is outside 1..={n}"
            )));
        }
        let mut seen = HashSet::with_capacity(n);
        if let Some(duplicate) = signers.iter().find(|key| !seen.insert(**key)) {
            return Err(ProtocolError::configuration(format!(
                "signer {duplicate} appears more than once"
            )));
        }
        Ok(Self {
            address,
            threshold: m,
            signers,
        })
    }

    /// Decode the token program's multisig record
    pub fn from_account_bytes(address: Pubkey, data: &[u8]) -> Result<Self> {
        if data.len() != Multisig::LEN {
            return Err(LayoutError::SizeMismatch {
                schema: "multisig",
                expected: Multisig::LEN,
                actual: data.len(),
            }
            .into());
        }
        let state = Multisig::unpack(data)
            .map_err(|e| ProtocolError::configuration(format!("multisig {address} is not usable: {e}")))?;
        let signers = state.signers.get(..usize::from(state.n)).ok_or_else(|| {
            ProtocolError::configuration(format!(
                "multisig {address} claims {} signers, the limit is {MAX_SIGNERS}",
                state.n
            ))
        })?;
        Self::new(address, state.m, signers.to_vec())
    }

    pub fn address(&self) -> &Pubkey {
        &self.address
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn signers(&self) -> &[Pubkey] {
        &self.signers
    }

    pub fn is_member(&self, key: &Pubkey) -> bool {
        self.signers.contains(key)
    }

    /// Distinct members among `keys`
    pub fn members_in<'a>(&self, keys: impl IntoIterator<Item = &'a Pubkey>) -> Vec<Pubkey> {
        let mut members = Vec::new();
        for key in keys {
            if self.is_member(key) && !members.contains(key) {
                members.push(*key);
            }
        }
        members
    }

    fn participant_refs<'a>(&self, participants: &'a [Pubkey]) -> Result<Vec<&'a Pubkey>> {
        if let Some(outsider) = participants.iter().find(|key| !self.is_member(key)) {
            return Err(ProtocolError::authorization(
                self.address,
                format!("{outsider} is not a member"),
            ));
        }
        Ok(participants.iter().collect())
    }

    /// Token mint authorized by this multisig and the given members
    pub fn mint_to_instruction(
        &self,
        mint: &Pubkey,
        destination: &Pubkey,
        participants: &[Pubkey],
        amount: u64,
    ) -> Result<Instruction> {
        let refs = self.participant_refs(participants)?;
        spl_token::instruction::mint_to(&spl_token::id(), mint, destination, &self.address, &refs, amount)
            .map_err(|e| ProtocolError::instruction_failed(spl_token::id(), e.to_string()))
    }

    /// Token transfer out of an account owned by this multisig
    pub fn transfer_instruction(
        &self,
        source: &Pubkey,
        destination: &Pubkey,
        participants: &[Pubkey],
        amount: u64,
    ) -> Result<Instruction> {
        let refs = self.participant_refs(participants)?;
        spl_token::instruction::transfer(&spl_token::id(), source, destination, &self.address, &refs, amount)
            .map_err(|e| ProtocolError::instruction_failed(spl_token::id(), e.to_string()))
    }

    /// Count distinct members with a valid signature on the frozen message
    ///
    /// Fewer than `M` is an [`ProtocolError::Authorization`]; the
    /// assembler is not touched, so more signatures can still be added.
    pub fn check_authorization(&self, assembler: &TransactionAssembler) -> Result<usize> {
        let valid = assembler.valid_signers();
        let approvals = self.members_in(valid.iter()).len();
        debug!(
            authority = %self.address,
            approvals,
            threshold = self.threshold,
            "multisig authorization check"
        );
        if approvals < self.threshold as usize {
            return Err(ProtocolError::authorization(
                self.address,
                format!("{approvals} of {} required member signatures", self.threshold),
            ));
        }
        Ok(approvals)
    }
}

/// Allocate and initialize an M-of-N authority on the token program
#[allow(deprecated)]
pub async fn create(ctx: &ClientContext, multisig: &Keypair, m: u8, signers: &[Pubkey]) -> Result<MultisigAuthority> {
    let authority = MultisigAuthority::new(multisig.pubkey(), m, signers.to_vec())?;
    let lamports = ctx.rent_exempt_balance(Multisig::LEN).await?;

    let refs: Vec<&Pubkey> = signers.iter().collect();
    let initialize = spl_token::instruction::initialize_multisig(&spl_token::id(), &multisig.pubkey(), &refs, m)
        .map_err(|e| ProtocolError::instruction_failed(spl_token::id(), e.to_string()))?;
    let instructions = vec![
        solana_sdk::system_instruction::create_account(
            &ctx.payer_pubkey(),
            &multisig.pubkey(),
            lamports,
            Multisig::LEN as u64,
            &spl_token::id(),
        ),
        initialize,
    ];

    ctx.send_instructions("create_multisig", instructions, &[multisig])
        .await?;
    ctx.logger()
        .log_account_created("multisig", &multisig.pubkey().to_string(), Multisig::LEN, lamports);
    Ok(authority)
}

pub async fn fetch(ctx: &ClientContext, address: &Pubkey) -> Result<MultisigAuthority> {
    let account = ctx.fetch_account(address).await?;
    if account.owner != spl_token::id() {
        return Err(ProtocolError::configuration(format!(
            "{address} is owned by {}, not the token program",
            account.owner
        )));
    }
    MultisigAuthority::from_account_bytes(*address, &account.data)
}

/// Check the threshold locally, then submit and confirm
///
/// A missing-signature rejection from the ledger is reported against this
/// authority as well.
pub async fn submit_authorized(
    ctx: &ClientContext,
    authority: &MultisigAuthority,
    assembler: &mut TransactionAssembler,
) -> Result<Signature> {
    authority.check_authorization(assembler)?;
    match ctx.submit_and_confirm("multisig_submit", assembler).await {
        Err(ProtocolError::Authorization { authority: None, detail }) => Err(ProtocolError::Authorization {
            authority: Some(authority.address),
            detail,
        }),
        other => other,
    }
}

/// Out-of-band collection of member signatures for one frozen message
#[derive(Debug)]
pub struct OfflineSigningSession {
    authority: MultisigAuthority,
    assembler: TransactionAssembler,
}

impl OfflineSigningSession {
    /// Freeze `instructions` under a durable-nonce anchor
    ///
    /// A recent blockhash would expire long before members reply, so any
    /// other anchor is refused.
    pub fn new(
        authority: MultisigAuthority,
        fee_payer: Pubkey,
        anchor: FreshnessAnchor,
        instructions: Vec<Instruction>,
    ) -> Result<Self> {
        if !anchor.is_durable() {
            return Err(ProtocolError::configuration(
                "offline signing requires a durable nonce anchor",
            ));
        }
        let mut assembler = TransactionAssembler::with_anchor(fee_payer, anchor);
        assembler.add_many(instructions)?;
        assembler.freeze()?;
        info!(
            authority = %authority.address,
            required = assembler.missing_signers().len(),
            "offline signing session opened"
        );
        Ok(Self { authority, assembler })
    }

    pub fn authority(&self) -> &MultisigAuthority {
        &self.authority
    }

    pub fn frozen(&self) -> Result<&FrozenMessage> {
        Ok(self
            .assembler
            .frozen()
            .ok_or_else(|| AssemblerError::state("export", self.assembler.state()))?)
    }

    /// Base64 message bytes to hand to each member
    pub fn export(&self) -> Result<String> {
        Ok(self.frozen()?.to_base64())
    }

    /// Member side: sign an exported message
    pub fn sign_offline(encoded: &str, signer: &dyn Signer) -> Result<(Pubkey, Signature)> {
        let frozen = FrozenMessage::from_base64(encoded)?;
        if frozen.durable_nonce().is_none() {
            return Err(ProtocolError::configuration(
                "refusing to sign a message without a durable nonce",
            ));
        }
        let pubkey = signer
            .try_pubkey()
            .map_err(|e| AssemblerError::Signing(e.to_string()))?;
        if compat::signer_position(frozen.message(), &pubkey).is_none() {
            return Err(AssemblerError::UnexpectedSigner(pubkey).into());
        }
        let signature = signer
            .try_sign_message(frozen.bytes())
            .map_err(|e| AssemblerError::Signing(e.to_string()))?;
        Ok((pubkey, signature))
    }

    /// Aggregator side: attach a returned signature
    pub fn add_signature(&mut self, pubkey: Pubkey, signature: Signature) -> Result<()> {
        self.assembler.add_signature(pubkey, signature)?;
        let required = self.frozen()?.required_signers().len();
        let collected = self.assembler.valid_signers().len();
        debug!(signer = %pubkey, collected, required, "offline signature collected");
        Ok(())
    }

    /// Sign locally, for a participant present at the aggregator
    pub fn sign(&mut self, signer: &dyn Signer) -> Result<Signature> {
        Ok(self.assembler.sign(signer)?)
    }

    pub fn missing_signers(&self) -> Vec<Pubkey> {
        self.assembler.missing_signers()
    }

    pub fn check_authorization(&self) -> Result<usize> {
        self.authority.check_authorization(&self.assembler)
    }

    pub fn into_assembler(self) -> TransactionAssembler {
        self.assembler
    }
}
