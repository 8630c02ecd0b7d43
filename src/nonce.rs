//! Durable nonce accounts
//!
//! A nonce account stores a value that stands in for the recent blockhash.
//! Transactions anchored on it stay valid until the nonce is advanced, which
//! is what makes offline multi-party signing possible.

use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tracing::info;

use crate::client::ClientContext;
use crate::codec::record::{address_value, hash_value, read_address, read_hash};
use crate::codec::{AccountRecord, AccountSchema, FieldDef, FieldType, FieldValue, FieldValues, LayoutError};
use crate::errors::{ProtocolError, Result};
use crate::tx_builder::{FreshnessAnchor, TransactionAssembler};

/// Versions discriminant of the current nonce layout
pub const NONCE_VERSION_CURRENT: u32 = 1;
pub const NONCE_STATE_UNINITIALIZED: u32 = 0;
pub const NONCE_STATE_INITIALIZED: u32 = 1;

/// On-ledger nonce account record (80 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceState {
    pub version: u32,
    pub state: u32,
    /// Authority allowed to advance the nonce
    pub authorized: Pubkey,
    pub nonce_value: Hash,
    pub fee_per_signature: u64,
}

impl NonceState {
    pub fn initialized(authorized: Pubkey, nonce_value: Hash, fee_per_signature: u64) -> Self {
        Self {
            version: NONCE_VERSION_CURRENT,
            state: NONCE_STATE_INITIALIZED,
            authorized,
            nonce_value,
            fee_per_signature,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state == NONCE_STATE_INITIALIZED
    }
}

impl AccountRecord for NonceState {
    const SCHEMA: AccountSchema = AccountSchema::new(
        "nonce",
        &[
            FieldDef::new("version", FieldType::U32),
            FieldDef::new("state", FieldType::U32),
            FieldDef::new("authorized", FieldType::Bytes32),
            FieldDef::new("nonce_value", FieldType::Bytes32),
            FieldDef::new("fee_per_signature", FieldType::U64),
        ],
    );

    fn to_values(&self) -> FieldValues {
        FieldValues::new()
            .with("version", FieldValue::U32(self.version))
            .with("state", FieldValue::U32(self.state))
            .with("authorized", address_value(&self.authorized))
            .with("nonce_value", hash_value(&self.nonce_value))
            .with("fee_per_signature", FieldValue::U64(self.fee_per_signature))
    }

    fn from_values(values: &FieldValues) -> std::result::Result<Self, LayoutError> {
        let schema = Self::SCHEMA.name();
        Ok(Self {
            version: values.u32(schema, "version")?,
            state: values.u32(schema, "state")?,
            authorized: read_address(values, schema, "authorized")?,
            nonce_value: read_hash(values, schema, "nonce_value")?,
            fee_per_signature: values.u64(schema, "fee_per_signature")?,
        })
    }
}

/// Allocate and initialize a nonce account owned by the system program
#[allow(deprecated)]
pub async fn create_nonce_account(ctx: &ClientContext, nonce: &Keypair, authority: &Pubkey) -> Result<Signature> {
    let lamports = ctx.rent_exempt_balance(NonceState::LEN).await?;
    let instructions =
        solana_sdk::system_instruction::create_nonce_account(&ctx.payer_pubkey(), &nonce.pubkey(), authority, lamports);

    let signature = ctx
        .send_instructions("create_nonce_account", instructions, &[nonce])
        .await?;
    ctx.logger()
        .log_account_created("nonce", &nonce.pubkey().to_string(), NonceState::LEN, lamports);
    Ok(signature)
}

pub async fn fetch_nonce(ctx: &ClientContext, nonce_account: &Pubkey) -> Result<NonceState> {
    let state: NonceState = ctx.fetch_record(nonce_account).await?;
    ctx.logger()
        .log_nonce_operation("fetch", &nonce_account.to_string(), state.is_initialized());
    if !state.is_initialized() {
        return Err(ProtocolError::configuration(format!(
            "nonce account {nonce_account} is not initialized"
        )));
    }
    Ok(state)
}

/// Read the current nonce value into a freshness anchor
///
/// Call immediately before freezing: the value is only good until the
/// next advance.
pub async fn durable_anchor(ctx: &ClientContext, nonce_account: &Pubkey) -> Result<FreshnessAnchor> {
    let state = fetch_nonce(ctx, nonce_account).await?;
    info!(
        nonce_account = %nonce_account,
        authority = %state.authorized,
        nonce_value = %state.nonce_value,
        "durable anchor read"
    );
    Ok(FreshnessAnchor::durable(*nonce_account, state.authorized, state.nonce_value))
}

/// Assembler paid by the context's payer and anchored on `nonce_account`
pub async fn durable_assembler(ctx: &ClientContext, nonce_account: &Pubkey) -> Result<TransactionAssembler> {
    let anchor = durable_anchor(ctx, nonce_account).await?;
    Ok(TransactionAssembler::with_anchor(ctx.payer_pubkey(), anchor))
}
