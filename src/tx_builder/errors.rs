//! Error types for transaction assembly
//!
//! Assembly is pure in-memory work, so these errors never come from the
//! network. They split into two groups:
//! - programming errors (operation in the wrong state, bad ordering), fatal
//! - signature gaps (`IncompleteSignature`), recoverable by collecting the
//!   missing signatures and finalizing again

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use super::assembler::AssemblerState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    /// Operation not permitted in the assembler's current state
    ///
    /// Raised for example when adding an instruction after the message was
    /// frozen, or finalizing twice.
    #[error("cannot {operation} while assembler is {state}")]
    State {
        operation: &'static str,
        state: AssemblerState,
    },

    /// Not every required signer has a valid signature
    #[error("missing signatures from {} required signer(s): {}", missing.len(), format_keys(missing))]
    IncompleteSignature { missing: Vec<Pubkey> },

    /// A signature was offered by a key the message does not require
    #[error("{0} is not a required signer of this message")]
    UnexpectedSigner(Pubkey),

    /// An out-of-band signature does not verify against the frozen bytes
    #[error("signature from {0} does not verify against the frozen message")]
    InvalidSignature(Pubkey),

    /// Signer implementation failed to produce a signature
    #[error("signing failed: {0}")]
    Signing(String),

    /// Durable-nonce ordering violated
    ///
    /// A durable transaction must start with exactly one advance-nonce
    /// instruction; a blockhash transaction must contain none.
    #[error("invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Freeze attempted with nothing to freeze
    #[error("cannot freeze: {0}")]
    NothingToFreeze(&'static str),

    /// Message or transaction bytes could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn format_keys(keys: &[Pubkey]) -> String {
    keys.iter().map(Pubkey::to_string).collect::<Vec<_>>().join(", ")
}

impl AssemblerError {
    /// Only signature gaps are recoverable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::IncompleteSignature { .. } => true,

            Self::State { .. }
            | Self::UnexpectedSigner(_)
            | Self::InvalidSignature(_)
            | Self::Signing(_)
            | Self::InvalidInstructionOrder(_)
            | Self::NothingToFreeze(_)
            | Self::Serialization(_) => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::State { .. } => "state",
            Self::IncompleteSignature { .. } => "incomplete_signature",
            Self::UnexpectedSigner(_) | Self::InvalidSignature(_) | Self::Signing(_) => "signing",
            Self::InvalidInstructionOrder(_) | Self::NothingToFreeze(_) => "validation",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn state(operation: &'static str, state: AssemblerState) -> Self {
        Self::State { operation, state }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn serialization(reason: impl std::fmt::Display) -> Self {
        Self::Serialization(reason.to_string())
    }
}
