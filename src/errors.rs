//! Protocol-level error taxonomy
//!
//! [`ProtocolError`] joins the per-layer errors and adds the outcomes only a
//! protocol flow can name: an authorization shortfall, a stale durable
//! nonce, an escrow that is already gone.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::address::DerivationError;
use crate::codec::LayoutError;
use crate::transport::{RejectionReason, Retryable, TransportError};
use crate::tx_builder::AssemblerError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Account bytes do not match the expected schema
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("address derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    #[error("assembly error: {0}")]
    Assembler(#[from] AssemblerError),

    /// Not enough valid signatures for the authority involved
    ///
    /// Recoverable: collect more signatures and retry. The transaction is
    /// left untouched.
    #[error("authorization failed{}: {detail}", .authority.map(|a| format!(" for {a}")).unwrap_or_default())]
    Authorization {
        authority: Option<Pubkey>,
        detail: String,
    },

    /// The durable nonce was advanced since the message was frozen
    ///
    /// Recoverable: refetch the nonce value and rebuild.
    #[error("durable nonce {nonce_account} is stale")]
    StaleNonce { nonce_account: Pubkey },

    #[error("account {0} not found")]
    NotFound(Pubkey),

    /// Escrow state account missing or no longer initialized
    #[error("escrow {0} was cancelled or completed")]
    CancelledOrCompleted(Pubkey),

    #[error("transaction rejected: {0}")]
    Rejected(RejectionReason),

    /// Confirmation poll gave up; the transaction may still land
    #[error("transaction {signature} not confirmed in time")]
    TimedOut { signature: String },

    /// The submission outcome is unknown; re-query state before retrying
    #[error("submission outcome unknown: {0}")]
    Ambiguous(String),

    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("insufficient funds: need {required} lamports, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("instruction build error (program={program}): {reason}")]
    InstructionBuild { program: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotFound(address) => Self::NotFound(address),
            TransportError::Rejected(reason) if reason.is_missing_signature() => Self::Authorization {
                authority: None,
                detail: reason.to_string(),
            },
            TransportError::Rejected(reason) => Self::Rejected(reason),
            TransportError::TimedOut { signature, .. } => Self::TimedOut {
                signature: signature.to_string(),
            },
            other => Self::Transport(other),
        }
    }
}

impl ProtocolError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Assembler(err) => err.is_retryable(),
            Self::Transport(err) => err.is_retryable(),
            Self::Authorization { .. } | Self::StaleNonce { .. } => true,

            Self::Layout(_)
            | Self::Derivation(_)
            | Self::NotFound(_)
            | Self::CancelledOrCompleted(_)
            | Self::Rejected(_)
            | Self::TimedOut { .. }
            | Self::Ambiguous(_)
            | Self::InsufficientFunds { .. }
            | Self::InstructionBuild { .. }
            | Self::Configuration(_) => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Layout(_) => "layout",
            Self::Derivation(_) => "derivation",
            Self::Assembler(err) => err.category(),
            Self::Authorization { .. } => "authorization",
            Self::StaleNonce { .. } => "stale_nonce",
            Self::NotFound(_) => "not_found",
            Self::CancelledOrCompleted(_) => "cancelled_or_completed",
            Self::Rejected(_) => "rejected",
            Self::TimedOut { .. } => "timeout",
            Self::Ambiguous(_) => "ambiguous",
            Self::Transport(err) => err.category(),
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InstructionBuild { .. } => "instruction",
            Self::Configuration(_) => "config",
        }
    }

    pub fn authorization(authority: Pubkey, detail: impl Into<String>) -> Self {
        Self::Authorization {
            authority: Some(authority),
            detail: detail.into(),
        }
    }

    pub fn instruction_failed(program: impl ToString, reason: impl Into<String>) -> Self {
        Self::InstructionBuild {
            program: program.to_string(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}

impl Retryable for ProtocolError {
    fn is_retryable(&self) -> bool {
        ProtocolError::is_retryable(self)
    }
}

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;
