//! Transport error taxonomy and classification of RPC client errors

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use solana_sdk::{
    instruction::InstructionError,
    pubkey::Pubkey,
    signature::Signature,
    transaction::TransactionError,
};
use thiserror::Error;

/// Why the ledger refused a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Anchor unknown to the ledger: blockhash expired or nonce already advanced
    BlockhashNotFound,
    /// Instruction `instruction` needed a signature that was not provided
    MissingRequiredSignature { instruction: u8 },
    InsufficientFundsForFee,
    AlreadyProcessed,
    AccountNotFound,
    SignatureFailure,
    /// A program returned an error while executing instruction `instruction`
    InstructionFailed { instruction: u8, detail: String },
    Other(String),
}

impl RejectionReason {
    pub fn from_transaction_error(err: &TransactionError) -> Self {
        match err {
            TransactionError::BlockhashNotFound => Self::BlockhashNotFound,
            TransactionError::InsufficientFundsForFee => Self::InsufficientFundsForFee,
            TransactionError::AlreadyProcessed => Self::AlreadyProcessed,
            TransactionError::AccountNotFound => Self::AccountNotFound,
            TransactionError::SignatureFailure => Self::SignatureFailure,
            TransactionError::InstructionError(index, InstructionError::MissingRequiredSignature) => {
                Self::MissingRequiredSignature { instruction: *index }
            }
            TransactionError::InstructionError(index, detail) => Self::InstructionFailed {
                instruction: *index,
                detail: detail.to_string(),
            },
            other => Self::Other(other.to_string()),
        }
    }

    /// Best-effort classification of a rendered error
    ///
    /// Used where only the node's message text is available.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("blockhash not found") || lower.contains("blockhashnotfound") {
            Self::BlockhashNotFound
        } else if lower.contains("missing required signature") || lower.contains("missingrequiredsignature") {
            Self::MissingRequiredSignature {
                instruction: instruction_index(message).unwrap_or(0),
            }
        } else if lower.contains("insufficient funds for fee") || lower.contains("insufficientfundsforfee") {
            Self::InsufficientFundsForFee
        } else if lower.contains("already been processed") || lower.contains("alreadyprocessed") {
            Self::AlreadyProcessed
        } else {
            Self::Other(message.to_string())
        }
    }

    pub fn is_missing_signature(&self) -> bool {
        matches!(self, Self::MissingRequiredSignature { .. })
    }

    /// Failure attributed to the instruction at `index`
    pub fn failed_instruction(&self) -> Option<u8> {
        match self {
            Self::MissingRequiredSignature { instruction } | Self::InstructionFailed { instruction, .. } => {
                Some(*instruction)
            }
            _ => None,
        }
    }
}

// "InstructionError(2, ...)" -> 2
fn instruction_index(message: &str) -> Option<u8> {
    let start = message.find("InstructionError(")? + "InstructionError(".len();
    let rest = &message[start..];
    let end = rest.find(',')?;
    rest[..end].trim().parse().ok()
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockhashNotFound => f.write_str("blockhash not found"),
            Self::MissingRequiredSignature { instruction } => {
                write!(f, "instruction {instruction} is missing a required signature")
            }
            Self::InsufficientFundsForFee => f.write_str("insufficient funds for fee"),
            Self::AlreadyProcessed => f.write_str("transaction already processed"),
            Self::AccountNotFound => f.write_str("fee payer account not found"),
            Self::SignatureFailure => f.write_str("signature verification failed"),
            Self::InstructionFailed { instruction, detail } => {
                write!(f, "instruction {instruction} failed: {detail}")
            }
            Self::Other(detail) => f.write_str(detail),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("account {0} not found")]
    NotFound(Pubkey),

    #[error("transaction rejected: {0}")]
    Rejected(RejectionReason),

    /// Confirmation poll gave up; the transaction may still land
    #[error("confirmation of {signature} timed out after {waited_ms}ms")]
    TimedOut { signature: Signature, waited_ms: u64 },

    /// Connection-level failure; the request may or may not have reached the node
    #[error("network error: {0}")]
    Network(String),

    #[error("RPC error (code: {code:?}): {message}")]
    Rpc { code: Option<i64>, message: String },

    #[error("malformed data: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            // Retry on server errors (5xx-style codes) and rate limiting
            Self::Rpc { code, .. } => matches!(code, Some(c) if (500..600).contains(c) || *c == 429),
            Self::NotFound(_) | Self::Rejected(_) | Self::TimedOut { .. } | Self::Malformed(_) => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Rejected(_) => "rejected",
            Self::TimedOut { .. } => "timeout",
            Self::Network(_) => "network",
            Self::Rpc { .. } => "rpc",
            Self::Malformed(_) => "malformed",
        }
    }

    pub fn rejected(reason: RejectionReason) -> Self {
        Self::Rejected(reason)
    }

    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::Malformed(reason.to_string())
    }
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        if let Some(tx_err) = err.get_transaction_error() {
            return Self::Rejected(RejectionReason::from_transaction_error(&tx_err));
        }

        match err.kind() {
            ClientErrorKind::Io(e) => Self::Network(e.to_string()),
            ClientErrorKind::Reqwest(e) => Self::Network(e.to_string()),
            ClientErrorKind::SerdeJson(e) => Self::Malformed(e.to_string()),
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                match RejectionReason::from_message(message) {
                    RejectionReason::Other(_) => Self::Rpc {
                        code: Some(*code),
                        message: message.clone(),
                    },
                    reason => Self::Rejected(reason),
                }
            }
            ClientErrorKind::RpcError(RpcError::RpcRequestError(message)) => Self::Network(message.clone()),
            ClientErrorKind::RpcError(RpcError::ParseError(message)) => Self::Malformed(message.clone()),
            _ => Self::Rpc {
                code: None,
                message: err.to_string(),
            },
        }
    }
}
