//! Freshness anchors
//!
//! Every transaction carries a value the ledger uses to reject stale or
//! replayed submissions. It is either a recent blockhash (valid for a short
//! window) or the current value of a durable nonce account, which stays
//! valid until the nonce is advanced.

use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, pubkey::Pubkey};

/// Durable nonce coordinates read from the nonce account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurableNonceAnchor {
    pub nonce_account: Pubkey,
    /// Key allowed to advance the nonce; must sign the transaction
    pub authority: Pubkey,
    /// Stored nonce value, used in place of the recent blockhash
    pub nonce_value: Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreshnessAnchor {
    RecentBlockhash(Hash),
    DurableNonce(DurableNonceAnchor),
}

impl FreshnessAnchor {
    pub fn durable(nonce_account: Pubkey, authority: Pubkey, nonce_value: Hash) -> Self {
        Self::DurableNonce(DurableNonceAnchor {
            nonce_account,
            authority,
            nonce_value,
        })
    }

    /// Value compiled into the message's `recent_blockhash` slot
    pub fn blockhash(&self) -> Hash {
        match self {
            Self::RecentBlockhash(hash) => *hash,
            Self::DurableNonce(anchor) => anchor.nonce_value,
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Self::DurableNonce(_))
    }

    pub fn nonce(&self) -> Option<&DurableNonceAnchor> {
        match self {
            Self::DurableNonce(anchor) => Some(anchor),
            Self::RecentBlockhash(_) => None,
        }
    }

    /// `(nonce_account, authority)` for instruction planning
    pub fn nonce_coordinates(&self) -> Option<(Pubkey, Pubkey)> {
        self.nonce().map(|anchor| (anchor.nonce_account, anchor.authority))
    }
}
