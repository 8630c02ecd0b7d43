//! Message header helpers
//!
//! A legacy message does not store per-account flags. They are implied by
//! the header and the position of the key in `account_keys`:
//!
//! ```text
//! [ writable signers | readonly signers | writable non-signers | readonly non-signers ]
//! ```
//!
//! These helpers read that layout so the assembler and the in-memory ledger
//! agree on who must sign and what may be written.

use solana_sdk::{
    message::Message,
    pubkey::Pubkey,
};

/// Accounts that must sign, in signature-slot order
///
/// The fee payer is always slot 0.
#[inline]
#[must_use]
pub fn required_signers(message: &Message) -> &[Pubkey] {
    let count = usize::from(message.header.num_required_signatures).min(message.account_keys.len());
    &message.account_keys[..count]
}

/// Signature slot for `pubkey`, if it is a required signer
#[must_use]
pub fn signer_position(message: &Message, pubkey: &Pubkey) -> Option<usize> {
    required_signers(message).iter().position(|key| key == pubkey)
}

#[inline]
#[must_use]
pub fn is_signer_index(message: &Message, index: usize) -> bool {
    index < usize::from(message.header.num_required_signatures)
}

/// Whether the account at `index` is writable according to the header
#[must_use]
pub fn is_writable_index(message: &Message, index: usize) -> bool {
    let header = &message.header;
    let num_keys = message.account_keys.len();
    let num_signed = usize::from(header.num_required_signatures);

    if index >= num_keys {
        return false;
    }
    if index < num_signed {
        index < num_signed.saturating_sub(usize::from(header.num_readonly_signed_accounts))
    } else {
        let unsigned_writable = num_keys
            .saturating_sub(num_signed)
            .saturating_sub(usize::from(header.num_readonly_unsigned_accounts));
        index - num_signed < unsigned_writable
    }
}

#[must_use]
pub fn fee_payer(message: &Message) -> Option<&Pubkey> {
    required_signers(message).first()
}
