//! Durable-nonce-aware simulation helpers
//!
//! Simulating a durable transaction as-is would consume the nonce if the
//! node executed the advance instruction, so simulation copies drop it and
//! are re-anchored on a fresh blockhash.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    message::Message,
};

use super::instructions::is_advance_nonce;
use crate::compat;

/// Drop the leading advance-nonce instruction of a durable list
pub fn strip_nonce_for_simulation(instructions: &[Instruction], is_durable: bool) -> Vec<Instruction> {
    match instructions.split_first() {
        Some((first, rest)) if is_durable && is_advance_nonce(first) => rest.to_vec(),
        _ => instructions.to_vec(),
    }
}

/// Expand compiled instructions back into full instructions
///
/// Signer and writable flags are recovered from the message header.
pub fn decompile_instructions(message: &Message) -> Vec<Instruction> {
    let key = |index: u8| message.account_keys.get(usize::from(index)).copied();

    message
        .instructions
        .iter()
        .filter_map(|compiled| {
            let program_id = key(compiled.program_id_index)?;
            let accounts = compiled
                .accounts
                .iter()
                .map(|&index| {
                    let i = usize::from(index);
                    key(index).map(|pubkey| AccountMeta {
                        pubkey,
                        is_signer: compat::is_signer_index(message, i),
                        is_writable: compat::is_writable_index(message, i),
                    })
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Instruction {
                program_id,
                accounts,
                data: compiled.data.clone(),
            })
        })
        .collect()
}
