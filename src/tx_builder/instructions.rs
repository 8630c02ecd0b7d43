//! Instruction planning and ordering validation
//!
//! A durable-nonce transaction must be laid out as:
//! 1. `advance_nonce_account`, authored by the nonce authority
//! 2. caller instructions, in the order they were added
//!
//! A blockhash transaction contains no advance-nonce instruction at all.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_program};

use super::errors::AssemblerError;

/// System program discriminant of `AdvanceNonceAccount` (u32 LE)
const ADVANCE_NONCE_TAG: [u8; 4] = [4, 0, 0, 0];

/// Ordered instructions with durable-mode metadata
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    pub instructions: Vec<Instruction>,
    /// `true` when the first instruction advances a nonce
    pub is_durable: bool,
}

impl InstructionPlan {
    pub fn new(instructions: Vec<Instruction>, is_durable: bool) -> Self {
        Self {
            instructions,
            is_durable,
        }
    }
}

pub fn is_advance_nonce(ix: &Instruction) -> bool {
    ix.program_id == system_program::id() && ix.data.starts_with(&ADVANCE_NONCE_TAG)
}

/// Lay out the final instruction list
///
/// With `durable = Some((nonce_account, authority))` the advance-nonce
/// instruction is prepended; the result is always order-checked.
#[allow(deprecated)]
pub fn plan_instructions(
    durable: Option<(Pubkey, Pubkey)>,
    instructions: &[Instruction],
) -> Result<InstructionPlan, AssemblerError> {
    let mut planned = Vec::with_capacity(instructions.len() + 1);

    if let Some((nonce_account, authority)) = durable {
        planned.push(solana_sdk::system_instruction::advance_nonce_account(
            &nonce_account,
            &authority,
        ));
    }
    planned.extend_from_slice(instructions);

    let plan = InstructionPlan::new(planned, durable.is_some());
    sanity_check_ix_order(&plan.instructions, plan.is_durable)?;
    Ok(plan)
}

/// Validate advance-nonce placement
///
/// # Errors
///
/// `AssemblerError::InvalidInstructionOrder` if:
/// - the list is empty
/// - a durable list does not start with advance-nonce
/// - advance-nonce appears more than once
/// - a non-durable list contains advance-nonce anywhere
pub fn sanity_check_ix_order(instructions: &[Instruction], is_durable: bool) -> Result<(), AssemblerError> {
    let Some(first) = instructions.first() else {
        return Err(AssemblerError::invalid_order("instruction list is empty"));
    };

    if is_durable {
        if !is_advance_nonce(first) {
            return Err(AssemblerError::invalid_order(format!(
                "durable nonce transaction must start with advance_nonce_account, got program_id: {}",
                first.program_id
            )));
        }
        if let Some(idx) = instructions.iter().skip(1).position(is_advance_nonce) {
            return Err(AssemblerError::invalid_order(format!(
                "multiple advance_nonce_account instructions (second at position {}); only one allowed at position 0",
                idx + 1
            )));
        }
    } else if let Some(idx) = instructions.iter().position(is_advance_nonce) {
        return Err(AssemblerError::invalid_order(format!(
            "non-durable transaction should not have advance_nonce_account (found at position {idx})"
        )));
    }

    Ok(())
}
