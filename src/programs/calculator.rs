//! Calculator: stores `(result, a, b)` for the last add or sub

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
use tracing::info;

use super::{ensure_program_account, ProgramAccount};
use crate::address::AddressProvenance;
use crate::client::ClientContext;
use crate::codec::{AccountRecord, AccountSchema, FieldDef, FieldType, FieldValue, FieldValues, LayoutError};
use crate::errors::Result;
use crate::instruction::{CalculatorInstruction, InstructionBuilder};
use crate::transport::SimulationOutcome;

/// Calculator state account record (24 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalculatorState {
    pub result: u64,
    pub a: u64,
    pub b: u64,
}

impl AccountRecord for CalculatorState {
    const SCHEMA: AccountSchema = AccountSchema::new(
        "calculator",
        &[
            FieldDef::new("result", FieldType::U64),
            FieldDef::new("a", FieldType::U64),
            FieldDef::new("b", FieldType::U64),
        ],
    );

    fn to_values(&self) -> FieldValues {
        FieldValues::new()
            .with("result", FieldValue::U64(self.result))
            .with("a", FieldValue::U64(self.a))
            .with("b", FieldValue::U64(self.b))
    }

    fn from_values(values: &FieldValues) -> std::result::Result<Self, LayoutError> {
        let schema = Self::SCHEMA.name();
        Ok(Self {
            result: values.u64(schema, "result")?,
            a: values.u64(schema, "a")?,
            b: values.u64(schema, "b")?,
        })
    }
}

pub fn calculator_instruction(
    program_id: &Pubkey,
    account: &Pubkey,
    operation: CalculatorInstruction,
) -> Result<Instruction> {
    Ok(InstructionBuilder::new(*program_id)
        .writable(*account)
        .operands_raw(operation.pack()?)
        .build())
}

pub async fn setup(ctx: &ClientContext, program_id: &Pubkey, policy: &AddressProvenance) -> Result<ProgramAccount> {
    ensure_program_account(ctx, program_id, policy, CalculatorState::LEN, "calculator").await
}

async fn execute(
    ctx: &ClientContext,
    program_id: &Pubkey,
    account: &Pubkey,
    operation: CalculatorInstruction,
) -> Result<Signature> {
    let ix = calculator_instruction(program_id, account, operation)?;
    let signature = ctx.send_instructions("calculate", vec![ix], &[]).await?;
    let (a, b) = operation.operands();
    info!(account = %account, op = operation.discriminant(), a, b, "calculation sent");
    Ok(signature)
}

pub async fn add(ctx: &ClientContext, program_id: &Pubkey, account: &Pubkey, a: u64, b: u64) -> Result<Signature> {
    execute(ctx, program_id, account, CalculatorInstruction::Add { a, b }).await
}

pub async fn sub(ctx: &ClientContext, program_id: &Pubkey, account: &Pubkey, a: u64, b: u64) -> Result<Signature> {
    execute(ctx, program_id, account, CalculatorInstruction::Sub { a, b }).await
}

/// Dry-run a calculation; the stored state is left as it was
pub async fn simulate(
    ctx: &ClientContext,
    program_id: &Pubkey,
    account: &Pubkey,
    operation: CalculatorInstruction,
) -> Result<SimulationOutcome> {
    let ix = calculator_instruction(program_id, account, operation)?;
    ctx.simulate_instructions("calculate", vec![ix]).await
}

pub async fn simulate_add(
    ctx: &ClientContext,
    program_id: &Pubkey,
    account: &Pubkey,
    a: u64,
    b: u64,
) -> Result<SimulationOutcome> {
    simulate(ctx, program_id, account, CalculatorInstruction::Add { a, b }).await
}

pub async fn result(ctx: &ClientContext, account: &Pubkey) -> Result<CalculatorState> {
    ctx.fetch_record(account).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculator_layout() {
        let state = CalculatorState { result: 7, a: 3, b: 4 };
        let bytes = state.pack().unwrap();
        assert_eq!(CalculatorState::LEN, 24);
        assert_eq!(&bytes[0..8], &7u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &3u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &4u64.to_le_bytes());
    }

    #[test]
    fn test_calculator_instruction_payload() {
        let ix = calculator_instruction(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            CalculatorInstruction::Sub { a: 9, b: 2 },
        )
        .unwrap();
        assert_eq!(ix.data.len(), 17);
        assert_eq!(ix.data[0], 1);
        assert_eq!(CalculatorInstruction::unpack(&ix.data).unwrap(), CalculatorInstruction::Sub { a: 9, b: 2 });
    }
}
