//! Greeting counter: every call increments a `u32` in the greeted account

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
use tracing::info;

use super::{ensure_program_account, ProgramAccount};
use crate::address::AddressProvenance;
use crate::client::ClientContext;
use crate::codec::{AccountRecord, AccountSchema, FieldDef, FieldType, FieldValue, FieldValues, LayoutError};
use crate::errors::Result;
use crate::instruction::{GreetingInstruction, InstructionBuilder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterState {
    pub counter: u32,
}

impl AccountRecord for CounterState {
    const SCHEMA: AccountSchema = AccountSchema::new("counter", &[FieldDef::new("counter", FieldType::U32)]);

    fn to_values(&self) -> FieldValues {
        FieldValues::new().with("counter", FieldValue::U32(self.counter))
    }

    fn from_values(values: &FieldValues) -> std::result::Result<Self, LayoutError> {
        Ok(Self {
            counter: values.u32(Self::SCHEMA.name(), "counter")?,
        })
    }
}

pub fn greet_instruction(program_id: &Pubkey, greeted: &Pubkey) -> Instruction {
    InstructionBuilder::new(*program_id)
        .writable(*greeted)
        .operands_raw(GreetingInstruction::Greet.pack())
        .build()
}

/// Allocate (or reuse) the greeted account
pub async fn setup(ctx: &ClientContext, program_id: &Pubkey, policy: &AddressProvenance) -> Result<ProgramAccount> {
    ensure_program_account(ctx, program_id, policy, CounterState::LEN, "greeting").await
}

pub async fn say_hello(ctx: &ClientContext, program_id: &Pubkey, greeted: &Pubkey) -> Result<Signature> {
    let ix = greet_instruction(program_id, greeted);
    let signature = ctx.send_instructions("say_hello", vec![ix], &[]).await?;
    info!(greeted = %greeted, signature = %signature, "greeted");
    Ok(signature)
}

/// Current greeting count
pub async fn report_greetings(ctx: &ClientContext, greeted: &Pubkey) -> Result<u32> {
    let state: CounterState = ctx.fetch_record(greeted).await?;
    info!(greeted = %greeted, count = state.counter, "greeting count");
    Ok(state.counter)
}
