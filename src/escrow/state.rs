use solana_sdk::pubkey::Pubkey;

use crate::codec::record::{address_value, read_address};
use crate::codec::{AccountRecord, AccountSchema, FieldDef, FieldType, FieldValue, FieldValues, LayoutError};

/// Escrow state account record (105 bytes)
///
/// Written by the escrow program on init, read by the taker, and closed by
/// exchange or cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowState {
    pub is_initialized: bool,
    pub initializer: Pubkey,
    /// Token account holding the offered tokens, owned by the program address
    pub temp_holder: Pubkey,
    /// Initializer's account that receives the taker's tokens
    pub receiving_account: Pubkey,
    pub expected_amount: u64,
}

impl AccountRecord for EscrowState {
    const SCHEMA: AccountSchema = AccountSchema::new(
        "escrow",
        &[
            FieldDef::new("is_initialized", FieldType::U8),
            FieldDef::new("initializer", FieldType::Bytes32),
            FieldDef::new("temp_holder", FieldType::Bytes32),
            FieldDef::new("receiving_account", FieldType::Bytes32),
            FieldDef::new("expected_amount", FieldType::U64),
        ],
    );

    fn to_values(&self) -> FieldValues {
        FieldValues::new()
            .with("is_initialized", FieldValue::U8(u8::from(self.is_initialized)))
            .with("initializer", address_value(&self.initializer))
            .with("temp_holder", address_value(&self.temp_holder))
            .with("receiving_account", address_value(&self.receiving_account))
            .with("expected_amount", FieldValue::U64(self.expected_amount))
    }

    fn from_values(values: &FieldValues) -> Result<Self, LayoutError> {
        let schema = Self::SCHEMA.name();
        Ok(Self {
            // any non-zero flag byte counts as initialized
            is_initialized: values.u8(schema, "is_initialized")? != 0,
            initializer: read_address(values, schema, "initializer")?,
            temp_holder: read_address(values, schema, "temp_holder")?,
            receiving_account: read_address(values, schema, "receiving_account")?,
            expected_amount: values.u64(schema, "expected_amount")?,
        })
    }
}
