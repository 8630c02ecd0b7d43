//! Typed account records on top of [`AccountSchema`]

use solana_sdk::{hash::Hash, pubkey::Pubkey};

use super::errors::LayoutError;
use super::schema::{AccountSchema, FieldDef, FieldType, FieldValue, FieldValues};

/// A typed view of one account kind
///
/// Implementors declare their schema once and convert to and from
/// [`FieldValues`]; `pack`/`unpack` then go through the schema codec so the
/// byte layout is defined in exactly one place.
pub trait AccountRecord: Sized {
    const SCHEMA: AccountSchema;

    /// Encoded size, known before the account is allocated
    const LEN: usize = Self::SCHEMA.size();

    fn to_values(&self) -> FieldValues;

    fn from_values(values: &FieldValues) -> Result<Self, LayoutError>;

    fn pack(&self) -> Result<Vec<u8>, LayoutError> {
        Self::SCHEMA.encode(&self.to_values())
    }

    fn unpack(bytes: &[u8]) -> Result<Self, LayoutError> {
        Self::from_values(&Self::SCHEMA.decode(bytes)?)
    }
}

pub fn address_value(address: &Pubkey) -> FieldValue {
    FieldValue::Bytes(address.to_bytes().to_vec())
}

pub fn hash_value(hash: &Hash) -> FieldValue {
    FieldValue::Bytes(hash.to_bytes().to_vec())
}

pub fn read_address(
    values: &FieldValues,
    schema: &'static str,
    field: &str,
) -> Result<Pubkey, LayoutError> {
    values.bytes32(schema, field).map(Pubkey::new_from_array)
}

pub fn read_hash(
    values: &FieldValues,
    schema: &'static str,
    field: &str,
) -> Result<Hash, LayoutError> {
    values.bytes32(schema, field).map(Hash::new_from_array)
}

/// Operands of instructions that carry a single amount
pub const AMOUNT_OPERANDS: AccountSchema =
    AccountSchema::new("amount_operands", &[FieldDef::new("amount", FieldType::U64)]);

/// Operands of the calculator instructions
pub const CALCULATOR_OPERANDS: AccountSchema = AccountSchema::new(
    "calculator_operands",
    &[
        FieldDef::new("a", FieldType::U64),
        FieldDef::new("b", FieldType::U64),
    ],
);
