//! Binary schema codec
//!
//! Fixed-layout encode/decode for on-chain account state and instruction
//! operands. See [`AccountSchema`] for the layout rules and
//! [`AccountRecord`] for the typed layer used by the protocol modules.

pub mod errors;
pub mod record;
pub mod schema;

pub use errors::LayoutError;
pub use record::{AccountRecord, AMOUNT_OPERANDS, CALCULATOR_OPERANDS};
pub use schema::{AccountSchema, FieldDef, FieldType, FieldValue, FieldValues};
