//! Instruction construction
//!
//! An instruction is pure data: a target program, an ordered list of account
//! metas (the program's positional contract) and a payload whose first byte
//! selects the operation. Nothing here talks to the ledger.

pub mod builder;
pub mod payload;

pub use builder::{build, InstructionBuilder};
pub use payload::{CalculatorInstruction, EscrowInstruction, GreetingInstruction};
