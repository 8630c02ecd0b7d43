//! Two-party token escrow
//!
//! The initializer locks tokens of mint X in a temporary token account that
//! the escrow program controls through its program address (seed
//! `b"escrow"`). A taker who sends the expected amount of mint Y receives
//! the locked tokens in the same transaction; until then the initializer
//! can cancel and get the tokens back.
//!
//! ```text
//! Uninitialized -> Initialized -> Closed (completed or cancelled)
//! ```

pub mod protocol;
pub mod state;

pub use protocol::{
    cancel, cancel_instruction, escrow_authority, exchange_instruction, fetch_escrow, init, init_instructions, status,
    take, EscrowHandle, EscrowStatus, InitEscrowParams, TakeParams, ESCROW_SEED,
};
pub use state::EscrowState;
