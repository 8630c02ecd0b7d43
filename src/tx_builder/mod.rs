//! Transaction assembly
//!
//! - **context**: freshness anchors (recent blockhash or durable nonce)
//! - **instructions**: advance-nonce planning and ordering checks
//! - **assembler**: the `Empty -> ... -> Submitted` state machine
//! - **output**: the finalized, broadcastable transaction
//! - **simulate**: nonce-free simulation copies
//! - **errors**: assembly error taxonomy
//!
//! ```rust
//! use solana_sdk::{hash::Hash, instruction::{AccountMeta, Instruction}, pubkey::Pubkey};
//! use solana_sdk::signature::{Keypair, Signer};
//! use txkit::tx_builder::{FreshnessAnchor, TransactionAssembler};
//!
//! let payer = Keypair::new();
//! let ix = Instruction::new_with_bytes(
//!     Pubkey::new_unique(),
//!     &[0],
//!     vec![AccountMeta::new(Pubkey::new_unique(), false)],
//! );
//!
//! let mut assembler = TransactionAssembler::with_anchor(
//!     payer.pubkey(),
//!     FreshnessAnchor::RecentBlockhash(Hash::new_unique()),
//! );
//! assembler.add(ix).unwrap();
//! assembler.sign(&payer).unwrap();
//! let signed = assembler.finalize().unwrap();
//! assert!(signed.transaction.verify().is_ok());
//! ```

pub mod assembler;
pub mod context;
pub mod errors;
pub mod instructions;
pub mod output;
pub mod simulate;

pub use assembler::{AssemblerState, FrozenMessage, TransactionAssembler};
pub use context::{DurableNonceAnchor, FreshnessAnchor};
pub use errors::AssemblerError;
pub use instructions::{is_advance_nonce, plan_instructions, sanity_check_ix_order, InstructionPlan};
pub use output::SignedTransaction;
pub use simulate::{decompile_instructions, strip_nonce_for_simulation};
