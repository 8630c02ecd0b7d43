//! Deterministic address derivation
//!
//! Two derivations are supported:
//!
//! - **Seeded** addresses: `sha256(base || seed || owner)`. The base key
//!   authorizes creation; no keypair exists for the result.
//! - **Program** addresses: `sha256(seeds.. || bump || program || marker)`,
//!   searched from bump 255 downward until the hash is not a valid ed25519
//!   point, so no private key can ever sign for it.
//!
//! Both are pure functions of their inputs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use thiserror::Error;
use tracing::debug;

/// Maximum length of a single seed
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds for a program address, bump included
pub const MAX_SEEDS: usize = 16;

/// Suffix hashed into every program address
pub const PDA_MARKER: &[u8; 21] = b"ProgramDerivedAddress";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("seed is {len} bytes, maximum is {MAX_SEED_LEN}")]
    SeedTooLong { len: usize },

    #[error("{count} seeds given, maximum is {MAX_SEEDS} including the bump")]
    TooManySeeds { count: usize },

    #[error("owner {0} ends with the program-address marker")]
    IllegalOwner(Pubkey),

    #[error("seeds hash to a point on the ed25519 curve")]
    OnCurve,

    #[error("no bump in 0..=255 yields an off-curve address for program {0}")]
    NoViableBump(Pubkey),
}

/// Derive an address from a base key, a seed string and an owning program
pub fn derive_with_seed(base: &Pubkey, seed: &str, owner: &Pubkey) -> Result<Pubkey, DerivationError> {
    if seed.len() > MAX_SEED_LEN {
        return Err(DerivationError::SeedTooLong { len: seed.len() });
    }

    let owner_bytes = owner.as_ref();
    if owner_bytes.ends_with(PDA_MARKER) {
        return Err(DerivationError::IllegalOwner(*owner));
    }

    let digest = Sha256::new()
        .chain_update(base.as_ref())
        .chain_update(seed.as_bytes())
        .chain_update(owner_bytes)
        .finalize();
    Ok(Pubkey::new_from_array(digest.into()))
}

/// Hash `seeds` into a program address, failing if the result is on the curve
pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey, DerivationError> {
    if seeds.len() > MAX_SEEDS {
        return Err(DerivationError::TooManySeeds { count: seeds.len() });
    }
    if let Some(seed) = seeds.iter().find(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(DerivationError::SeedTooLong { len: seed.len() });
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);
    let candidate = Pubkey::new_from_array(hasher.finalize().into());

    if candidate.is_on_curve() {
        return Err(DerivationError::OnCurve);
    }
    Ok(candidate)
}

/// Search for the canonical program address and its bump
///
/// Bumps are tried from 255 down to 0; the first off-curve result wins.
pub fn derive_program_address(program_id: &Pubkey, seeds: &[&[u8]]) -> Result<(Pubkey, u8), DerivationError> {
    if seeds.len() + 1 > MAX_SEEDS {
        return Err(DerivationError::TooManySeeds { count: seeds.len() + 1 });
    }

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);

        match create_program_address(&with_bump, program_id) {
            Ok(address) => {
                debug!(program = %program_id, %address, bump, "derived program address");
                return Ok((address, bump));
            }
            Err(DerivationError::OnCurve) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(DerivationError::NoViableBump(*program_id))
}

/// How a new program-owned account gets its address
///
/// This is a deployment-level policy: the same policy is used for every
/// account of a kind, it is never chosen at random per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressProvenance {
    /// Fresh keypair; the new account must co-sign its creation
    Random,
    /// Derived from the fee payer, a seed and the owning program
    Seeded { seed: String },
}

impl AddressProvenance {
    pub fn seeded(seed: impl Into<String>) -> Self {
        Self::Seeded { seed: seed.into() }
    }
}

/// An address produced under an [`AddressProvenance`] policy
#[derive(Debug)]
pub struct ProvisionedAddress {
    pub address: Pubkey,
    /// Keypair that must co-sign creation (random provenance only)
    pub signer: Option<Keypair>,
    /// Seed the address was derived with (seeded provenance only)
    pub seed: Option<String>,
}

/// Resolve a provenance policy into a concrete address
pub fn provision_address(
    policy: &AddressProvenance,
    base: &Pubkey,
    owner: &Pubkey,
) -> Result<ProvisionedAddress, DerivationError> {
    match policy {
        AddressProvenance::Random => {
            let keypair = Keypair::new();
            Ok(ProvisionedAddress {
                address: keypair.pubkey(),
                signer: Some(keypair),
                seed: None,
            })
        }
        AddressProvenance::Seeded { seed } => Ok(ProvisionedAddress {
            address: derive_with_seed(base, seed, owner)?,
            signer: None,
            seed: Some(seed.clone()),
        }),
    }
}
