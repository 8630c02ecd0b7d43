//! Keypair loading

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

/// Holds the fee payer keypair
///
/// Accepted file formats: the CLI's JSON byte array, raw 64 bytes, or a
/// base58 string of the 64 secret bytes.
#[derive(Clone)]
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager").field("pubkey", &self.pubkey()).finish()
    }
}

impl WalletManager {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read(path).with_context(|| format!("Failed to read keypair file: {}", path.display()))?;
        let keypair = Self::parse(&contents).with_context(|| format!("Invalid keypair file: {}", path.display()))?;
        Ok(Self::from_keypair(keypair))
    }

    pub fn parse(contents: &[u8]) -> Result<Keypair> {
        let bytes = if contents.len() == 64 {
            contents.to_vec()
        } else {
            let text = std::str::from_utf8(contents).context("Keypair file is neither raw bytes nor text")?;
            let text = text.trim();
            if text.starts_with('[') {
                serde_json::from_str::<Vec<u8>>(text).context("Failed to parse keypair JSON")?
            } else {
                bs58::decode(text).into_vec().context("Failed to decode base58 keypair")?
            }
        };

        if bytes.len() != 64 {
            bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            bail!("Invalid keypair: all-zero key rejected");
        }
        Keypair::try_from(bytes.as_slice()).context("Invalid keypair bytes")
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn keypair_arc(&self) -> Arc<Keypair> {
        Arc::clone(&self.keypair)
    }
}

/// Load a secondary signer (escrow initializer, taker, nonce authority)
pub fn load_keypair(path: impl AsRef<Path>) -> Result<Keypair> {
    let path = path.as_ref();
    let contents =
        std::fs::read(path).with_context(|| format!("Failed to read keypair file: {}", path.display()))?;
    WalletManager::parse(&contents).with_context(|| format!("Invalid keypair file: {}", path.display()))
}
