//! Configuration loading
//!
//! Settings come from a TOML file, optionally preceded by a `.env` file.
//! `TXKIT_RPC_URL` and `TXKIT_KEYPAIR` override the file values.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};

use crate::address::{AddressProvenance, MAX_SEED_LEN};
use crate::transport::ExponentialBackoff;

pub const ENV_RPC_URL: &str = "TXKIT_RPC_URL";
pub const ENV_KEYPAIR: &str = "TXKIT_KEYPAIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub programs: ProgramsConfig,

    #[serde(default)]
    pub accounts: AccountsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on the confirmation poll
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Fee payer keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

/// Deployed program ids, base58
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramsConfig {
    pub greeting: Option<String>,
    pub calculator: Option<String>,
    pub escrow: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// How greeting and calculator state accounts get their address
    #[serde(default = "default_provenance")]
    pub provenance: ProvenanceKind,

    #[serde(default = "default_greeting_seed")]
    pub greeting_seed: String,

    #[serde(default = "default_calculator_seed")]
    pub calculator_seed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    Random,
    Seeded,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8899".to_string()
}
fn default_commitment() -> String {
    "confirmed".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_confirm_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    200
}
fn default_max_backoff() -> u64 {
    5_000
}
fn default_keypair_path() -> String {
    "~/.config/solana/id.json".to_string()
}
fn default_provenance() -> ProvenanceKind {
    ProvenanceKind::Seeded
}
fn default_greeting_seed() -> String {
    "hello".to_string()
}
fn default_calculator_seed() -> String {
    "calculator_program_seed".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            request_timeout_secs: default_request_timeout(),
            confirm_timeout_secs: default_confirm_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            provenance: default_provenance(),
            greeting_seed: default_greeting_seed(),
            calculator_seed: default_calculator_seed(),
        }
    }
}

impl RpcConfig {
    pub fn commitment(&self) -> anyhow::Result<CommitmentConfig> {
        CommitmentConfig::from_str(&self.commitment)
            .map_err(|_| anyhow::anyhow!("unknown commitment level: {}", self.commitment))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.initial_backoff_ms, self.max_backoff_ms, self.max_retries)
    }
}

impl AccountsConfig {
    pub fn greeting_policy(&self) -> AddressProvenance {
        self.policy(&self.greeting_seed)
    }

    pub fn calculator_policy(&self) -> AddressProvenance {
        self.policy(&self.calculator_seed)
    }

    fn policy(&self, seed: &str) -> AddressProvenance {
        match self.provenance {
            ProvenanceKind::Random => AddressProvenance::Random,
            ProvenanceKind::Seeded => AddressProvenance::seeded(seed),
        }
    }
}

impl ProgramsConfig {
    pub fn greeting(&self) -> anyhow::Result<Pubkey> {
        required_program("greeting", self.greeting.as_deref())
    }

    pub fn calculator(&self) -> anyhow::Result<Pubkey> {
        required_program("calculator", self.calculator.as_deref())
    }

    pub fn escrow(&self) -> anyhow::Result<Pubkey> {
        required_program("escrow", self.escrow.as_deref())
    }
}

fn required_program(name: &str, value: Option<&str>) -> anyhow::Result<Pubkey> {
    let value = value.with_context(|| format!("programs.{name} is not configured"))?;
    Pubkey::from_str(value).with_context(|| format!("programs.{name} is not a valid address: {value}"))
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load `.env`, the TOML file if given, then apply env overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_RPC_URL) {
            self.rpc.url = url;
        }
        if let Ok(path) = std::env::var(ENV_KEYPAIR) {
            self.wallet.keypair_path = path;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.url.is_empty() {
            bail!("rpc.url must not be empty");
        }
        self.rpc.commitment()?;
        if self.rpc.confirm_timeout_secs == 0 {
            bail!("rpc.confirm_timeout_secs must be positive");
        }
        if self.rpc.initial_backoff_ms > self.rpc.max_backoff_ms {
            bail!(
                "rpc.initial_backoff_ms ({}) exceeds rpc.max_backoff_ms ({})",
                self.rpc.initial_backoff_ms,
                self.rpc.max_backoff_ms
            );
        }
        for (name, value) in [
            ("greeting", &self.programs.greeting),
            ("calculator", &self.programs.calculator),
            ("escrow", &self.programs.escrow),
        ] {
            if value.is_some() {
                required_program(name, value.as_deref())?;
            }
        }
        for (name, seed) in [
            ("greeting_seed", &self.accounts.greeting_seed),
            ("calculator_seed", &self.accounts.calculator_seed),
        ] {
            if seed.len() > MAX_SEED_LEN {
                bail!("accounts.{name} is {} bytes, at most {MAX_SEED_LEN} allowed", seed.len());
            }
        }
        Ok(())
    }

    /// Keypair path with a leading `~` expanded
    pub fn keypair_path(&self) -> String {
        expand_home(&self.wallet.keypair_path)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}/{rest}"),
        _ => path.to_string(),
    }
}
