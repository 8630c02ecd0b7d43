//! Clients for the demo programs
//!
//! Both programs keep their state in one account the client allocates
//! before the first call. How that account's address is chosen is a
//! deployment policy ([`AddressProvenance`]), read from configuration.

pub mod calculator;
pub mod greeting;

use solana_sdk::{pubkey::Pubkey, signature::Signer};
use tracing::debug;

use crate::address::{provision_address, AddressProvenance};
use crate::client::ClientContext;
use crate::errors::{ProtocolError, Result};

/// A program-owned state account ready for use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAccount {
    pub address: Pubkey,
    /// `false` when a seeded account from an earlier run was reused
    pub created: bool,
}

/// Make sure a state account of `size` bytes owned by `program_id` exists
///
/// Seeded addresses are stable across runs, so an existing account is
/// reused after checking its owner and size. Random addresses always
/// allocate a new account, co-signed by its fresh keypair.
#[allow(deprecated)]
pub async fn ensure_program_account(
    ctx: &ClientContext,
    program_id: &Pubkey,
    policy: &AddressProvenance,
    size: usize,
    kind: &str,
) -> Result<ProgramAccount> {
    ctx.check_program(program_id).await?;

    let payer = ctx.payer_pubkey();
    let provisioned = provision_address(policy, &payer, program_id)?;
    let address = provisioned.address;

    if provisioned.seed.is_some() {
        match ctx.fetch_account(&address).await {
            Ok(account) => {
                if account.owner != *program_id {
                    return Err(ProtocolError::configuration(format!(
                        "{kind} account {address} is owned by {}, not {program_id}",
                        account.owner
                    )));
                }
                if account.data.len() != size {
                    return Err(ProtocolError::configuration(format!(
                        "{kind} account {address} holds {} bytes, expected {size}",
                        account.data.len()
                    )));
                }
                debug!(kind, address = %address, "reusing seeded account");
                return Ok(ProgramAccount { address, created: false });
            }
            Err(ProtocolError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
    }

    let lamports = ctx.rent_exempt_balance(size).await?;
    ctx.ensure_funded(lamports).await?;
    let ix = match &provisioned.seed {
        Some(seed) => solana_sdk::system_instruction::create_account_with_seed(
            &payer,
            &address,
            &payer,
            seed,
            lamports,
            size as u64,
            program_id,
        ),
        None => solana_sdk::system_instruction::create_account(&payer, &address, lamports, size as u64, program_id),
    };

    let signers: Vec<&dyn Signer> = provisioned
        .signer
        .as_ref()
        .map(|keypair| keypair as &dyn Signer)
        .into_iter()
        .collect();
    ctx.send_instructions("create_program_account", vec![ix], &signers)
        .await?;
    ctx.logger()
        .log_account_created(kind, &address.to_string(), size, lamports);

    Ok(ProgramAccount { address, created: true })
}
