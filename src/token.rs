//! Token program helpers used by the escrow and multisig flows

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as TokenAccount, Mint};

use crate::client::ClientContext;
use crate::codec::LayoutError;
use crate::errors::{ProtocolError, Result};

fn token_ix(result: std::result::Result<Instruction, spl_token::solana_program::program_error::ProgramError>) -> Result<Instruction> {
    result.map_err(|e| ProtocolError::instruction_failed(spl_token::id(), e.to_string()))
}

/// Allocate a token account at `account` and bind it to `mint` and `owner`
#[allow(deprecated)]
pub fn create_token_account_instructions(
    payer: &Pubkey,
    account: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
    lamports: u64,
) -> Result<Vec<Instruction>> {
    Ok(vec![
        solana_sdk::system_instruction::create_account(
            payer,
            account,
            lamports,
            TokenAccount::LEN as u64,
            &spl_token::id(),
        ),
        token_ix(spl_token::instruction::initialize_account(
            &spl_token::id(),
            account,
            mint,
            owner,
        ))?,
    ])
}

pub fn transfer_instruction(source: &Pubkey, destination: &Pubkey, owner: &Pubkey, amount: u64) -> Result<Instruction> {
    token_ix(spl_token::instruction::transfer(
        &spl_token::id(),
        source,
        destination,
        owner,
        &[],
        amount,
    ))
}

#[allow(deprecated)]
pub async fn create_mint(ctx: &ClientContext, mint: &Keypair, authority: &Pubkey, decimals: u8) -> Result<Signature> {
    let lamports = ctx.rent_exempt_balance(Mint::LEN).await?;
    let instructions = vec![
        solana_sdk::system_instruction::create_account(
            &ctx.payer_pubkey(),
            &mint.pubkey(),
            lamports,
            Mint::LEN as u64,
            &spl_token::id(),
        ),
        token_ix(spl_token::instruction::initialize_mint(
            &spl_token::id(),
            &mint.pubkey(),
            authority,
            None,
            decimals,
        ))?,
    ];

    let signature = ctx.send_instructions("create_mint", instructions, &[mint]).await?;
    ctx.logger()
        .log_account_created("mint", &mint.pubkey().to_string(), Mint::LEN, lamports);
    Ok(signature)
}

pub async fn create_token_account(
    ctx: &ClientContext,
    account: &Keypair,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<Signature> {
    let lamports = ctx.rent_exempt_balance(TokenAccount::LEN).await?;
    let instructions =
        create_token_account_instructions(&ctx.payer_pubkey(), &account.pubkey(), mint, owner, lamports)?;

    let signature = ctx
        .send_instructions("create_token_account", instructions, &[account])
        .await?;
    ctx.logger()
        .log_account_created("token_account", &account.pubkey().to_string(), TokenAccount::LEN, lamports);
    Ok(signature)
}

pub async fn mint_to(
    ctx: &ClientContext,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Keypair,
    amount: u64,
) -> Result<Signature> {
    let ix = token_ix(spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        destination,
        &authority.pubkey(),
        &[],
        amount,
    ))?;
    ctx.send_instructions("mint_to", vec![ix], &[authority]).await
}

pub async fn transfer(
    ctx: &ClientContext,
    source: &Pubkey,
    destination: &Pubkey,
    owner: &Keypair,
    amount: u64,
) -> Result<Signature> {
    let ix = transfer_instruction(source, destination, &owner.pubkey(), amount)?;
    ctx.send_instructions("token_transfer", vec![ix], &[owner]).await
}

/// Decode a token account
pub fn decode_token_account(address: &Pubkey, data: &[u8]) -> Result<TokenAccount> {
    if data.len() != TokenAccount::LEN {
        return Err(LayoutError::SizeMismatch {
            schema: "token_account",
            expected: TokenAccount::LEN,
            actual: data.len(),
        }
        .into());
    }
    TokenAccount::unpack(data)
        .map_err(|e| ProtocolError::configuration(format!("token account {address} is not usable: {e}")))
}

pub async fn token_account(ctx: &ClientContext, address: &Pubkey) -> Result<TokenAccount> {
    let account = ctx.fetch_account(address).await?;
    if account.owner != spl_token::id() {
        return Err(ProtocolError::configuration(format!(
            "account {address} is owned by {}, not the token program",
            account.owner
        )));
    }
    decode_token_account(address, &account.data)
}

pub async fn balance(ctx: &ClientContext, address: &Pubkey) -> Result<u64> {
    Ok(token_account(ctx, address).await?.amount)
}
