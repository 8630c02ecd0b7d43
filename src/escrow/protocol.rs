use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    sysvar,
};
use spl_token::solana_program::program_pack::Pack;
use tracing::info;

use super::state::EscrowState;
use crate::address::derive_program_address;
use crate::client::ClientContext;
use crate::codec::AccountRecord;
use crate::errors::{ProtocolError, Result};
use crate::instruction::{EscrowInstruction, InstructionBuilder};
use crate::token;

/// Seed of the program address that owns locked tokens
pub const ESCROW_SEED: &[u8] = b"escrow";

/// Program address and bump controlling the temp token accounts
pub fn escrow_authority(escrow_program: &Pubkey) -> Result<(Pubkey, u8)> {
    Ok(derive_program_address(escrow_program, &[ESCROW_SEED])?)
}

#[derive(Debug, Clone)]
pub struct InitEscrowParams {
    pub escrow_program: Pubkey,
    /// Mint of the tokens being offered
    pub offered_mint: Pubkey,
    /// Initializer's token account the offered tokens come from
    pub source_token_account: Pubkey,
    /// Initializer's token account for the tokens they expect
    pub receiving_account: Pubkey,
    pub offered_amount: u64,
    pub expected_amount: u64,
}

#[derive(Debug, Clone)]
pub struct TakeParams {
    pub escrow_program: Pubkey,
    pub escrow_account: Pubkey,
    /// Taker's account holding the tokens the initializer expects
    pub taker_offered_account: Pubkey,
    /// Taker's account that receives the locked tokens
    pub taker_receiving_account: Pubkey,
}

/// Addresses of a freshly initialized escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowHandle {
    pub escrow_account: Pubkey,
    pub temp_token_account: Pubkey,
    pub signature: Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStatus {
    /// State account exists but the program has not initialized it
    Uninitialized,
    Initialized(EscrowState),
    /// Completed by a taker or cancelled by the initializer
    Closed,
}

/// The five instructions of escrow init, in execution order
///
/// 1. create the temp token account
/// 2. initialize it for the offered mint, owned by the initializer
/// 3. move the offered amount into it
/// 4. create the escrow state account, owned by the escrow program
/// 5. escrow init: hands the temp account to the program address
#[allow(deprecated)]
#[allow(clippy::too_many_arguments)]
pub fn init_instructions(
    payer: &Pubkey,
    initializer: &Pubkey,
    temp_token_account: &Pubkey,
    escrow_account: &Pubkey,
    params: &InitEscrowParams,
    temp_rent: u64,
    escrow_rent: u64,
) -> Result<Vec<Instruction>> {
    let mut instructions = token::create_token_account_instructions(
        payer,
        temp_token_account,
        &params.offered_mint,
        initializer,
        temp_rent,
    )?;

    instructions.push(token::transfer_instruction(
        &params.source_token_account,
        temp_token_account,
        initializer,
        params.offered_amount,
    )?);

    instructions.push(solana_sdk::system_instruction::create_account(
        payer,
        escrow_account,
        escrow_rent,
        EscrowState::LEN as u64,
        &params.escrow_program,
    ));

    let payload = EscrowInstruction::InitEscrow {
        amount: params.expected_amount,
    }
    .pack()?;
    instructions.push(Instruction {
        program_id: params.escrow_program,
        accounts: vec![
            AccountMeta::new_readonly(*initializer, true),
            AccountMeta::new(*temp_token_account, false),
            AccountMeta::new_readonly(params.receiving_account, false),
            AccountMeta::new(*escrow_account, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: payload,
    });

    Ok(instructions)
}

#[allow(clippy::too_many_arguments)]
pub fn exchange_instruction(
    escrow_program: &Pubkey,
    taker: &Pubkey,
    taker_offered_account: &Pubkey,
    taker_receiving_account: &Pubkey,
    state: &EscrowState,
    escrow_account: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<Instruction> {
    Ok(InstructionBuilder::new(*escrow_program)
        .signer(*taker)
        .writable(*taker_offered_account)
        .writable(*taker_receiving_account)
        .writable(state.temp_holder)
        .writable(state.initializer)
        .writable(state.receiving_account)
        .writable(*escrow_account)
        .readonly(spl_token::id())
        .readonly(*authority)
        .operands_raw(EscrowInstruction::Exchange { amount }.pack()?)
        .build())
}

/// Return the locked tokens to `refund_account` and close the escrow
///
/// The initializer is writable: it receives the rent of both closed accounts.
pub fn cancel_instruction(
    escrow_program: &Pubkey,
    initializer: &Pubkey,
    state: &EscrowState,
    refund_account: &Pubkey,
    escrow_account: &Pubkey,
    authority: &Pubkey,
) -> Result<Instruction> {
    Ok(InstructionBuilder::new(*escrow_program)
        .writable_signer(*initializer)
        .writable(state.temp_holder)
        .writable(*refund_account)
        .writable(*escrow_account)
        .readonly(spl_token::id())
        .readonly(*authority)
        .operands_raw(EscrowInstruction::Cancel.pack()?)
        .build())
}

/// Lock `params.offered_amount` and publish the escrow terms
///
/// All five steps go in one transaction: either every account exists
/// afterwards or none does.
pub async fn init(ctx: &ClientContext, initializer: &Keypair, params: &InitEscrowParams) -> Result<EscrowHandle> {
    let ctx = ctx.for_operation("escrow_init");
    let temp = Keypair::new();
    let escrow = Keypair::new();

    let temp_rent = ctx.rent_exempt_balance(spl_token::state::Account::LEN).await?;
    let escrow_rent = ctx.rent_exempt_balance(EscrowState::LEN).await?;

    let instructions = init_instructions(
        &ctx.payer_pubkey(),
        &initializer.pubkey(),
        &temp.pubkey(),
        &escrow.pubkey(),
        params,
        temp_rent,
        escrow_rent,
    )?;

    let signature = ctx
        .send_instructions("escrow_init", instructions, &[initializer, &temp, &escrow])
        .await?;

    info!(
        escrow = %escrow.pubkey(),
        temp = %temp.pubkey(),
        offered = params.offered_amount,
        expected = params.expected_amount,
        "escrow initialized"
    );
    Ok(EscrowHandle {
        escrow_account: escrow.pubkey(),
        temp_token_account: temp.pubkey(),
        signature,
    })
}

/// Read escrow state, treating a closed or uninitialized account as gone
pub async fn fetch_escrow(ctx: &ClientContext, escrow_account: &Pubkey) -> Result<EscrowState> {
    match ctx.fetch_record::<EscrowState>(escrow_account).await {
        Ok(state) if state.is_initialized => Ok(state),
        Ok(_) | Err(ProtocolError::NotFound(_)) => Err(ProtocolError::CancelledOrCompleted(*escrow_account)),
        Err(err) => Err(err),
    }
}

/// Complete the exchange as the taker
pub async fn take(ctx: &ClientContext, taker: &Keypair, params: &TakeParams) -> Result<Signature> {
    let ctx = ctx.for_operation("escrow_take");
    let state = fetch_escrow(&ctx, &params.escrow_account).await?;
    let (authority, _bump) = escrow_authority(&params.escrow_program)?;

    // what the taker expects to receive; the program checks it against the temp balance
    let amount = token::balance(&ctx, &state.temp_holder).await?;

    let ix = exchange_instruction(
        &params.escrow_program,
        &taker.pubkey(),
        &params.taker_offered_account,
        &params.taker_receiving_account,
        &state,
        &params.escrow_account,
        &authority,
        amount,
    )?;

    let signature = ctx.send_instructions("escrow_take", vec![ix], &[taker]).await?;
    info!(escrow = %params.escrow_account, taker = %taker.pubkey(), amount, "escrow exchanged");
    Ok(signature)
}

/// Cancel as the initializer and refund the locked tokens
pub async fn cancel(
    ctx: &ClientContext,
    escrow_program: &Pubkey,
    escrow_account: &Pubkey,
    initializer: &Keypair,
    refund_account: &Pubkey,
) -> Result<Signature> {
    let ctx = ctx.for_operation("escrow_cancel");
    let state = fetch_escrow(&ctx, escrow_account).await?;
    if state.initializer != initializer.pubkey() {
        return Err(ProtocolError::authorization(
            state.initializer,
            format!("{} did not initialize escrow {escrow_account}", initializer.pubkey()),
        ));
    }
    let (authority, _bump) = escrow_authority(escrow_program)?;

    let ix = cancel_instruction(escrow_program, &initializer.pubkey(), &state, refund_account, escrow_account, &authority)?;
    let signature = ctx.send_instructions("escrow_cancel", vec![ix], &[initializer]).await?;
    info!(escrow = %escrow_account, "escrow cancelled");
    Ok(signature)
}

pub async fn status(ctx: &ClientContext, escrow_account: &Pubkey) -> Result<EscrowStatus> {
    match ctx.fetch_record::<EscrowState>(escrow_account).await {
        Ok(state) if state.is_initialized => Ok(EscrowStatus::Initialized(state)),
        Ok(_) => Ok(EscrowStatus::Uninitialized),
        Err(ProtocolError::NotFound(_)) => Ok(EscrowStatus::Closed),
        Err(err) => Err(err),
    }
}
