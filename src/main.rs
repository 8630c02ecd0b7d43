//! txkit command line
//!
//! Drives the greeting, calculator, durable-nonce and escrow flows against
//! an RPC node, and decodes account state.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txkit::codec::AccountRecord;
use txkit::config::Config;
use txkit::escrow::{self, EscrowState, EscrowStatus, InitEscrowParams, TakeParams};
use txkit::multisig::MultisigAuthority;
use txkit::nonce::{self, NonceState};
use txkit::programs::calculator::{self, CalculatorState};
use txkit::programs::greeting::{self, CounterState};
use txkit::token::decode_token_account;
use txkit::transport::RpcTransport;
use txkit::wallet::{load_keypair, WalletManager};
use txkit::ClientContext;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TXKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Enable debug logging for this crate
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Greet the counter account once and print the count
    Greet,

    /// Run a calculation and print the stored state
    Calculate {
        #[arg(value_enum)]
        op: CalcOp,
        a: u64,
        b: u64,
        /// Dry run only; the stored state is not changed
        #[arg(long)]
        simulate: bool,
    },

    #[command(subcommand)]
    Nonce(NonceCommand),

    #[command(subcommand)]
    Escrow(EscrowCommand),

    /// Fetch an account and decode it
    Decode {
        #[arg(value_enum)]
        kind: AccountKind,
        address: String,
        /// Also print the raw bytes as hex
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand, Debug)]
enum NonceCommand {
    /// Create a durable nonce account owned by the system program
    Create {
        /// Nonce authority; defaults to the fee payer
        #[arg(long)]
        authority: Option<String>,
    },
    /// Print a nonce account's authority and current value
    Show { address: String },
}

#[derive(Subcommand, Debug)]
enum EscrowCommand {
    /// Lock tokens and publish the terms
    Init {
        #[arg(long)]
        mint: String,
        /// Initializer's token account holding the offered tokens
        #[arg(long)]
        source: String,
        /// Initializer's token account for the expected tokens
        #[arg(long)]
        receiving: String,
        #[arg(long)]
        offered: u64,
        #[arg(long)]
        expected: u64,
        /// Initializer keypair file; defaults to the fee payer
        #[arg(long)]
        initializer: Option<PathBuf>,
    },
    /// Complete an escrow as the taker
    Take {
        escrow: String,
        /// Taker's token account holding the expected tokens
        #[arg(long)]
        offered_account: String,
        /// Taker's token account for the locked tokens
        #[arg(long)]
        receiving_account: String,
        /// Taker keypair file; defaults to the fee payer
        #[arg(long)]
        taker: Option<PathBuf>,
    },
    /// Cancel an escrow and refund the locked tokens
    Cancel {
        escrow: String,
        #[arg(long)]
        refund: String,
        #[arg(long)]
        initializer: Option<PathBuf>,
    },
    Show { escrow: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CalcOp {
    Add,
    Sub,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AccountKind {
    Counter,
    Calculator,
    Escrow,
    Nonce,
    Multisig,
    Token,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs);

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let wallet = WalletManager::from_file(config.keypair_path()).context("Failed to load wallet")?;
    info!(payer = %wallet.pubkey(), rpc = %config.rpc.url, "txkit starting");

    let transport = RpcTransport::new(
        config.rpc.url.clone(),
        config.rpc.commitment()?,
        config.rpc.request_timeout(),
    )
    .with_confirm_timeout(config.rpc.confirm_timeout());
    let ctx = ClientContext::new(Arc::new(transport), wallet.keypair_arc()).with_backoff(config.rpc.backoff());

    match args.command {
        Command::Greet => run_greet(&ctx, &config).await,
        Command::Calculate { op, a, b, simulate } => run_calculate(&ctx, &config, op, a, b, simulate).await,
        Command::Nonce(command) => run_nonce(&ctx, command).await,
        Command::Escrow(command) => run_escrow(&ctx, &config, command).await,
        Command::Decode { kind, address, raw } => run_decode(&ctx, kind, &address, raw).await,
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_filter = if verbose { "txkit=debug,info" } else { "txkit=info,warn" };
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).init();
    }
}

fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("Invalid {what} address: {value}"))
}

fn signer_or_payer(path: Option<&PathBuf>, ctx: &ClientContext) -> Result<Keypair> {
    match path {
        Some(path) => load_keypair(path),
        None => Ok(ctx.payer().insecure_clone()),
    }
}

async fn run_greet(ctx: &ClientContext, config: &Config) -> Result<()> {
    let program_id = config.programs.greeting()?;
    let account = greeting::setup(ctx, &program_id, &config.accounts.greeting_policy()).await?;
    greeting::say_hello(ctx, &program_id, &account.address).await?;
    let count = greeting::report_greetings(ctx, &account.address).await?;
    println!("{} has been greeted {count} time(s)", account.address);
    Ok(())
}

async fn run_calculate(ctx: &ClientContext, config: &Config, op: CalcOp, a: u64, b: u64, simulate: bool) -> Result<()> {
    let program_id = config.programs.calculator()?;
    let account = calculator::setup(ctx, &program_id, &config.accounts.calculator_policy()).await?;
    let operation = match op {
        CalcOp::Add => txkit::instruction::CalculatorInstruction::Add { a, b },
        CalcOp::Sub => txkit::instruction::CalculatorInstruction::Sub { a, b },
    };

    if simulate {
        let outcome = calculator::simulate(ctx, &program_id, &account.address, operation).await?;
        println!("simulation success: {}", outcome.success);
        if let Some(error) = outcome.error {
            println!("error: {error}");
        }
        for line in outcome.logs {
            println!("  {line}");
        }
        return Ok(());
    }

    match op {
        CalcOp::Add => calculator::add(ctx, &program_id, &account.address, a, b).await?,
        CalcOp::Sub => calculator::sub(ctx, &program_id, &account.address, a, b).await?,
    };
    let state = calculator::result(ctx, &account.address).await?;
    println!("result={} a={} b={}", state.result, state.a, state.b);
    Ok(())
}

async fn run_nonce(ctx: &ClientContext, command: NonceCommand) -> Result<()> {
    match command {
        NonceCommand::Create { authority } => {
            let authority = match authority {
                Some(value) => parse_pubkey(&value, "authority")?,
                None => ctx.payer_pubkey(),
            };
            let nonce_account = Keypair::new();
            nonce::create_nonce_account(ctx, &nonce_account, &authority).await?;
            let state = nonce::fetch_nonce(ctx, &nonce_account.pubkey()).await?;
            println!("nonce account: {}", nonce_account.pubkey());
            println!("authority:     {}", state.authorized);
            println!("nonce value:   {}", state.nonce_value);
        }
        NonceCommand::Show { address } => {
            let address = parse_pubkey(&address, "nonce")?;
            let state = nonce::fetch_nonce(ctx, &address).await?;
            println!("authority:   {}", state.authorized);
            println!("nonce value: {}", state.nonce_value);
            println!("fee/sig:     {}", state.fee_per_signature);
        }
    }
    Ok(())
}

async fn run_escrow(ctx: &ClientContext, config: &Config, command: EscrowCommand) -> Result<()> {
    let escrow_program = config.programs.escrow()?;
    match command {
        EscrowCommand::Init {
            mint,
            source,
            receiving,
            offered,
            expected,
            initializer,
        } => {
            let initializer = signer_or_payer(initializer.as_ref(), ctx)?;
            let params = InitEscrowParams {
                escrow_program,
                offered_mint: parse_pubkey(&mint, "mint")?,
                source_token_account: parse_pubkey(&source, "source")?,
                receiving_account: parse_pubkey(&receiving, "receiving")?,
                offered_amount: offered,
                expected_amount: expected,
            };
            let handle = escrow::init(ctx, &initializer, &params).await?;
            println!("escrow account: {}", handle.escrow_account);
            println!("temp account:   {}", handle.temp_token_account);
            println!("signature:      {}", handle.signature);
        }
        EscrowCommand::Take {
            escrow,
            offered_account,
            receiving_account,
            taker,
        } => {
            let taker = signer_or_payer(taker.as_ref(), ctx)?;
            let params = TakeParams {
                escrow_program,
                escrow_account: parse_pubkey(&escrow, "escrow")?,
                taker_offered_account: parse_pubkey(&offered_account, "offered")?,
                taker_receiving_account: parse_pubkey(&receiving_account, "receiving")?,
            };
            let signature = escrow::take(ctx, &taker, &params).await?;
            println!("exchanged: {signature}");
        }
        EscrowCommand::Cancel {
            escrow,
            refund,
            initializer,
        } => {
            let initializer = signer_or_payer(initializer.as_ref(), ctx)?;
            let escrow_account = parse_pubkey(&escrow, "escrow")?;
            let refund = parse_pubkey(&refund, "refund")?;
            let signature = escrow::cancel(ctx, &escrow_program, &escrow_account, &initializer, &refund).await?;
            println!("cancelled: {signature}");
        }
        EscrowCommand::Show { escrow } => {
            let escrow_account = parse_pubkey(&escrow, "escrow")?;
            match escrow::status(ctx, &escrow_account).await? {
                EscrowStatus::Initialized(state) => print_escrow(&state),
                EscrowStatus::Uninitialized => println!("escrow {escrow_account} is allocated but not initialized"),
                EscrowStatus::Closed => println!("escrow {escrow_account} is closed"),
            }
        }
    }
    Ok(())
}

fn print_escrow(state: &EscrowState) {
    println!("initialized:     {}", state.is_initialized);
    println!("initializer:     {}", state.initializer);
    println!("temp holder:     {}", state.temp_holder);
    println!("receiving:       {}", state.receiving_account);
    println!("expected amount: {}", state.expected_amount);
}

async fn run_decode(ctx: &ClientContext, kind: AccountKind, address: &str, raw: bool) -> Result<()> {
    let address = parse_pubkey(address, "account")?;
    let account = ctx.fetch_account(&address).await?;
    println!("owner: {}  lamports: {}  size: {}", account.owner, account.lamports, account.data.len());
    if raw {
        println!("{}", hex::encode(&account.data));
    }

    match kind {
        AccountKind::Counter => {
            let state = CounterState::unpack(&account.data)?;
            println!("counter: {}", state.counter);
        }
        AccountKind::Calculator => {
            let state = CalculatorState::unpack(&account.data)?;
            println!("result={} a={} b={}", state.result, state.a, state.b);
        }
        AccountKind::Escrow => print_escrow(&EscrowState::unpack(&account.data)?),
        AccountKind::Nonce => {
            let state = NonceState::unpack(&account.data)?;
            println!("version:     {}", state.version);
            println!("initialized: {}", state.is_initialized());
            println!("authority:   {}", state.authorized);
            println!("nonce value: {}", state.nonce_value);
            println!("fee/sig:     {}", state.fee_per_signature);
        }
        AccountKind::Multisig => {
            let authority = MultisigAuthority::from_account_bytes(address, &account.data)?;
            println!("threshold: {} of {}", authority.threshold(), authority.signers().len());
            for signer in authority.signers() {
                println!("  {signer}");
            }
        }
        AccountKind::Token => {
            let state = decode_token_account(&address, &account.data)?;
            println!("mint:   {}", state.mint);
            println!("owner:  {}", state.owner);
            println!("amount: {}", state.amount);
        }
    }
    Ok(())
}
