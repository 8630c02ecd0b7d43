//! In-memory ledger for tests
//!
//! [`MockLedger`] implements [`LedgerTransport`] and executes the programs
//! the protocol flows talk to: the system program (accounts, transfers,
//! durable nonces), the token program (mints, accounts, multisig
//! authorities, transfers, mint-to), and the escrow, greeting and calculator
//! programs. Each transaction is checked the way a node checks it
//! (signatures, anchor, fee payer) and applied atomically.
//!
//! Only compiled for tests or with the `test_utils` feature.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
#[allow(deprecated)]
use solana_sdk::system_instruction::SystemInstruction;
use solana_sdk::{
    account::Account,
    hash::{hashv, Hash},
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_program,
    transaction::Transaction,
};
use spl_token::instruction::{TokenInstruction, MAX_SIGNERS};
use spl_token::solana_program::{program_option::COption, program_pack::Pack};
use spl_token::state::{Account as TokenAccount, AccountState, Mint, Multisig};
use tracing::debug;

use crate::client::ClientContext;
use crate::codec::AccountRecord;
use crate::escrow::{escrow_authority, EscrowState};
use crate::instruction::{CalculatorInstruction, EscrowInstruction};
use crate::nonce::NonceState;
use crate::programs::calculator::CalculatorState;
use crate::programs::greeting::CounterState;
use crate::transport::{ExponentialBackoff, LedgerTransport, RejectionReason, SimulationOutcome, TransportError};
use crate::tx_builder::{decompile_instructions, is_advance_nonce};

pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
const EXEMPTION_THRESHOLD_YEARS: u64 = 2;
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;
const MAX_RECENT_BLOCKHASHES: usize = 150;
const UNITS_PER_INSTRUCTION: u64 = 150;

/// Rent-exempt minimum under the default rent parameters
pub fn rent_exempt_minimum(size: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + size as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
}

/// Nonce value stored when a nonce is initialized or advanced at `blockhash`
pub fn durable_nonce_value(blockhash: &Hash) -> Hash {
    hashv(&[b"DURABLE_NONCE", blockhash.as_ref()])
}

/// Programs the mock can execute besides system and token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProgram {
    Greeting,
    Calculator,
    Escrow,
}

enum Fault {
    MissingSignature,
    Failed(String),
}

type Exec<T = ()> = Result<T, Fault>;

fn fail<T>(detail: impl Into<String>) -> Exec<T> {
    Err(Fault::Failed(detail.into()))
}

fn failed(err: impl std::fmt::Display) -> Fault {
    Fault::Failed(err.to_string())
}

fn empty_account() -> Account {
    Account {
        lamports: 0,
        data: Vec::new(),
        owner: system_program::id(),
        executable: false,
        rent_epoch: 0,
    }
}

/// One instruction executing against the transaction's working accounts
struct Invocation<'a> {
    ix: &'a Instruction,
    accounts: &'a mut HashMap<Pubkey, Account>,
    blockhash: Hash,
}

impl Invocation<'_> {
    fn meta(&self, index: usize) -> Exec<&AccountMeta> {
        self.ix
            .accounts
            .get(index)
            .ok_or_else(|| Fault::Failed("not enough account keys".to_string()))
    }

    fn key(&self, index: usize) -> Exec<Pubkey> {
        Ok(self.meta(index)?.pubkey)
    }

    fn require_signer(&self, index: usize) -> Exec<Pubkey> {
        let meta = self.meta(index)?;
        if !meta.is_signer {
            return Err(Fault::MissingSignature);
        }
        Ok(meta.pubkey)
    }

    fn is_signed(&self, key: &Pubkey) -> bool {
        self.ix.accounts.iter().any(|meta| meta.pubkey == *key && meta.is_signer)
    }

    /// Missing accounts read as empty system accounts
    fn load(&self, index: usize) -> Exec<Account> {
        let key = self.key(index)?;
        Ok(self.accounts.get(&key).cloned().unwrap_or_else(empty_account))
    }

    /// Write back; a zero-lamport account is dropped from the ledger
    fn store(&mut self, index: usize, account: Account) -> Exec {
        let meta = self.meta(index)?.clone();
        if !meta.is_writable {
            return fail(format!("{} is not writable", meta.pubkey));
        }
        if account.lamports == 0 {
            self.accounts.remove(&meta.pubkey);
        } else {
            self.accounts.insert(meta.pubkey, account);
        }
        Ok(())
    }

    fn close_into(&mut self, index: usize, recipient: usize) -> Exec {
        let lamports = self.load(index)?.lamports;
        self.store(index, empty_account())?;
        let mut to = self.load(recipient)?;
        to.lamports += lamports;
        self.store(recipient, to)
    }
}

fn debit(account: &mut Account, lamports: u64) -> Exec {
    account.lamports = account
        .lamports
        .checked_sub(lamports)
        .ok_or_else(|| Fault::Failed("insufficient lamports".to_string()))?;
    Ok(())
}

fn create_account(inv: &mut Invocation, lamports: u64, space: u64, owner: Pubkey) -> Exec {
    let existing = inv.load(1)?;
    if existing.lamports > 0 || !existing.data.is_empty() {
        return fail(format!("account {} already in use", inv.key(1)?));
    }
    let mut payer = inv.load(0)?;
    debit(&mut payer, lamports)?;
    inv.store(0, payer)?;
    inv.store(
        1,
        Account {
            lamports,
            data: vec![0; space as usize],
            owner,
            executable: false,
            rent_epoch: 0,
        },
    )
}

#[allow(deprecated)]
fn process_system(inv: &mut Invocation) -> Exec {
    let instruction: SystemInstruction = bincode::deserialize(&inv.ix.data).map_err(failed)?;
    match instruction {
        SystemInstruction::CreateAccount { lamports, space, owner } => {
            inv.require_signer(0)?;
            inv.require_signer(1)?;
            create_account(inv, lamports, space, owner)
        }
        SystemInstruction::CreateAccountWithSeed {
            base,
            seed,
            lamports,
            space,
            owner,
        } => {
            inv.require_signer(0)?;
            let expected = Pubkey::create_with_seed(&base, &seed, &owner).map_err(failed)?;
            if expected != inv.key(1)? {
                return fail("address does not match seed derivation");
            }
            if !inv.is_signed(&base) {
                return Err(Fault::MissingSignature);
            }
            create_account(inv, lamports, space, owner)
        }
        SystemInstruction::Transfer { lamports } => {
            inv.require_signer(0)?;
            let mut from = inv.load(0)?;
            if !from.data.is_empty() {
                return fail("transfer source must not carry data");
            }
            debit(&mut from, lamports)?;
            inv.store(0, from)?;
            let mut to = inv.load(1)?;
            to.lamports += lamports;
            inv.store(1, to)
        }
        SystemInstruction::InitializeNonceAccount(authority) => {
            let mut account = inv.load(0)?;
            if account.owner != system_program::id() || account.data.len() != NonceState::LEN {
                return fail("invalid nonce account");
            }
            if NonceState::unpack(&account.data).map_err(failed)?.is_initialized() {
                return fail("nonce account already initialized");
            }
            if account.lamports < rent_exempt_minimum(NonceState::LEN) {
                return fail("nonce account is not rent exempt");
            }
            let state = NonceState::initialized(authority, durable_nonce_value(&inv.blockhash), LAMPORTS_PER_SIGNATURE);
            account.data = state.pack().map_err(failed)?;
            inv.store(0, account)
        }
        SystemInstruction::AdvanceNonceAccount => {
            let mut account = inv.load(0)?;
            let mut state = NonceState::unpack(&account.data).map_err(failed)?;
            if !state.is_initialized() {
                return fail("nonce account is not initialized");
            }
            if !inv.is_signed(&state.authorized) {
                return Err(Fault::MissingSignature);
            }
            let next = durable_nonce_value(&inv.blockhash);
            if next == state.nonce_value {
                return fail("nonce blockhash not expired");
            }
            state.nonce_value = next;
            account.data = state.pack().map_err(failed)?;
            inv.store(0, account)
        }
        other => fail(format!("unsupported system instruction: {other:?}")),
    }
}

fn read_token_account(inv: &Invocation, index: usize) -> Exec<TokenAccount> {
    let account = inv.load(index)?;
    if account.owner != spl_token::id() {
        return fail(format!("{} is not a token account", inv.key(index)?));
    }
    TokenAccount::unpack(&account.data).map_err(failed)
}

fn write_token_account(inv: &mut Invocation, index: usize, state: TokenAccount) -> Exec {
    let mut account = inv.load(index)?;
    TokenAccount::pack(state, &mut account.data).map_err(failed)?;
    inv.store(index, account)
}

fn token_owned(account: &Account, len: usize) -> Exec {
    if account.owner != spl_token::id() || account.data.len() != len {
        return fail("account is not owned by the token program or has the wrong size");
    }
    Ok(())
}

fn move_tokens(inv: &mut Invocation, from: usize, to: usize, amount: u64) -> Exec {
    let mut source = read_token_account(inv, from)?;
    if read_token_account(inv, to)?.mint != source.mint {
        return fail("account mints do not match");
    }
    source.amount = source
        .amount
        .checked_sub(amount)
        .ok_or_else(|| Fault::Failed("insufficient token funds".to_string()))?;
    write_token_account(inv, from, source)?;

    let mut destination = read_token_account(inv, to)?;
    destination.amount = destination
        .amount
        .checked_add(amount)
        .ok_or_else(|| Fault::Failed("token amount overflow".to_string()))?;
    write_token_account(inv, to, destination)
}

/// Owner check; multisig owners need `m` member signers after `index`
fn validate_authority(inv: &Invocation, expected: &Pubkey, index: usize) -> Exec {
    let key = inv.key(index)?;
    if key != *expected {
        return fail("owner does not match");
    }
    let authority = inv.load(index)?;
    if authority.owner == spl_token::id() && authority.data.len() == Multisig::LEN {
        let multisig = Multisig::unpack(&authority.data).map_err(failed)?;
        let Some(members) = multisig.signers.get(..usize::from(multisig.n)) else {
            return fail("invalid multisig member count");
        };
        let mut approved: Vec<Pubkey> = Vec::new();
        for meta in inv.ix.accounts.iter().skip(index + 1) {
            if meta.is_signer && members.contains(&meta.pubkey) && !approved.contains(&meta.pubkey) {
                approved.push(meta.pubkey);
            }
        }
        if approved.len() < usize::from(multisig.m) {
            return Err(Fault::MissingSignature);
        }
        return Ok(());
    }
    inv.require_signer(index).map(|_| ())
}

fn process_token(inv: &mut Invocation) -> Exec {
    let ix = inv.ix;
    let instruction = TokenInstruction::unpack(&ix.data).map_err(failed)?;
    match instruction {
        TokenInstruction::InitializeMint {
            decimals,
            mint_authority,
            freeze_authority,
        } => {
            let mut account = inv.load(0)?;
            token_owned(&account, Mint::LEN)?;
            if Mint::unpack_unchecked(&account.data).map_err(failed)?.is_initialized {
                return fail("mint already initialized");
            }
            let mint = Mint {
                mint_authority: COption::Some(mint_authority),
                supply: 0,
                decimals,
                is_initialized: true,
                freeze_authority,
            };
            Mint::pack(mint, &mut account.data).map_err(failed)?;
            inv.store(0, account)
        }
        TokenInstruction::InitializeAccount => {
            let mint = inv.key(1)?;
            let owner = inv.key(2)?;
            let mint_account = inv.load(1)?;
            token_owned(&mint_account, Mint::LEN)?;
            Mint::unpack(&mint_account.data).map_err(failed)?;

            let mut account = inv.load(0)?;
            token_owned(&account, TokenAccount::LEN)?;
            if TokenAccount::unpack_unchecked(&account.data).map_err(failed)?.state != AccountState::Uninitialized {
                return fail("token account already initialized");
            }
            let state = TokenAccount {
                mint,
                owner,
                amount: 0,
                delegate: COption::None,
                state: AccountState::Initialized,
                is_native: COption::None,
                delegated_amount: 0,
                close_authority: COption::None,
            };
            TokenAccount::pack(state, &mut account.data).map_err(failed)?;
            inv.store(0, account)
        }
        TokenInstruction::InitializeMultisig { m } => {
            let mut account = inv.load(0)?;
            token_owned(&account, Multisig::LEN)?;
            if Multisig::unpack_unchecked(&account.data).map_err(failed)?.is_initialized {
                return fail("multisig already initialized");
            }
            let members: Vec<Pubkey> = inv.ix.accounts.iter().skip(2).map(|meta| meta.pubkey).collect();
            let n = members.len();
            if n == 0 || n > MAX_SIGNERS || m == 0 || usize::from(m) > n {
                return fail("invalid multisig threshold");
            }
            let mut signers = [Pubkey::default(); MAX_SIGNERS];
            signers[..n].copy_from_slice(&members);
            let state = Multisig {
                m,
                n: n as u8,
                is_initialized: true,
                signers,
            };
            Multisig::pack(state, &mut account.data).map_err(failed)?;
            inv.store(0, account)
        }
        TokenInstruction::Transfer { amount } => {
            let source = read_token_account(inv, 0)?;
            validate_authority(inv, &source.owner, 2)?;
            move_tokens(inv, 0, 1, amount)
        }
        TokenInstruction::MintTo { amount } => {
            let mint_key = inv.key(0)?;
            let mut mint_account = inv.load(0)?;
            token_owned(&mint_account, Mint::LEN)?;
            let mut mint = Mint::unpack(&mint_account.data).map_err(failed)?;
            let authority = match mint.mint_authority {
                COption::Some(authority) => authority,
                COption::None => return fail("mint has no authority"),
            };
            validate_authority(inv, &authority, 2)?;

            let mut destination = read_token_account(inv, 1)?;
            if destination.mint != mint_key {
                return fail("account mints do not match");
            }
            mint.supply = mint
                .supply
                .checked_add(amount)
                .ok_or_else(|| Fault::Failed("supply overflow".to_string()))?;
            Mint::pack(mint, &mut mint_account.data).map_err(failed)?;
            inv.store(0, mint_account)?;

            destination.amount = destination
                .amount
                .checked_add(amount)
                .ok_or_else(|| Fault::Failed("token amount overflow".to_string()))?;
            write_token_account(inv, 1, destination)
        }
        other => fail(format!("unsupported token instruction: {other:?}")),
    }
}

fn load_escrow(inv: &Invocation, index: usize, program_id: &Pubkey) -> Exec<EscrowState> {
    let account = inv.load(index)?;
    if account.owner != *program_id {
        return fail("escrow account is not owned by the program");
    }
    let state = EscrowState::unpack(&account.data).map_err(failed)?;
    if !state.is_initialized {
        return fail("escrow is not initialized");
    }
    Ok(state)
}

fn process_escrow(inv: &mut Invocation, program_id: &Pubkey) -> Exec {
    let ix = inv.ix;
    let instruction = EscrowInstruction::unpack(&ix.data).map_err(failed)?;
    let (pda, _bump) = escrow_authority(program_id).map_err(failed)?;

    match instruction {
        EscrowInstruction::InitEscrow { amount } => {
            let initializer = inv.require_signer(0)?;
            let mut temp = read_token_account(inv, 1)?;
            if temp.owner != initializer {
                return fail("temp account is not owned by the initializer");
            }
            if inv.load(2)?.owner != spl_token::id() {
                return fail("receiving account is not a token account");
            }

            let mut escrow = inv.load(3)?;
            if escrow.owner != *program_id {
                return fail("escrow account is not owned by the program");
            }
            if escrow.lamports < rent_exempt_minimum(EscrowState::LEN) {
                return fail("escrow account is not rent exempt");
            }
            if EscrowState::unpack(&escrow.data).map_err(failed)?.is_initialized {
                return fail("escrow already initialized");
            }
            let state = EscrowState {
                is_initialized: true,
                initializer,
                temp_holder: inv.key(1)?,
                receiving_account: inv.key(2)?,
                expected_amount: amount,
            };
            escrow.data = state.pack().map_err(failed)?;
            inv.store(3, escrow)?;

            temp.owner = pda;
            write_token_account(inv, 1, temp)
        }
        EscrowInstruction::Exchange { amount } => {
            let taker = inv.require_signer(0)?;
            let state = load_escrow(inv, 6, program_id)?;
            if state.temp_holder != inv.key(3)?
                || state.initializer != inv.key(4)?
                || state.receiving_account != inv.key(5)?
            {
                return fail("accounts do not match escrow state");
            }
            if inv.key(8)? != pda {
                return fail("invalid program address");
            }
            if read_token_account(inv, 3)?.amount != amount {
                return fail("expected amount mismatch");
            }
            if read_token_account(inv, 1)?.owner != taker {
                return fail("taker does not own the offered account");
            }

            move_tokens(inv, 1, 5, state.expected_amount)?;
            move_tokens(inv, 3, 2, amount)?;
            inv.close_into(3, 4)?;
            inv.close_into(6, 4)
        }
        EscrowInstruction::Cancel => {
            let initializer = inv.require_signer(0)?;
            let state = load_escrow(inv, 3, program_id)?;
            if state.initializer != initializer {
                return fail("only the initializer can cancel");
            }
            if state.temp_holder != inv.key(1)? {
                return fail("temp account does not match escrow state");
            }
            if inv.key(5)? != pda {
                return fail("invalid program address");
            }

            let locked = read_token_account(inv, 1)?.amount;
            move_tokens(inv, 1, 2, locked)?;
            inv.close_into(1, 0)?;
            inv.close_into(3, 0)
        }
    }
}

fn process_greeting(inv: &mut Invocation, program_id: &Pubkey) -> Exec {
    let mut account = inv.load(0)?;
    if account.owner != *program_id {
        return fail("greeted account does not have the correct program id");
    }
    let mut state = CounterState::unpack(&account.data).map_err(failed)?;
    state.counter = state
        .counter
        .checked_add(1)
        .ok_or_else(|| Fault::Failed("counter overflow".to_string()))?;
    account.data = state.pack().map_err(failed)?;
    inv.store(0, account)
}

fn process_calculator(inv: &mut Invocation, program_id: &Pubkey) -> Exec {
    let ix = inv.ix;
    let mut account = inv.load(0)?;
    if account.owner != *program_id {
        return fail("calculator account does not have the correct program id");
    }
    let operation = CalculatorInstruction::unpack(&ix.data).map_err(failed)?;
    let (a, b) = operation.operands();
    let result = match operation {
        CalculatorInstruction::Add { .. } => a.checked_add(b),
        CalculatorInstruction::Sub { .. } => a.checked_sub(b),
    }
    .ok_or_else(|| Fault::Failed("arithmetic overflow".to_string()))?;

    account.data = CalculatorState { result, a, b }.pack().map_err(failed)?;
    inv.store(0, account)
}

struct Executed {
    accounts: HashMap<Pubkey, Account>,
    logs: Vec<String>,
    instructions: usize,
}

#[derive(Debug)]
struct LedgerState {
    accounts: HashMap<Pubkey, Account>,
    programs: HashMap<Pubkey, MockProgram>,
    blockhash: Hash,
    recent_blockhashes: VecDeque<Hash>,
    processed: HashSet<Signature>,
    history: Vec<Transaction>,
    injected_failure: Option<TransportError>,
}

impl LedgerState {
    fn new() -> Self {
        let blockhash = Hash::new_unique();
        Self {
            accounts: HashMap::new(),
            programs: HashMap::new(),
            blockhash,
            recent_blockhashes: VecDeque::from([blockhash]),
            processed: HashSet::new(),
            history: Vec::new(),
            injected_failure: None,
        }
    }

    fn advance_blockhash(&mut self) {
        self.blockhash = hashv(&[b"BLOCK", self.blockhash.as_ref()]);
        self.recent_blockhashes.push_back(self.blockhash);
        while self.recent_blockhashes.len() > MAX_RECENT_BLOCKHASHES {
            self.recent_blockhashes.pop_front();
        }
    }

    /// Recent blockhash, or the current value of the leading advance's nonce
    fn check_anchor(&self, anchor: &Hash, instructions: &[Instruction]) -> Result<(), RejectionReason> {
        if self.recent_blockhashes.contains(anchor) {
            return Ok(());
        }
        let nonce_value = instructions
            .first()
            .filter(|ix| is_advance_nonce(ix))
            .and_then(|ix| ix.accounts.first())
            .and_then(|meta| self.accounts.get(&meta.pubkey))
            .and_then(|account| NonceState::unpack(&account.data).ok())
            .filter(NonceState::is_initialized)
            .map(|state| state.nonce_value);
        match nonce_value {
            Some(value) if value == *anchor => Ok(()),
            _ => Err(RejectionReason::BlockhashNotFound),
        }
    }

    fn execute(&self, tx: &Transaction, verify_signatures: bool) -> Result<Executed, RejectionReason> {
        let message = &tx.message;
        if verify_signatures {
            if tx.signatures.len() != usize::from(message.header.num_required_signatures) || tx.verify().is_err() {
                return Err(RejectionReason::SignatureFailure);
            }
        }

        // age first, then the status cache
        let instructions = decompile_instructions(message);
        self.check_anchor(&message.recent_blockhash, &instructions)?;
        if verify_signatures && tx.signatures.first().is_some_and(|sig| self.processed.contains(sig)) {
            return Err(RejectionReason::AlreadyProcessed);
        }

        let mut accounts = self.accounts.clone();
        let fee_payer = message.account_keys.first().ok_or(RejectionReason::AccountNotFound)?;
        let payer = accounts.get_mut(fee_payer).ok_or(RejectionReason::AccountNotFound)?;
        let fee = LAMPORTS_PER_SIGNATURE * u64::from(message.header.num_required_signatures);
        payer.lamports = payer
            .lamports
            .checked_sub(fee)
            .ok_or(RejectionReason::InsufficientFundsForFee)?;

        let mut logs = Vec::new();
        for (index, ix) in instructions.iter().enumerate() {
            let program_id = ix.program_id;
            logs.push(format!("Program {program_id} invoke [1]"));
            let mut inv = Invocation {
                ix,
                accounts: &mut accounts,
                blockhash: self.blockhash,
            };
            let result = if program_id == system_program::id() {
                process_system(&mut inv)
            } else if program_id == spl_token::id() {
                process_token(&mut inv)
            } else {
                match self.programs.get(&program_id) {
                    Some(MockProgram::Greeting) => process_greeting(&mut inv, &program_id),
                    Some(MockProgram::Calculator) => process_calculator(&mut inv, &program_id),
                    Some(MockProgram::Escrow) => process_escrow(&mut inv, &program_id),
                    None => fail(format!("program {program_id} is not deployed")),
                }
            };
            let instruction = index as u8;
            match result {
                Ok(()) => logs.push(format!("Program {program_id} success")),
                Err(Fault::MissingSignature) => {
                    return Err(RejectionReason::MissingRequiredSignature { instruction })
                }
                Err(Fault::Failed(detail)) => return Err(RejectionReason::InstructionFailed { instruction, detail }),
            }
        }

        Ok(Executed {
            accounts,
            logs,
            instructions: instructions.len(),
        })
    }
}

/// In-memory ledger; see the module docs
#[derive(Debug)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::new()),
        }
    }

    pub fn airdrop(&self, address: &Pubkey, lamports: u64) {
        let mut state = self.state.lock();
        state.accounts.entry(*address).or_insert_with(empty_account).lamports += lamports;
    }

    /// Register an executable program account of the given kind
    pub fn deploy_program(&self, program_id: &Pubkey, program: MockProgram) {
        let mut state = self.state.lock();
        state.accounts.insert(
            *program_id,
            Account {
                lamports: rent_exempt_minimum(36),
                data: vec![0; 36],
                owner: solana_sdk::bpf_loader_upgradeable::id(),
                executable: true,
                rent_epoch: 0,
            },
        );
        state.programs.insert(*program_id, program);
    }

    pub fn account(&self, address: &Pubkey) -> Option<Account> {
        self.state.lock().accounts.get(address).cloned()
    }

    pub fn set_account(&self, address: &Pubkey, account: Account) {
        self.state.lock().accounts.insert(*address, account);
    }

    pub fn lamports(&self, address: &Pubkey) -> u64 {
        self.account(address).map_or(0, |account| account.lamports)
    }

    pub fn token_balance(&self, address: &Pubkey) -> Option<u64> {
        let account = self.account(address)?;
        TokenAccount::unpack(&account.data).ok().map(|state| state.amount)
    }

    pub fn latest_blockhash(&self) -> Hash {
        self.state.lock().blockhash
    }

    /// Forget every recent blockhash except a fresh one
    pub fn expire_blockhashes(&self) {
        let mut state = self.state.lock();
        state.advance_blockhash();
        let current = state.blockhash;
        state.recent_blockhashes = VecDeque::from([current]);
    }

    /// Make the next submission fail with `err` before execution
    pub fn fail_next_submission(&self, err: TransportError) {
        self.state.lock().injected_failure = Some(err);
    }

    /// Every committed transaction, oldest first
    pub fn history(&self) -> Vec<Transaction> {
        self.state.lock().history.clone()
    }
}

#[async_trait]
impl LedgerTransport for MockLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Account, TransportError> {
        self.account(address).ok_or(TransportError::NotFound(*address))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, TransportError> {
        Ok(self.lamports(address))
    }

    async fn get_minimum_balance_for_size(&self, size: usize) -> Result<u64, TransportError> {
        Ok(rent_exempt_minimum(size))
    }

    async fn submit_transaction(&self, wire: &[u8]) -> Result<Signature, TransportError> {
        let tx: Transaction = bincode::deserialize(wire).map_err(TransportError::malformed)?;
        let signature = tx
            .signatures
            .first()
            .copied()
            .ok_or_else(|| TransportError::malformed("transaction carries no signatures"))?;

        let mut state = self.state.lock();
        if let Some(err) = state.injected_failure.take() {
            return Err(err);
        }
        match state.execute(&tx, true) {
            Ok(executed) => {
                state.accounts = executed.accounts;
                state.processed.insert(signature);
                state.history.push(tx);
                state.advance_blockhash();
                debug!(%signature, instructions = executed.instructions, "mock ledger committed transaction");
                Ok(signature)
            }
            Err(reason) => {
                debug!(%signature, %reason, "mock ledger rejected transaction");
                Err(TransportError::Rejected(reason))
            }
        }
    }

    async fn confirm_transaction(&self, signature: &Signature) -> Result<(), TransportError> {
        if self.state.lock().processed.contains(signature) {
            Ok(())
        } else {
            Err(TransportError::TimedOut {
                signature: *signature,
                waited_ms: 0,
            })
        }
    }

    async fn simulate_transaction(&self, wire: &[u8]) -> Result<SimulationOutcome, TransportError> {
        let tx: Transaction = bincode::deserialize(wire).map_err(TransportError::malformed)?;
        let state = self.state.lock();
        Ok(match state.execute(&tx, false) {
            Ok(executed) => SimulationOutcome {
                success: true,
                error: None,
                logs: executed.logs,
                units_consumed: Some(UNITS_PER_INSTRUCTION * executed.instructions as u64),
            },
            Err(reason) => SimulationOutcome {
                success: false,
                error: Some(reason),
                logs: Vec::new(),
                units_consumed: None,
            },
        })
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, TransportError> {
        Ok(self.latest_blockhash())
    }
}

/// Keypair funded with `lamports` on `ledger`
pub fn funded_keypair(ledger: &MockLedger, lamports: u64) -> Keypair {
    let keypair = Keypair::new();
    ledger.airdrop(&keypair.pubkey(), lamports);
    keypair
}

/// Context with a payer holding 10 SOL and a short retry policy
pub fn funded_context(ledger: &Arc<MockLedger>) -> ClientContext {
    let payer = Arc::new(funded_keypair(ledger, 10 * LAMPORTS_PER_SOL));
    ClientContext::new(ledger.clone(), payer).with_backoff(ExponentialBackoff::new(1, 10, 2))
}
