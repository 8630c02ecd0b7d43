//! Greeting and calculator flows against the in-memory ledger
//!
//! Covers both address provenance policies, seeded-account reuse, and
//! simulation leaving stored state untouched.

use std::sync::Arc;

use solana_sdk::{account::Account, pubkey::Pubkey};

use crate::address::AddressProvenance;
use crate::client::ClientContext;
use crate::codec::AccountRecord;
use crate::errors::ProtocolError;
use crate::instruction::CalculatorInstruction;
use crate::programs::calculator::{self, CalculatorState};
use crate::programs::greeting::{self, CounterState};
use crate::test_utils::{funded_context, funded_keypair, rent_exempt_minimum, MockLedger, MockProgram};
use crate::transport::{RejectionReason, TransportError};

fn ledger_with(program: MockProgram) -> (Arc<MockLedger>, Pubkey) {
    let ledger = Arc::new(MockLedger::new());
    let program_id = Pubkey::new_unique();
    ledger.deploy_program(&program_id, program);
    (ledger, program_id)
}

#[tokio::test]
async fn test_greeting_seeded_account_is_reused() {
    let (ledger, program_id) = ledger_with(MockProgram::Greeting);
    let ctx = funded_context(&ledger);
    let policy = AddressProvenance::seeded("hello");

    let first = greeting::setup(&ctx, &program_id, &policy).await.unwrap();
    assert!(first.created);
    assert_eq!(
        first.address,
        Pubkey::create_with_seed(&ctx.payer_pubkey(), "hello", &program_id).unwrap()
    );

    greeting::say_hello(&ctx, &program_id, &first.address).await.unwrap();
    greeting::say_hello(&ctx, &program_id, &first.address).await.unwrap();

    // a second run finds the same account and keeps counting
    let second = greeting::setup(&ctx, &program_id, &policy).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.address, first.address);
    greeting::say_hello(&ctx, &program_id, &second.address).await.unwrap();

    assert_eq!(greeting::report_greetings(&ctx, &second.address).await.unwrap(), 3);

    let account = ledger.account(&first.address).unwrap();
    assert_eq!(account.owner, program_id);
    assert_eq!(account.lamports, rent_exempt_minimum(CounterState::LEN));
}

#[tokio::test]
async fn test_greeting_random_account() {
    let (ledger, program_id) = ledger_with(MockProgram::Greeting);
    let ctx = funded_context(&ledger);

    let first = greeting::setup(&ctx, &program_id, &AddressProvenance::Random).await.unwrap();
    let second = greeting::setup(&ctx, &program_id, &AddressProvenance::Random).await.unwrap();
    assert!(first.created && second.created);
    assert_ne!(first.address, second.address);

    greeting::say_hello(&ctx, &program_id, &first.address).await.unwrap();
    assert_eq!(greeting::report_greetings(&ctx, &first.address).await.unwrap(), 1);
    assert_eq!(greeting::report_greetings(&ctx, &second.address).await.unwrap(), 0);
}

#[tokio::test]
async fn test_greeting_requires_deployed_program() {
    let ledger = Arc::new(MockLedger::new());
    let ctx = funded_context(&ledger);

    let err = greeting::setup(&ctx, &Pubkey::new_unique(), &AddressProvenance::Random)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Configuration(_)));
}

#[tokio::test]
async fn test_seeded_account_with_foreign_owner_is_refused() {
    let (ledger, program_id) = ledger_with(MockProgram::Greeting);
    let ctx = funded_context(&ledger);
    let address = Pubkey::create_with_seed(&ctx.payer_pubkey(), "hello", &program_id).unwrap();
    ledger.set_account(
        &address,
        Account {
            lamports: rent_exempt_minimum(CounterState::LEN),
            data: vec![0; CounterState::LEN],
            owner: Pubkey::new_unique(),
            executable: false,
            rent_epoch: 0,
        },
    );

    let err = greeting::setup(&ctx, &program_id, &AddressProvenance::seeded("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Configuration(_)));
}

#[tokio::test]
async fn test_calculator_add_and_sub() {
    let (ledger, program_id) = ledger_with(MockProgram::Calculator);
    let ctx = funded_context(&ledger);
    let account = calculator::setup(&ctx, &program_id, &AddressProvenance::seeded("calculator_program_seed"))
        .await
        .unwrap()
        .address;

    calculator::add(&ctx, &program_id, &account, 5, 3).await.unwrap();
    assert_eq!(
        calculator::result(&ctx, &account).await.unwrap(),
        CalculatorState { result: 8, a: 5, b: 3 }
    );

    calculator::sub(&ctx, &program_id, &account, 10, 4).await.unwrap();
    assert_eq!(calculator::result(&ctx, &account).await.unwrap().result, 6);
}

#[tokio::test]
async fn test_calculator_underflow_fails_without_writing() {
    let (ledger, program_id) = ledger_with(MockProgram::Calculator);
    let ctx = funded_context(&ledger);
    let account = calculator::setup(&ctx, &program_id, &AddressProvenance::Random)
        .await
        .unwrap()
        .address;
    calculator::add(&ctx, &program_id, &account, 2, 2).await.unwrap();

    let err = calculator::sub(&ctx, &program_id, &account, 3, 5).await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Rejected(RejectionReason::InstructionFailed { instruction: 0, .. })
    ));
    assert_eq!(
        calculator::result(&ctx, &account).await.unwrap(),
        CalculatorState { result: 4, a: 2, b: 2 }
    );
}

#[tokio::test]
async fn test_simulation_leaves_state_untouched() {
    let (ledger, program_id) = ledger_with(MockProgram::Calculator);
    let ctx = funded_context(&ledger);
    let account = calculator::setup(&ctx, &program_id, &AddressProvenance::Random)
        .await
        .unwrap()
        .address;
    calculator::add(&ctx, &program_id, &account, 5, 3).await.unwrap();
    let committed = ledger.history().len();
    let payer_lamports = ledger.lamports(&ctx.payer_pubkey());

    let outcome = calculator::simulate_add(&ctx, &program_id, &account, 100, 1).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.error.is_none());
    assert!(!outcome.logs.is_empty());
    assert_eq!(outcome.units_consumed, Some(150));

    let failing = calculator::simulate(&ctx, &program_id, &account, CalculatorInstruction::Sub { a: 1, b: 2 })
        .await
        .unwrap();
    assert!(!failing.success);
    assert!(matches!(failing.error, Some(RejectionReason::InstructionFailed { .. })));

    assert_eq!(calculator::result(&ctx, &account).await.unwrap().result, 8);
    assert_eq!(ledger.history().len(), committed);
    assert_eq!(ledger.lamports(&ctx.payer_pubkey()), payer_lamports);
}

#[tokio::test]
async fn test_greet_wrong_owner_is_rejected() {
    let (ledger, program_id) = ledger_with(MockProgram::Greeting);
    let ctx = funded_context(&ledger);
    let stray = Pubkey::new_unique();
    ledger.set_account(
        &stray,
        Account {
            lamports: rent_exempt_minimum(4),
            data: vec![0; 4],
            owner: Pubkey::new_unique(),
            executable: false,
            rent_epoch: 0,
        },
    );

    let err = greeting::say_hello(&ctx, &program_id, &stray).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Rejected(_)));
    assert_eq!(ledger.account(&stray).unwrap().data, vec![0; 4]);
}

#[tokio::test]
async fn test_underfunded_payer_fails_before_allocation() {
    let (ledger, program_id) = ledger_with(MockProgram::Greeting);
    let payer = Arc::new(funded_keypair(&ledger, 1_000));
    let ctx = ClientContext::new(ledger.clone(), payer);

    let err = greeting::setup(&ctx, &program_id, &AddressProvenance::seeded("hello"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::InsufficientFunds {
            required: rent_exempt_minimum(CounterState::LEN),
            available: 1_000,
        }
    );
    assert!(ledger.history().is_empty());
}

#[tokio::test]
async fn test_lost_submission_is_ambiguous() {
    let (ledger, program_id) = ledger_with(MockProgram::Greeting);
    let ctx = funded_context(&ledger);
    let account = greeting::setup(&ctx, &program_id, &AddressProvenance::Random).await.unwrap();
    assert!(ctx.account_exists(&account.address).await.unwrap());

    ledger.fail_next_submission(TransportError::Network("connection reset by peer".into()));
    let err = greeting::say_hello(&ctx, &program_id, &account.address).await.unwrap_err();
    assert_eq!(err, ProtocolError::Ambiguous("connection reset by peer".into()));
    assert!(!err.is_retryable());

    // the caller decides; here the greeting is resent and lands
    greeting::say_hello(&ctx, &program_id, &account.address).await.unwrap();
    assert_eq!(greeting::report_greetings(&ctx, &account.address).await.unwrap(), 1);
}
