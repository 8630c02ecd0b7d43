//! M-of-N token authorities against the in-memory ledger
//!
//! A multisig is the mint authority: 2-of-3 in most scenarios, 3-of-5 where
//! the choice of member subset matters.

use std::sync::Arc;

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};

use crate::client::ClientContext;
use crate::errors::ProtocolError;
use crate::multisig::{self, MultisigAuthority, OfflineSigningSession};
use crate::nonce;
use crate::test_utils::{funded_context, MockLedger};
use crate::token;
use crate::tx_builder::{decompile_instructions, is_advance_nonce, AssemblerError};

struct Fixture {
    ledger: Arc<MockLedger>,
    ctx: ClientContext,
    members: Vec<Keypair>,
    authority: MultisigAuthority,
    mint: Pubkey,
    destination: Pubkey,
}

async fn fixture() -> Fixture {
    fixture_with(2, 3).await
}

async fn fixture_with(m: u8, n: usize) -> Fixture {
    let ledger = Arc::new(MockLedger::new());
    let ctx = funded_context(&ledger);
    let members: Vec<Keypair> = (0..n).map(|_| Keypair::new()).collect();
    let keys: Vec<Pubkey> = members.iter().map(|k| k.pubkey()).collect();

    let multisig_account = Keypair::new();
    let authority = multisig::create(&ctx, &multisig_account, m, &keys).await.unwrap();

    let mint = Keypair::new();
    token::create_mint(&ctx, &mint, authority.address(), 0).await.unwrap();
    let destination = Keypair::new();
    token::create_token_account(&ctx, &destination, &mint.pubkey(), &Pubkey::new_unique())
        .await
        .unwrap();

    Fixture {
        ledger,
        ctx,
        members,
        authority,
        mint: mint.pubkey(),
        destination: destination.pubkey(),
    }
}

impl Fixture {
    fn member_keys(&self, indexes: &[usize]) -> Vec<Pubkey> {
        indexes.iter().map(|&i| self.members[i].pubkey()).collect()
    }

    /// Sign `ix` with the payer and the members at `indexes`, then submit
    async fn send_signed(&self, ix: Instruction, indexes: &[usize]) -> Result<Signature, ProtocolError> {
        let mut assembler = self.ctx.assembler().await?;
        assembler.add(ix)?;
        assembler.sign(self.ctx.payer())?;
        for &i in indexes {
            assembler.sign(&self.members[i])?;
        }
        multisig::submit_authorized(&self.ctx, &self.authority, &mut assembler).await
    }

    fn mint_ix(&self, indexes: &[usize], amount: u64) -> Instruction {
        self.authority
            .mint_to_instruction(&self.mint, &self.destination, &self.member_keys(indexes), amount)
            .unwrap()
    }
}

#[tokio::test]
async fn test_fetch_matches_created_authority() {
    let f = fixture().await;
    let fetched = multisig::fetch(&f.ctx, f.authority.address()).await.unwrap();
    assert_eq!(fetched, f.authority);
    assert_eq!(fetched.threshold(), 2);
    assert_eq!(fetched.signers(), f.member_keys(&[0, 1, 2]).as_slice());
}

#[tokio::test]
async fn test_mint_with_threshold_signatures() {
    let f = fixture().await;
    let ix = f
        .authority
        .mint_to_instruction(&f.mint, &f.destination, &f.member_keys(&[0, 2]), 500)
        .unwrap();

    let mut assembler = f.ctx.assembler().await.unwrap();
    assembler.add(ix).unwrap();
    assembler.sign(f.ctx.payer()).unwrap();
    assembler.sign(&f.members[0]).unwrap();
    assembler.sign(&f.members[2]).unwrap();
    assert_eq!(f.authority.check_authorization(&assembler).unwrap(), 2);

    multisig::submit_authorized(&f.ctx, &f.authority, &mut assembler)
        .await
        .unwrap();
    assert_eq!(f.ledger.token_balance(&f.destination), Some(500));
}

#[tokio::test]
async fn test_below_threshold_is_refused_before_submission() {
    let f = fixture().await;
    let ix = f
        .authority
        .mint_to_instruction(&f.mint, &f.destination, &f.member_keys(&[1]), 500)
        .unwrap();
    let committed = f.ledger.history().len();

    let mut assembler = f.ctx.assembler().await.unwrap();
    assembler.add(ix).unwrap();
    assembler.sign(f.ctx.payer()).unwrap();
    assembler.sign(&f.members[1]).unwrap();

    let err = multisig::submit_authorized(&f.ctx, &f.authority, &mut assembler)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Authorization { authority: Some(address), .. } if address == *f.authority.address()
    ));
    assert!(err.is_retryable());
    assert_eq!(f.ledger.history().len(), committed);
    assert_eq!(f.ledger.token_balance(&f.destination), Some(0));
}

#[tokio::test]
async fn test_ledger_enforces_threshold() {
    let f = fixture().await;
    let ix = f
        .authority
        .mint_to_instruction(&f.mint, &f.destination, &f.member_keys(&[1]), 500)
        .unwrap();

    // skip the local check; the token program still counts signers
    let mut assembler = f.ctx.assembler().await.unwrap();
    assembler.add(ix).unwrap();
    assembler.sign(f.ctx.payer()).unwrap();
    assembler.sign(&f.members[1]).unwrap();

    let err = f.ctx.submit_and_confirm("mint_to", &mut assembler).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Authorization { authority: None, .. }));
    assert_eq!(f.ledger.token_balance(&f.destination), Some(0));
}

#[tokio::test]
async fn test_outsider_cannot_participate() {
    let f = fixture().await;
    let outsider = Pubkey::new_unique();
    let mut participants = f.member_keys(&[0]);
    participants.push(outsider);

    let err = f
        .authority
        .mint_to_instruction(&f.mint, &f.destination, &participants, 1)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Authorization { .. }));
}

#[tokio::test]
async fn test_offline_session_collects_signatures() {
    let f = fixture().await;
    let nonce_account = Keypair::new();
    nonce::create_nonce_account(&f.ctx, &nonce_account, &f.ctx.payer_pubkey())
        .await
        .unwrap();
    let anchor = nonce::durable_anchor(&f.ctx, &nonce_account.pubkey()).await.unwrap();

    let ix = f
        .authority
        .mint_to_instruction(&f.mint, &f.destination, &f.member_keys(&[0, 1]), 75)
        .unwrap();
    let mut session =
        OfflineSigningSession::new(f.authority.clone(), f.ctx.payer_pubkey(), anchor, vec![ix]).unwrap();
    let exported = session.export().unwrap();

    // members sign the exported bytes on their own machines
    for member in &f.members[..2] {
        let (pubkey, signature) = OfflineSigningSession::sign_offline(&exported, member).unwrap();
        session.add_signature(pubkey, signature).unwrap();
    }
    assert_eq!(session.check_authorization().unwrap(), 2);

    // the third member is not part of this message
    let err = OfflineSigningSession::sign_offline(&exported, &f.members[2]).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::Assembler(AssemblerError::UnexpectedSigner(f.members[2].pubkey()))
    );

    assert_eq!(session.missing_signers(), vec![f.ctx.payer_pubkey()]);
    session.sign(f.ctx.payer()).unwrap();

    // the blockhash window passes while signatures travel
    f.ledger.expire_blockhashes();

    let mut assembler = session.into_assembler();
    multisig::submit_authorized(&f.ctx, &f.authority, &mut assembler)
        .await
        .unwrap();
    assert_eq!(f.ledger.token_balance(&f.destination), Some(75));

    let history = f.ledger.history();
    let landed = decompile_instructions(&history.last().unwrap().message);
    assert!(is_advance_nonce(&landed[0]));
}

#[tokio::test]
async fn test_offline_session_rejects_foreign_signature() {
    let f = fixture().await;
    let nonce_account = Keypair::new();
    nonce::create_nonce_account(&f.ctx, &nonce_account, &f.ctx.payer_pubkey())
        .await
        .unwrap();
    let anchor = nonce::durable_anchor(&f.ctx, &nonce_account.pubkey()).await.unwrap();

    let ix = f
        .authority
        .mint_to_instruction(&f.mint, &f.destination, &f.member_keys(&[0, 1]), 75)
        .unwrap();
    let mut session =
        OfflineSigningSession::new(f.authority.clone(), f.ctx.payer_pubkey(), anchor, vec![ix]).unwrap();

    let forged = f.members[0].sign_message(b"some other message");
    let err = session.add_signature(f.members[0].pubkey(), forged).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::Assembler(AssemblerError::InvalidSignature(f.members[0].pubkey()))
    );
    assert!(session.check_authorization().is_err());
}

#[tokio::test]
async fn test_offline_session_needs_durable_anchor() {
    let f = fixture().await;
    let anchor = f.ctx.latest_anchor().await.unwrap();
    let ix = f
        .authority
        .mint_to_instruction(&f.mint, &f.destination, &f.member_keys(&[0, 1]), 75)
        .unwrap();

    let err = OfflineSigningSession::new(f.authority.clone(), f.ctx.payer_pubkey(), anchor, vec![ix]).unwrap_err();
    assert!(matches!(err, ProtocolError::Configuration(_)));
}

#[tokio::test]
async fn test_fetch_requires_token_program_owner() {
    let f = fixture().await;
    let mut account = f.ledger.account(f.authority.address()).unwrap();
    account.owner = Pubkey::new_unique();
    let impostor = Pubkey::new_unique();
    f.ledger.set_account(&impostor, account);

    let err = multisig::fetch(&f.ctx, &impostor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Configuration(_)));
}

#[tokio::test]
async fn test_three_of_five_refuses_two_signers() {
    let f = fixture_with(3, 5).await;
    assert_eq!(f.authority.signers().len(), 5);

    let err = f.send_signed(f.mint_ix(&[1, 4], 10), &[1, 4]).await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Authorization { authority: Some(address), .. } if address == *f.authority.address()
    ));

    // the token program counts the same way
    let mut assembler = f.ctx.assembler().await.unwrap();
    assembler.add(f.mint_ix(&[0, 3], 10)).unwrap();
    assembler.sign(f.ctx.payer()).unwrap();
    assembler.sign(&f.members[0]).unwrap();
    assembler.sign(&f.members[3]).unwrap();
    let err = f.ctx.submit_and_confirm("mint_to", &mut assembler).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Authorization { authority: None, .. }));
    assert_eq!(f.ledger.token_balance(&f.destination), Some(0));
}

#[tokio::test]
async fn test_three_of_five_accepts_any_three_members() {
    let f = fixture_with(3, 5).await;

    f.send_signed(f.mint_ix(&[0, 2, 4], 100), &[0, 2, 4]).await.unwrap();
    assert_eq!(f.ledger.token_balance(&f.destination), Some(100));

    // another subset, collected offline against a durable nonce
    let nonce_account = Keypair::new();
    nonce::create_nonce_account(&f.ctx, &nonce_account, &f.ctx.payer_pubkey())
        .await
        .unwrap();
    let anchor = nonce::durable_anchor(&f.ctx, &nonce_account.pubkey()).await.unwrap();
    let mut session =
        OfflineSigningSession::new(f.authority.clone(), f.ctx.payer_pubkey(), anchor, vec![f.mint_ix(&[1, 3, 4], 50)])
            .unwrap();
    let exported = session.export().unwrap();
    for i in [1, 3, 4] {
        let (pubkey, signature) = OfflineSigningSession::sign_offline(&exported, &f.members[i]).unwrap();
        session.add_signature(pubkey, signature).unwrap();
    }
    assert_eq!(session.check_authorization().unwrap(), 3);
    session.sign(f.ctx.payer()).unwrap();

    let mut assembler = session.into_assembler();
    multisig::submit_authorized(&f.ctx, &f.authority, &mut assembler)
        .await
        .unwrap();
    assert_eq!(f.ledger.token_balance(&f.destination), Some(150));
}

#[tokio::test]
async fn test_transfer_out_of_multisig_owned_account() {
    let f = fixture().await;
    let vault = Keypair::new();
    token::create_token_account(&f.ctx, &vault, &f.mint, f.authority.address())
        .await
        .unwrap();
    let mint = f
        .authority
        .mint_to_instruction(&f.mint, &vault.pubkey(), &f.member_keys(&[0, 1]), 300)
        .unwrap();
    f.send_signed(mint, &[0, 1]).await.unwrap();
    assert_eq!(f.ledger.token_balance(&vault.pubkey()), Some(300));

    // one member is not enough to move the vault's tokens
    let short = f
        .authority
        .transfer_instruction(&vault.pubkey(), &f.destination, &f.member_keys(&[2]), 120)
        .unwrap();
    assert!(matches!(
        f.send_signed(short, &[2]).await.unwrap_err(),
        ProtocolError::Authorization { .. }
    ));

    let transfer = f
        .authority
        .transfer_instruction(&vault.pubkey(), &f.destination, &f.member_keys(&[1, 2]), 120)
        .unwrap();
    f.send_signed(transfer, &[1, 2]).await.unwrap();
    assert_eq!(f.ledger.token_balance(&vault.pubkey()), Some(180));
    assert_eq!(f.ledger.token_balance(&f.destination), Some(120));
}
