//! Benchmarks for transaction assembly
//!
//! - freeze with a recent blockhash and with a durable nonce
//! - signing and verification of a frozen message
//! - offline export/import of message bytes
//! - program address search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use txkit::address::derive_program_address;
use txkit::tx_builder::{FreshnessAnchor, FrozenMessage, TransactionAssembler};

fn instructions(payer: &Pubkey, count: usize) -> Vec<Instruction> {
    (0..count)
        .map(|i| {
            Instruction::new_with_bytes(
                Pubkey::new_unique(),
                &[i as u8, 0, 0, 0, 0, 0, 0, 0, 0],
                vec![
                    AccountMeta::new(*payer, true),
                    AccountMeta::new(Pubkey::new_unique(), false),
                    AccountMeta::new_readonly(Pubkey::new_unique(), false),
                ],
            )
        })
        .collect()
}

fn assembler(payer: &Keypair, durable: bool, count: usize) -> TransactionAssembler {
    let anchor = if durable {
        FreshnessAnchor::durable(Pubkey::new_unique(), payer.pubkey(), Hash::new_unique())
    } else {
        FreshnessAnchor::RecentBlockhash(Hash::new_unique())
    };
    let mut assembler = TransactionAssembler::with_anchor(payer.pubkey(), anchor);
    assembler.add_many(instructions(&payer.pubkey(), count)).unwrap();
    assembler
}

fn bench_freeze(c: &mut Criterion) {
    let payer = Keypair::new();
    let mut group = c.benchmark_group("freeze");

    for count in [1usize, 4, 8].iter() {
        for durable in [false, true] {
            let label = if durable { "durable" } else { "recent" };
            let template = assembler(&payer, durable, *count);
            group.bench_with_input(BenchmarkId::new(label, count), count, |b, _| {
                b.iter(|| {
                    let mut assembler = template.clone();
                    black_box(assembler.freeze().unwrap().bytes().len());
                })
            });
        }
    }

    group.finish();
}

fn bench_sign_and_verify(c: &mut Criterion) {
    let payer = Keypair::new();
    let mut frozen = assembler(&payer, true, 4);
    frozen.freeze().unwrap();

    c.bench_function("sign_frozen_message", |b| {
        b.iter(|| {
            let mut assembler = frozen.clone();
            black_box(assembler.sign(&payer).unwrap());
        })
    });

    let mut signed = frozen.clone();
    signed.sign(&payer).unwrap();
    c.bench_function("verify_signatures", |b| b.iter(|| black_box(signed.verify())));
    c.bench_function("finalize", |b| b.iter(|| black_box(signed.finalize().unwrap().wire.len())));
}

fn bench_export_import(c: &mut Criterion) {
    let payer = Keypair::new();
    let mut assembler = assembler(&payer, true, 4);
    let encoded = assembler.freeze().unwrap().to_base64();

    c.bench_function("frozen_message_import", |b| {
        b.iter(|| black_box(FrozenMessage::from_base64(black_box(&encoded)).unwrap()))
    });
}

fn bench_program_address(c: &mut Criterion) {
    let program = Pubkey::new_unique();
    c.bench_function("derive_program_address", |b| {
        b.iter(|| black_box(derive_program_address(&program, &[b"escrow"]).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_freeze,
    bench_sign_and_verify,
    bench_export_import,
    bench_program_address
);
criterion_main!(benches);
