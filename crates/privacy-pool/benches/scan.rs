//! trial decryption throughput
//!
//! run with: cargo bench -p privacy-pool

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use privacy_pool::{Amount, CipherRecord, FieldElement, PrivacyKey, Scanner};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// `count` records, every `stride`-th one ours
fn records(key: &mut PrivacyKey, count: usize, stride: usize) -> Vec<CipherRecord> {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let mut other = PrivacyKey::generate(&mut rng);
    let scope = FieldElement::from(1u64);
    (0..count)
        .map(|i| {
            let owner = if i % stride == 0 { &mut *key } else { &mut other };
            let c = owner
                .commit(&mut rng, scope, Amount(i as u128 + 1))
                .expect("commitment");
            CipherRecord::from_commitment(&c, i as u64)
        })
        .collect()
}

fn bench_scan_sequential(c: &mut Criterion) {
    let mut key = PrivacyKey::generate(&mut ChaCha20Rng::seed_from_u64(1));
    let records = records(&mut key, 256, 16);

    let mut group = c.benchmark_group("scan_sequential");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("256_records", |b| {
        b.iter(|| black_box(Scanner::new(&key).scan_sequential(&records).len()))
    });
    group.finish();
}

fn bench_scan_parallel(c: &mut Criterion) {
    let mut key = PrivacyKey::generate(&mut ChaCha20Rng::seed_from_u64(1));
    let records = records(&mut key, 256, 16);

    let mut group = c.benchmark_group("scan_parallel");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("256_records", |b| {
        b.iter(|| black_box(Scanner::new(&key).scan(&records).len()))
    });
    group.finish();
}

fn bench_nonce_window(c: &mut Criterion) {
    let mut key = PrivacyKey::generate(&mut ChaCha20Rng::seed_from_u64(2));
    let records = records(&mut key, 64, 64);

    let mut group = c.benchmark_group("nonce_window");
    for window in [1u64, 8, 32] {
        group.throughput(Throughput::Elements(records.len() as u64 * window));
        group.bench_function(format!("{window}_nonces"), |b| {
            b.iter(|| {
                let scanner = Scanner::with_nonces(&key, 0..=window - 1);
                black_box(scanner.scan(&records).len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scan_sequential, bench_scan_parallel, bench_nonce_window);
criterion_main!(benches);
