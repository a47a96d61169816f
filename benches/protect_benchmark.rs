use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use policyvault::{
    generate_sealing_root, PolicyVault, SystemEntropy, EntropySource, AES_256_CBC_HMAC_SHA256,
};

const PLATFORM: &str = "bench-enclave";

fn benchmark_protect(c: &mut Criterion) {
    let mut group = c.benchmark_group("protect_unprotect");

    let root = generate_sealing_root().unwrap();
    let vault = PolicyVault::with_software_sealer(root, b"bench-measurement".to_vec()).unwrap();
    let key = vault
        .construct_key_for_protect("protect-key", AES_256_CBC_HMAC_SHA256)
        .unwrap();

    let sizes = [("100B", 100), ("1KB", 1024), ("10KB", 10 * 1024)];

    for (name, size) in sizes {
        let mut payload = vec![0u8; size];
        SystemEntropy::new().fill(&mut payload).unwrap();
        let blob = vault.protect(PLATFORM, &key, &payload).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            criterion::BenchmarkId::new("protect", name),
            &payload,
            |b, payload| {
                b.iter(|| vault.protect(black_box(PLATFORM), black_box(&key), black_box(payload)).unwrap());
            },
        );
        group.bench_with_input(
            criterion::BenchmarkId::new("unprotect", name),
            &blob,
            |b, blob| {
                b.iter(|| vault.unprotect(black_box(PLATFORM), black_box(blob)).unwrap());
            },
        );
    }
    group.finish();
}

fn benchmark_save_recover(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy_store.bin");

    let root = generate_sealing_root().unwrap();
    let vault = PolicyVault::with_software_sealer(root, b"bench-measurement".to_vec()).unwrap();
    let mut store = vault.new_store();
    for i in 0..50 {
        store
            .insert_or_update(&format!("tag-{i}"), "bytes", vec![i as u8; 256])
            .unwrap();
    }

    c.bench_function("save_50_entries", |b| {
        b.iter(|| vault.save(PLATFORM, black_box(&store), &path).unwrap());
    });
    c.bench_function("recover_50_entries", |b| {
        b.iter(|| vault.recover(PLATFORM, &path).unwrap());
    });
}

criterion_group!(benches, benchmark_protect, benchmark_save_recover);
criterion_main!(benches);
