use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use replisync::fingerprint::{fingerprint_bytes, fingerprint_file};
use replisync::plan::SyncPlan;
use replisync::reconcile::{Reconciler, SyncOptions};
use replisync::sink::MemorySink;
use replisync::snapshot::TreeScanner;
use replisync::utils::IgnoreSet;
use replisync::utils::thread_pool;
use std::fs;
use std::hint::black_box;
use std::path::Path;
use tempfile::tempdir;

fn create_tree(root: &Path, count: usize) {
    for i in 0..count {
        let path = root.join(format!("dir_{}/file_{i}.txt", i % 16));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let content = format!("This is test file number {i} with some content to fingerprint");
        fs::write(&path, content).unwrap();
    }
}

fn benchmark_fingerprinting(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let small_file = dir.path().join("small.bin");
    let medium_file = dir.path().join("medium.bin");
    let large_file = dir.path().join("large.bin");

    fs::write(&small_file, vec![b'a'; 1024]).unwrap(); // 1KB
    fs::write(&medium_file, vec![b'b'; 1024 * 100]).unwrap(); // 100KB
    fs::write(&large_file, vec![b'c'; 1024 * 1024 * 10]).unwrap(); // 10MB

    let mut group = c.benchmark_group("fingerprint_file");

    group.bench_function("1kb", |b| b.iter(|| fingerprint_file(black_box(&small_file))));

    group.bench_function("100kb", |b| {
        b.iter(|| fingerprint_file(black_box(&medium_file)));
    });

    group.bench_function("10mb", |b| {
        b.iter(|| fingerprint_file(black_box(&large_file)));
    });

    group.finish();

    let buffer = vec![b'd'; 1024 * 1024];
    c.bench_function("fingerprint_bytes_1mb", |b| {
        b.iter(|| fingerprint_bytes(black_box(&buffer)));
    });
}

fn benchmark_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_scan");

    for count in &[100, 1000] {
        let dir = tempdir().unwrap();
        create_tree(dir.path(), *count);
        let ignore = IgnoreSet::default();

        for threads in &[1, 4] {
            let pool = thread_pool::pool_for(*threads).unwrap();
            let scanner = TreeScanner::new(&ignore, &pool);
            group.bench_with_input(
                BenchmarkId::new(format!("{threads}_threads"), count),
                count,
                |b, _| b.iter(|| scanner.scan(black_box(dir.path()))),
            );
        }
    }

    group.finish();
}

fn benchmark_plan(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source");
    let replica = dir.path().join("replica");
    create_tree(&source, 1000);
    create_tree(&replica, 1000);
    for i in (0..1000).step_by(10) {
        fs::write(
            replica.join(format!("dir_{}/file_{i}.txt", i % 16)),
            "stale",
        )
        .unwrap();
    }

    let ignore = IgnoreSet::default();
    let pool = thread_pool::pool_for(0).unwrap();
    let scanner = TreeScanner::new(&ignore, &pool);
    let source_snapshot = scanner.scan(&source).snapshot;
    let replica_snapshot = scanner.scan(&replica).snapshot;

    c.bench_function("plan_1000_files", |b| {
        b.iter(|| SyncPlan::between(black_box(&source_snapshot), black_box(&replica_snapshot)));
    });
}

fn benchmark_idle_pass(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source");
    let replica = dir.path().join("replica");
    create_tree(&source, 500);

    let reconciler = Reconciler::new(SyncOptions::default()).unwrap();
    let sink = MemorySink::new();
    reconciler.reconcile(&source, &replica, &sink);

    c.bench_function("idle_pass_500_files", |b| {
        b.iter(|| reconciler.reconcile(black_box(&source), black_box(&replica), &sink));
    });
}

criterion_group!(
    benches,
    benchmark_fingerprinting,
    benchmark_scan,
    benchmark_plan,
    benchmark_idle_pass
);
criterion_main!(benches);
