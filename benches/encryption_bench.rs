use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zip_builder::{ArchiveWriter, Encryption};

fn generate_data(size: usize) -> Vec<u8> {
    // Generate compressible data (repeating pattern)
    let mut data = Vec::with_capacity(size);
    let pattern = b"This is a test pattern that repeats. Lorem ipsum dolor sit amet. ";
    for _ in 0..(size / pattern.len() + 1) {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn build(data: &[u8], encryption: Encryption) -> Vec<u8> {
    let mut writer = ArchiveWriter::new();
    writer
        .create()
        .unwrap()
        .use_encryption("benchmark_password_123", encryption)
        .unwrap()
        .add_bytes(black_box(data), "test.txt")
        .unwrap();
    writer.finalize().unwrap()
}

fn bench_encryption(c: &mut Criterion) {
    let sizes = vec![1024, 10 * 1024, 100 * 1024, 1024 * 1024]; // 1KB, 10KB, 100KB, 1MB

    let mut group = c.benchmark_group("encryption_overhead");

    for size in sizes {
        let data = generate_data(size);
        group.throughput(Throughput::Bytes(size as u64));

        for (label, method) in [
            ("no_encryption", Encryption::None),
            ("classic", Encryption::Classic),
            ("aes128", Encryption::Aes128),
            ("aes256", Encryption::Aes256),
        ] {
            group.bench_with_input(BenchmarkId::new(label, size), &data, |b, data| {
                b.iter(|| build(data, method));
            });
        }
    }

    group.finish();
}

fn bench_many_entries(c: &mut Criterion) {
    let data = generate_data(4 * 1024);

    c.bench_function("1000_entries_aes256", |b| {
        b.iter(|| {
            let mut writer = ArchiveWriter::new();
            writer
                .create()
                .unwrap()
                .use_encryption("benchmark_password_123", Encryption::Aes256)
                .unwrap();
            for i in 0..1000 {
                writer.add_bytes(&data, &format!("files/{}.txt", i)).unwrap();
            }
            writer.finalize().unwrap()
        });
    });
}

criterion_group!(benches, bench_encryption, bench_many_entries);
criterion_main!(benches);
