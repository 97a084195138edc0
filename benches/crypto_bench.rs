use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flck::container::{self, Container, Mode};
use flck::crypto;
use flck::key::{derive_from_password, Key};

fn bench_cipher(c: &mut Criterion) {
    let data = vec![42u8; 1024 * 1024];
    let key = Key::generate();
    let sealed = crypto::seal(&key, &data).unwrap();

    c.bench_function("seal_1mb", |b| b.iter(|| crypto::seal(&key, black_box(&data)).unwrap()));
    c.bench_function("open_1mb", |b| b.iter(|| crypto::open(&key, black_box(&sealed)).unwrap()));
}

fn bench_container(c: &mut Criterion) {
    let payload = vec![7u8; 1024 * 1024];
    let bytes = container::encode(Mode::Password { salt: [1u8; 32] }, false, "report.pdf", &payload).unwrap();

    c.bench_function("container_encode_1mb", |b| {
        b.iter(|| container::encode(Mode::Keyfile, false, "report.pdf", black_box(&payload)).unwrap())
    });
    c.bench_function("container_decode_1mb", |b| b.iter(|| Container::decode(black_box(&bytes)).unwrap()));
}

fn bench_kdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdf");
    group.sample_size(10);
    group.bench_function("pbkdf2_sha256_480k", |b| {
        b.iter(|| derive_from_password(black_box("MySecurePassword123"), Some([9u8; 32])))
    });
    group.finish();
}

criterion_group!(benches, bench_cipher, bench_container, bench_kdf);
criterion_main!(benches);
