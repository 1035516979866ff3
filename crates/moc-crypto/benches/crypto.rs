use bytes::Bytes;
use moc_crypto::{decrypt_chunk, encrypt_chunk, ChunkCipher, FileKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn bench_key() -> FileKey {
    FileKey::from_bytes([0xABu8; 32])
}

#[divan::bench(args = [1024, 65536])]
fn bench_encrypt_chunk(bencher: divan::Bencher, size: usize) {
    let file_key = bench_key();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            encrypt_chunk(divan::black_box(&file_key), divan::black_box(&data), &[]).unwrap()
        });
}

#[divan::bench(args = [1024, 65536])]
fn bench_decrypt_chunk(bencher: divan::Bencher, size: usize) {
    let file_key = bench_key();
    let encrypted = encrypt_chunk(&file_key, &make_data(size), &[]).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt_chunk(
                divan::black_box(&file_key),
                0,
                divan::black_box(&encrypted),
                &[],
            )
            .unwrap()
        });
}

#[divan::bench(args = [1, 4])]
fn bench_encrypt_file_8mib(bencher: divan::Bencher, parallelism: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cipher = ChunkCipher::new(parallelism);
    let data = Bytes::from(make_data(8 * 1024 * 1024));
    let key = [0x11u8; 32];
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench(|| {
            rt.block_on(cipher.encrypt_file(data.clone(), divan::black_box(&key)))
                .unwrap()
        });
}

fn main() {
    divan::main();
}
