//! Пропускная способность разбора снапшотов.
//!
//! Измеряет:
//! - полный разбор снапшота со строками и хэшами-listpack
//! - разбор без раскрытия элементов
//! - обход одиночного listpack
//! - стоимость проверки CRC-64

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use zrdb::{
    rdb::{
        containers::{backlen_size, walk_listpack},
        crc64::crc64,
        tags::{OPCODE_AUX, OPCODE_EOF, OPCODE_SELECTDB},
    },
    KeyCollector, ParserConfig, SnapshotParser,
};

// ============================================================================
// Генерация снапшотов
// ============================================================================

fn length(n: usize) -> Vec<u8> {
    if n < 64 {
        vec![n as u8]
    } else if n < 16384 {
        vec![0x40 | (n >> 8) as u8, (n & 0xFF) as u8]
    } else {
        let mut out = vec![0x80];
        out.extend_from_slice(&(n as u32).to_be_bytes());
        out
    }
}

fn string(data: &[u8]) -> Vec<u8> {
    let mut out = length(data.len());
    out.extend_from_slice(data);
    out
}

fn random_bytes(
    rng: &mut SmallRng,
    len: usize,
) -> Vec<u8> {
    (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect()
}

/// Listpack из коротких строк (до 63 байт).
fn listpack(items: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    for item in items {
        let start = body.len();
        body.push(0x80 | item.len() as u8);
        body.extend_from_slice(item);
        let entry_len = body.len() - start;
        body.extend(std::iter::repeat(0u8).take(backlen_size(entry_len as u64)));
    }
    let mut out = Vec::new();
    out.extend_from_slice(&((6 + body.len() + 1) as u32).to_le_bytes());
    out.extend_from_slice(&(items.len() as u16).to_le_bytes());
    out.extend(body);
    out.push(0xFF);
    out
}

/// Снапшот: половина ключей строки, половина хэши-listpack на `fields` полей.
fn build_snapshot(
    keys: usize,
    fields: usize,
) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut buf = b"REDIS0011".to_vec();
    buf.push(OPCODE_AUX);
    buf.extend(string(b"redis-ver"));
    buf.extend(string(b"7.2.0"));
    buf.push(OPCODE_SELECTDB);
    buf.extend(length(0));

    for i in 0..keys {
        let name = format!("key:{i:08}");
        if i % 2 == 0 {
            buf.push(0);
            buf.extend(string(name.as_bytes()));
            let value = random_bytes(&mut rng, 32);
            buf.extend(string(&value));
        } else {
            buf.push(16);
            buf.extend(string(name.as_bytes()));
            let items: Vec<Vec<u8>> = (0..fields * 2)
                .map(|_| random_bytes(&mut rng, 12))
                .collect();
            buf.extend(string(&listpack(&items)));
        }
    }

    buf.push(OPCODE_EOF);
    let crc = crc64(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

fn parse_all(
    data: &[u8],
    config: ParserConfig,
) -> usize {
    let mut parser = SnapshotParser::with_config(data, config);
    let mut collector = KeyCollector::new();
    parser
        .parse(&mut collector)
        .expect("benchmark snapshot must parse");
    collector.len()
}

// ============================================================================
// Бенчмарки
// ============================================================================

fn bench_full_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_parse");

    for &keys in &[100usize, 1_000, 10_000] {
        let data = build_snapshot(keys, 8);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("collect", keys), &data, |b, data| {
            b.iter(|| parse_all(black_box(data), ParserConfig::default()))
        });

        group.bench_with_input(BenchmarkId::new("summary_only", keys), &data, |b, data| {
            let config = ParserConfig {
                collect_elements: false,
                ..ParserConfig::default()
            };
            b.iter(|| parse_all(black_box(data), config.clone()))
        });
    }

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");
    let data = build_snapshot(5_000, 4);
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("verify", |b| {
        b.iter(|| parse_all(black_box(&data), ParserConfig::default()))
    });
    group.bench_function("skip", |b| {
        let config = ParserConfig {
            verify_checksum: false,
            ..ParserConfig::default()
        };
        b.iter(|| parse_all(black_box(&data), config.clone()))
    });
    group.bench_function("crc64_raw", |b| b.iter(|| crc64(black_box(&data))));

    group.finish();
}

fn bench_listpack_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("listpack_walk");
    let mut rng = SmallRng::seed_from_u64(7);

    for &n in &[16usize, 256, 4096] {
        let items: Vec<Vec<u8>> = (0..n).map(|_| random_bytes(&mut rng, 20)).collect();
        let blob = listpack(&items);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::from_parameter(n), &blob, |b, blob| {
            b.iter(|| {
                let walk = walk_listpack(black_box(blob), 0).expect("valid listpack");
                black_box(walk.entries.len())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_parse,
    bench_checksum,
    bench_listpack_walk
);
criterion_main!(benches);
