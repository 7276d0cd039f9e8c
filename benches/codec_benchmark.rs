use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mcprobe::{
    codec::{
        DecodeOptions, Values,
        varint::{read_varint, write_varint},
    },
    protocols::{packets::query, query::parse_stat_response},
};
use rand::Rng;

fn full_stat_values() -> Values {
    let mut info = Vec::new();
    for (k, v) in [
        ("hostname", "A Minecraft Server"),
        ("gametype", "SMP"),
        ("game_id", "MINECRAFT"),
        ("version", "1.20.4"),
        ("plugins", ""),
        ("map", "world"),
        ("numplayers", "50"),
        ("maxplayers", "100"),
        ("hostport", "25565"),
        ("hostip", "127.0.0.1"),
        ("whitelist", "off"),
    ] {
        info.push(k.to_string());
        info.push(v.to_string());
    }
    let players: Vec<String> = (0..50).map(|i| format!("player{i}")).collect();
    Values::new()
        .with("sessionID", 0x01020304i32)
        .with("info", info)
        .with("players", players)
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    c.bench_function("write_varint", |b| {
        let mut buf = Vec::with_capacity(5);
        b.iter(|| {
            buf.clear();
            write_varint(&mut buf, black_box(rng.gen_range(i32::MIN..i32::MAX)));
        })
    });

    let mut encoded = Vec::new();
    write_varint(&mut encoded, -1);
    c.bench_function("read_varint", |b| {
        b.iter(|| read_varint(black_box(&encoded)))
    });

    let values = full_stat_values();
    c.bench_function("encode_full_stat", |b| {
        b.iter(|| query::FULL_STAT_RESPONSE.encode(black_box(&values)))
    });

    let Ok(response) = query::FULL_STAT_RESPONSE.encode(&values) else {
        panic!("full stat values don't encode");
    };
    c.bench_function("decode_full_stat", |b| {
        b.iter(|| query::FULL_STAT_RESPONSE.decode(black_box(&response), &DecodeOptions::new()))
    });
    c.bench_function("parse_stat_response", |b| {
        b.iter(|| parse_stat_response(black_box(&response), 0x01020304))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
