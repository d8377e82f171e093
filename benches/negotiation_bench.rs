//! Negotiation benchmarks.
//!
//! Measures the shared-key handshake on its own and through the full driver
//! over a connected socket pair.

use std::os::unix::net::UnixStream;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use secctx::crypto::{EphemeralSecret, PublicKey};
use secctx::engine::shared_key::{SecretKey, ServiceName};
use secctx::engine::{Keytab, SharedKeyEngine};
use secctx::{
    negotiate_as_acceptor, negotiate_as_initiator, NegotiationOptions, SecurityEngine,
    TokenFraming, UnixChannel,
};

fn engine() -> SharedKeyEngine {
    let mut keytab = Keytab::new();
    keytab.insert(
        &ServiceName::parse("host@localhost").unwrap(),
        SecretKey::from_bytes([0x42u8; 32]),
    );
    SharedKeyEngine::new(keytab)
}

fn bench_x25519_keygen(c: &mut Criterion) {
    c.bench_function("x25519_keygen", |b| {
        b.iter(|| {
            let secret = EphemeralSecret::random();
            black_box(PublicKey::from(&secret))
        })
    });
}

fn bench_engine_handshake(c: &mut Criterion) {
    let engine = engine();

    c.bench_function("engine_handshake", |b| {
        b.iter(|| {
            let mut initiator = None;
            let mut acceptor = None;
            let init = engine.initiate(&mut initiator, None, &[]);
            let reply = engine.accept(&mut acceptor, None, &init.token);
            let confirm = engine.initiate(&mut initiator, None, &reply.step.token);
            black_box(engine.accept(&mut acceptor, None, &confirm.token))
        })
    });
}

fn socket_handshake(engine: &SharedKeyEngine, options: &NegotiationOptions) {
    let (client, server) = UnixStream::pair().unwrap();

    thread::scope(|s| {
        let acceptor = s.spawn(|| {
            let mut channel = UnixChannel::new(server);
            negotiate_as_acceptor(engine, &mut channel, None, options)
        });
        let mut channel = UnixChannel::new(client);
        negotiate_as_initiator(engine, &mut channel, None, options).unwrap();
        acceptor.join().unwrap().unwrap();
    });
}

fn bench_driver_handshake(c: &mut Criterion) {
    let engine = engine();
    let mut group = c.benchmark_group("driver_handshake");

    let raw = NegotiationOptions::default();
    group.bench_function("raw", |b| b.iter(|| socket_handshake(&engine, &raw)));

    let framed = NegotiationOptions {
        framing: TokenFraming::LengthPrefixed,
        ..NegotiationOptions::default()
    };
    group.bench_function("length_prefixed", |b| b.iter(|| socket_handshake(&engine, &framed)));

    group.finish();
}

criterion_group!(
    benches,
    bench_x25519_keygen,
    bench_engine_handshake,
    bench_driver_handshake,
);

criterion_main!(benches);
