// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Round Trip Benchmark
//!
//! Measures:
//! - Request packet encode/decode per codec and payload size
//! - Blocking single calls over the in-memory broker
//!
//! The broker runs in-process, so call latency is the RPC layer's own
//! overhead (router, runner and codec) without network I/O.

#![allow(clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use drpc::{
    Client, CodecKind, InvocationError, MemoryBroker, PacketCodec, RequestPacket, RpcConfig,
    Value, ValueType,
};
use std::hint::black_box as bb;

drpc::service! {
    pub trait Echo {
        contract = EchoContract;
        client = EchoClient;
        service = EchoService;

        fn echo(data: Vec<u8>) -> Vec<u8>;
        fn add(a: i32, b: i32) -> i32;
    }
}

struct Mirror;

impl Echo for Mirror {
    fn echo(&self, data: Vec<u8>) -> Result<Vec<u8>, InvocationError> {
        Ok(data)
    }

    fn add(&self, a: i32, b: i32) -> Result<i32, InvocationError> {
        Ok(a.wrapping_add(b))
    }
}

fn bench_packet_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_packet");

    for kind in [CodecKind::Json, CodecKind::Cdr] {
        let packets = PacketCodec::new(kind.build());
        for size in [16, 1024, 16384] {
            let request = RequestPacket::new(
                "bench-client",
                "bench-client-1",
                vec![Value::Bytes(vec![0xAB; size])],
            );
            let encoded = packets
                .encode_request(&request)
                .expect("request should encode");

            let id = format!("{}/{}", packets.codec_name(), size);
            group.bench_with_input(BenchmarkId::new("encode", &id), &request, |b, request| {
                b.iter(|| packets.encode_request(bb(request)).expect("encode"));
            });
            group.bench_with_input(BenchmarkId::new("decode", &id), &encoded, |b, encoded| {
                b.iter(|| {
                    packets
                        .decode_request(bb(encoded), &[ValueType::Bytes])
                        .expect("decode")
                });
            });
        }
    }

    group.finish();
}

fn bench_single_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_call");

    for kind in [CodecKind::Json, CodecKind::Cdr] {
        let config = RpcConfig {
            codec: kind,
            call_timeout_ms: 5_000,
            ..RpcConfig::default()
        };
        let broker = MemoryBroker::new();
        let server = Client::builder()
            .config(config.clone())
            .build(broker.transport())
            .expect("server creation");
        let _service = server
            .publish::<EchoContract, _>("bench", EchoService(Mirror))
            .expect("publish");
        let caller = Client::builder()
            .config(config)
            .build(broker.transport())
            .expect("caller creation");
        let echo = caller.connector::<EchoContract>().connect(Some("bench"));
        let name = match kind {
            CodecKind::Json => "json",
            CodecKind::Cdr => "cdr",
        };

        group.bench_function(BenchmarkId::new("add", name), |b| {
            b.iter(|| echo.add(bb(3), bb(4)).expect("call"));
        });
        group.bench_function(BenchmarkId::new("echo_1k", name), |b| {
            let data = vec![0x5A; 1024];
            b.iter(|| echo.echo(bb(data.clone())).expect("call"));
        });

        let _ = caller.close();
        let _ = server.close();
    }

    group.finish();
}

criterion_group!(benches, bench_packet_codec, bench_single_call);
criterion_main!(benches);
