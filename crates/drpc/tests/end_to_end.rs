// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Single-call round trips between two clients on one broker.

mod common;

use common::{client, Adder, CalculatorContract, CalculatorService, Fixed, Point};
use drpc::{
    Client, CodecKind, ConnectOptions, MemoryBroker, Record, RpcConfig, RpcError, TopicBuilder,
    Transport, TransportError, TransportListener,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_add_by_identifier() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    assert_eq!(calc.add(3, 4).unwrap(), 7);
}

#[test]
fn test_broadcast_reaches_published_instance() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let calls = Arc::new(AtomicUsize::new(0));
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::counting(&calls)))
        .unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(None);
    assert_eq!(calc.add(3, 4).unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_identifier_selects_instance() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _one = server
        .publish::<CalculatorContract, _>("one", CalculatorService(Fixed(1)))
        .unwrap();
    let _two = server
        .publish::<CalculatorContract, _>("two", CalculatorService(Fixed(2)))
        .unwrap();

    let caller = client(&broker);
    let connector = caller.connector::<CalculatorContract>();
    assert_eq!(connector.connect(Some("one")).add(0, 0).unwrap(), 1);
    assert_eq!(connector.connect(Some("two")).add(0, 0).unwrap(), 2);
}

#[test]
fn test_all_value_kinds() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _service = server
        .publish::<CalculatorContract, _>("calc", CalculatorService(Adder::default()))
        .unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("calc"));

    assert_eq!(calc.divide(i64::MAX, 1).unwrap(), i64::MAX);
    assert_eq!(calc.greet("drpc".to_string()).unwrap(), "hello drpc");
    assert_eq!(
        calc.scale(Record(Point { x: 10, y: 20 }), 3)
            .unwrap()
            .into_inner(),
        Point { x: 30, y: 60 }
    );
    calc.reset().unwrap();
}

#[test]
fn test_cdr_codec_round_trip() {
    let broker = MemoryBroker::new();
    let config = RpcConfig {
        codec: CodecKind::Cdr,
        ..common::fast_config()
    };
    let server = Client::builder()
        .config(config.clone())
        .build(broker.transport())
        .unwrap();
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();

    let caller = Client::builder()
        .config(config)
        .build(broker.transport())
        .unwrap();
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    assert_eq!(calc.add(-3, 4).unwrap(), 1);
    assert_eq!(calc.greet("cdr".into()).unwrap(), "hello cdr");
}

#[test]
fn test_random_arguments() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    for _ in 0..20 {
        let a = fastrand::i32(..);
        let b = fastrand::i32(..);
        assert_eq!(calc.add(a, b).unwrap(), a.wrapping_add(b));
    }
}

#[test]
fn test_failed_invocation_times_out() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    let err = calc.divide(1, 0).unwrap_err();
    assert!(matches!(err, RpcError::Timeout));

    // The service keeps answering after a failed invocation.
    assert_eq!(calc.divide(9, 3).unwrap(), 3);
    assert!(server.router().metrics().snapshot().2 >= 1);
}

#[test]
fn test_call_without_service_times_out() {
    let broker = MemoryBroker::new();
    let caller = Client::builder()
        .call_timeout(Duration::from_millis(100))
        .build(broker.transport())
        .unwrap();

    let calc = caller.connector::<CalculatorContract>().connect(Some("nobody"));
    assert!(matches!(calc.add(1, 2), Err(RpcError::Timeout)));
}

#[test]
fn test_callback_registration_removed_after_call() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    for i in 0..5 {
        assert_eq!(calc.add(i, i).unwrap(), 2 * i);
    }
    assert_eq!(caller.router().topic_count(), 0);
}

#[test]
fn test_duplicate_responses_are_harmless() {
    let broker = MemoryBroker::new();
    broker.set_duplicate_deliveries(true);
    let server = client(&broker);
    let calls = Arc::new(AtomicUsize::new(0));
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::counting(&calls)))
        .unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    assert_eq!(calc.add(20, 22).unwrap(), 42);
    assert_eq!(calc.add(1, 1).unwrap(), 2);

    // Every request was delivered twice, so the service ran twice per call.
    assert!(common::wait_until(Duration::from_secs(2), || calls
        .load(Ordering::SeqCst)
        == 4));
}

#[test]
fn test_unpublish_stops_answers() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();
    assert_eq!(server.router().topic_count(), 10);

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    assert_eq!(calc.add(1, 1).unwrap(), 2);

    service.close();
    service.close();
    assert_eq!(server.router().topic_count(), 0);
    assert!(matches!(calc.add(1, 1), Err(RpcError::Timeout)));
}

#[test]
fn test_concurrent_callers() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();

    let caller = client(&broker);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let connector = caller.connector::<CalculatorContract>();
            std::thread::spawn(move || {
                let calc = connector.connect(Some("42"));
                for i in 0..10 {
                    assert_eq!(calc.add(t, i).unwrap(), t + i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

struct Tap {
    topics: parking_lot::Mutex<Vec<String>>,
}

impl TransportListener for Tap {
    fn on_message(&self, topic: &str, _payload: &[u8]) {
        self.topics.lock().push(topic.to_string());
    }

    fn on_disconnect(&self, _cause: &TransportError) {}
}

#[test]
fn test_service_filter_observes_requests() {
    let broker = MemoryBroker::new();
    let server = client(&broker);
    let _service = server
        .publish::<CalculatorContract, _>("42", CalculatorService(Adder::default()))
        .unwrap();

    let tap = Arc::new(Tap {
        topics: parking_lot::Mutex::new(Vec::new()),
    });
    let monitor = broker.transport();
    monitor.set_listener(tap.clone());
    monitor.connect(&ConnectOptions::new("monitor")).unwrap();
    let filter = TopicBuilder::new().operation_filter("Calculator").unwrap();
    monitor.subscribe(&[filter]).unwrap();

    let caller = client(&broker);
    let calc = caller.connector::<CalculatorContract>().connect(Some("42"));
    assert_eq!(calc.add(3, 4).unwrap(), 7);
    calc.reset().unwrap();

    assert!(common::wait_until(Duration::from_secs(2), || tap
        .topics
        .lock()
        .len()
        == 2));
    assert_eq!(
        *tap.topics.lock(),
        vec![
            "s/Calculator/add/42".to_string(),
            "s/Calculator/reset/42".to_string()
        ]
    );
}
