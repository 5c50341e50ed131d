// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures for drpc integration tests.

#![allow(dead_code)] // Not every test binary uses every fixture

use drpc::{Client, InvocationError, MemoryBroker, Record, RpcConfig};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

drpc::service! {
    /// Arithmetic test service.
    pub trait Calculator {
        contract = CalculatorContract;
        client = CalculatorClient;
        service = CalculatorService;

        fn add(a: i32, b: i32) -> i32;
        fn divide(a: i64, b: i64) -> i64;
        fn scale(p: Record<Point>, factor: i32) -> Record<Point>;
        fn greet(name: String) -> String;
        fn reset() -> ();
    }
}

/// Calculator counting every invocation.
#[derive(Default)]
pub struct Adder {
    pub calls: Arc<AtomicUsize>,
}

impl Adder {
    pub fn counting(calls: &Arc<AtomicUsize>) -> Self {
        Self {
            calls: Arc::clone(calls),
        }
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Calculator for Adder {
    fn add(&self, a: i32, b: i32) -> Result<i32, InvocationError> {
        self.hit();
        Ok(a.wrapping_add(b))
    }

    fn divide(&self, a: i64, b: i64) -> Result<i64, InvocationError> {
        self.hit();
        a.checked_div(b)
            .ok_or_else(|| InvocationError::failed("division by zero"))
    }

    fn scale(&self, p: Record<Point>, factor: i32) -> Result<Record<Point>, InvocationError> {
        self.hit();
        Ok(Record(Point {
            x: p.0.x * factor,
            y: p.0.y * factor,
        }))
    }

    fn greet(&self, name: String) -> Result<String, InvocationError> {
        self.hit();
        Ok(format!("hello {}", name))
    }

    fn reset(&self) -> Result<(), InvocationError> {
        self.hit();
        Ok(())
    }
}

/// Calculator whose `add` always returns a fixed value.
pub struct Fixed(pub i32);

impl Calculator for Fixed {
    fn add(&self, _a: i32, _b: i32) -> Result<i32, InvocationError> {
        Ok(self.0)
    }

    fn divide(&self, _a: i64, _b: i64) -> Result<i64, InvocationError> {
        Ok(i64::from(self.0))
    }

    fn scale(&self, p: Record<Point>, _factor: i32) -> Result<Record<Point>, InvocationError> {
        Ok(p)
    }

    fn greet(&self, _name: String) -> Result<String, InvocationError> {
        Ok(self.0.to_string())
    }

    fn reset(&self) -> Result<(), InvocationError> {
        Ok(())
    }
}

/// Config with a short call timeout so failing calls end quickly.
pub fn fast_config() -> RpcConfig {
    RpcConfig {
        call_timeout_ms: 300,
        worker_threads: 2,
        ..RpcConfig::default()
    }
}

pub fn client(broker: &MemoryBroker) -> Client {
    Client::builder()
        .config(fast_config())
        .build(broker.transport())
        .expect("client should connect to the memory broker")
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
