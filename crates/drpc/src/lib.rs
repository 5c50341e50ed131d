// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # drpc - Remote procedure calls over publish/subscribe topics
//!
//! A process publishes an implementation of a typed service contract under
//! an identifier; other processes call its operations by name. Requests and
//! responses travel as topic-addressed messages and are matched by
//! correlation id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drpc::{Client, InvocationError, MemoryBroker};
//!
//! drpc::service! {
//!     pub trait Calculator {
//!         contract = CalculatorContract;
//!         client = CalculatorClient;
//!         service = CalculatorService;
//!
//!         fn add(a: i32, b: i32) -> i32;
//!     }
//! }
//!
//! struct Adder;
//!
//! impl Calculator for Adder {
//!     fn add(&self, a: i32, b: i32) -> Result<i32, InvocationError> {
//!         Ok(a + b)
//!     }
//! }
//!
//! fn main() -> drpc::RpcResult<()> {
//!     let broker = MemoryBroker::new();
//!
//!     let server = Client::builder().build(broker.transport())?;
//!     let _service = server.publish::<CalculatorContract, _>("42", CalculatorService(Adder))?;
//!
//!     let client = Client::builder().build(broker.transport())?;
//!     let calc = client.connector::<CalculatorContract>().connect(Some("42"));
//!     assert_eq!(calc.add(3, 4)?, 7);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |   Connector (single call / drpc)        Service publisher           |
//! +---------------------------------------------------------------------+
//! |   Packet codec (header + body)  |  Value codec (JSON / CDR)         |
//! +---------------------------------------------------------------------+
//! |   Message router (topic -> handlers)  |  Task runner (retry policy) |
//! +---------------------------------------------------------------------+
//! |   Transport (pub/sub, e.g. in-memory broker)                        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Topics
//!
//! | Topic | Use |
//! |-------|-----|
//! | `s/<service>/<op>` | requests to every instance |
//! | `s/<service>/<op>/<identifier>` | requests to one instance |
//! | `c/<correlation_id>` | responses to one call |

/// Calling remote services (single call and streaming).
pub mod client;
/// Value model and value codecs.
pub mod codec;
/// Client configuration (TOML).
pub mod config;
/// Service contracts, invokers and typed conversions.
pub mod contract;
/// Error types.
pub mod error;
/// Client entry point.
pub mod node;
/// Request/response packets.
pub mod packet;
/// Idempotent deregistration handles.
pub mod registration;
/// Topic to handler routing.
pub mod router;
/// Retryable task runner and failure policies.
pub mod runner;
/// Service publishing.
mod server;
/// Canonical topic names.
pub mod topic;
/// Pub/sub transport abstraction.
pub mod transport;

pub use client::{Connector, Invocation, Recorder, Stub};
pub use codec::{CdrCodec, CodecError, CodecKind, JsonCodec, Value, ValueCodec, ValueType};
pub use config::{ConfigError, RpcConfig};
pub use contract::{
    Args, ContractDescriptor, InvocationError, Invoker, Operation, Record, RpcValue,
    ServiceContract, ServiceHandler,
};
pub use error::{RpcError, RpcResult};
pub use node::{Client, ClientBuilder};
pub use packet::{PacketCodec, RequestPacket, ResponsePacket};
pub use registration::Registration;
pub use router::{MessageHandler, MessageRouter, RouterMetrics};
pub use runner::{
    FailurePolicy, RetryLimit, TaskHandle, TaskKind, TaskRunner, TaskStatus, TransientOnly,
};
pub use topic::{Topic, TopicBuilder};
pub use transport::{ConnectOptions, QosLevel, Transport, TransportError, TransportListener};

#[cfg(feature = "memory-transport")]
pub use transport::{MemoryBroker, MemoryTransport};
