// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pub/sub transport abstraction.
//!
//! The RPC layer only needs topic-addressed publish/subscribe with a
//! callback for inbound messages and a disconnect notification. Transport
//! calls are made from runner worker threads; inbound messages are delivered
//! on a thread owned by the transport.

#[cfg(feature = "memory-transport")]
pub mod memory;

#[cfg(feature = "memory-transport")]
pub use memory::{MemoryBroker, MemoryTransport};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport failures, classified for the failure policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    /// Too many in-flight operations
    #[error("transport busy")]
    Busy,

    #[error("transport operation timed out")]
    Timeout,

    /// Broker refused the operation
    #[error("{operation} rejected: {reason}")]
    Rejected { operation: String, reason: String },

    /// Transport or runner closed
    #[error("transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Busy, not connected and timeouts may succeed when tried again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Busy | Self::Timeout)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Delivery guarantee requested for publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosLevel {
    /// Level 0
    AtMostOnce,
    /// Level 1; duplicates possible
    AtLeastOnce,
    /// Level 2
    #[default]
    ExactlyOnce,
}

impl QosLevel {
    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// Session options passed to [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub client_id: String,
    pub keep_alive: Duration,
    pub clean_session: bool,
}

impl ConnectOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(30),
            clean_session: true,
        }
    }
}

/// Receives inbound traffic from a transport.
pub trait TransportListener: Send + Sync {
    /// A message arrived on `topic`.
    fn on_message(&self, topic: &str, payload: &[u8]);

    /// The connection was lost.
    fn on_disconnect(&self, cause: &TransportError);
}

/// Topic-addressed publish/subscribe client.
///
/// Implementations must be callable from several threads at once.
pub trait Transport: Send + Sync {
    fn connect(&self, options: &ConnectOptions) -> Result<(), TransportError>;

    fn publish(&self, topic: &str, payload: &[u8], qos: QosLevel) -> Result<(), TransportError>;

    /// Subscribe to topic filters (`+`/`#` wildcards allowed).
    fn subscribe(&self, filters: &[String]) -> Result<(), TransportError>;

    fn unsubscribe(&self, filters: &[String]) -> Result<(), TransportError>;

    fn disconnect(&self) -> Result<(), TransportError>;

    /// Install the inbound listener, replacing any previous one.
    fn set_listener(&self, listener: Arc<dyn TransportListener>);

    fn is_connected(&self) -> bool;
}

/// MQTT-style filter match: `+` matches one level, a trailing `#` matches
/// any number of remaining levels (including none).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
