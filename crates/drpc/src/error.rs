// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for drpc operations.
//!
//! Receive-side failures (malformed packets, type mismatches, failing service
//! implementations) are logged where they happen and never travel back to the
//! sender. Send-side failures surface to the caller as [`RpcError::TaskFailed`].

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::contract::InvocationError;
use crate::runner::TaskKind;
use crate::transport::TransportError;
use thiserror::Error;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors that can occur during RPC operations
#[derive(Debug, Error)]
pub enum RpcError {
    /// Packet or value could not be encoded/decoded
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Service implementation failed while handling a request
    #[error("invocation failed: {0}")]
    Invocation(#[from] InvocationError),

    /// Transport operation failed (before retry policy was consulted)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A transport task exhausted its retries
    #[error("{kind} task failed after {attempts} retries: {source}")]
    TaskFailed {
        kind: TaskKind,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// No response arrived before the call timeout elapsed
    #[error("RPC request timed out")]
    Timeout,

    /// A streaming invoker did not make exactly one call on its stub
    #[error("invoker must make exactly one call, made {count}")]
    InvalidCapture { count: usize },

    /// Operation is not part of the service contract
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Topic segment contains a reserved character
    #[error("invalid topic segment: {0:?}")]
    InvalidTopic(String),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Client or runner was shut down
    #[error("drpc client shut down")]
    Shutdown,
}

impl RpcError {
    /// Whether this error was produced on the send path (transport/task).
    pub fn is_send_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::TaskFailed { .. })
    }
}
