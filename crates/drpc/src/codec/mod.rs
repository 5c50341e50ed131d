// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value codecs: translate an ordered list of typed values to and from bytes.
//!
//! Two codecs are provided:
//! - [`JsonCodec`] encodes the list as one JSON array (default)
//! - [`CdrCodec`] encodes the list as little-endian, length-prefixed binary
//!
//! Any codec satisfies the contract as long as it is order-preserving,
//! type-directed, and reports how many bytes one encoded list occupied.

mod cdr;
mod json;
mod value;

pub use cdr::CdrCodec;
pub use json::JsonCodec;
pub use value::{Value, ValueType};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Input is truncated, has the wrong element count, or is not a value list
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Value at `position` does not match the requested type
    #[error("type mismatch at position {position}: expected {expected}, found {found}")]
    TypeMismatch {
        position: usize,
        expected: ValueType,
        found: String,
    },

    /// Value could not be encoded
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Values decoded from the front of a byte slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub values: Vec<Value>,
    /// Bytes of input making up the decoded list; trailing bytes are untouched.
    pub consumed: usize,
}

/// Pluggable value codec.
pub trait ValueCodec: Send + Sync {
    /// Encode `values` as one self-delimiting list.
    fn encode(&self, values: &[Value]) -> Result<Vec<u8>, CodecError>;

    /// Decode exactly one list from the front of `bytes`, parsing position `i`
    /// as `types[i]`.
    ///
    /// Fails with [`CodecError::MalformedPacket`] when the list holds a
    /// different number of values than `types`.
    fn decode(&self, bytes: &[u8], types: &[ValueType]) -> Result<Decoded, CodecError>;

    /// Short codec name for logging.
    fn name(&self) -> &'static str;
}

/// Codec selection for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Json,
    Cdr,
}

impl CodecKind {
    #[must_use]
    pub fn build(self) -> Arc<dyn ValueCodec> {
        match self {
            Self::Json => Arc::new(JsonCodec::new()),
            Self::Cdr => Arc::new(CdrCodec::new()),
        }
    }
}
