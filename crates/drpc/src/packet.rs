// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/response packets.
//!
//! A packet is one value list: fixed header entries followed by the body.
//!
//! ```text
//! request:  [client_id, correlation_id, arg0, arg1, ...]
//! response: [correlation_id]            or [correlation_id, result]
//! ```
//!
//! The header layout is a protocol constant and is never negotiated.

use crate::codec::{CodecError, Value, ValueCodec, ValueType};
use std::sync::Arc;

/// Header entries of a request packet: client id, correlation id.
pub const REQUEST_HEADER: [ValueType; 2] = [ValueType::String, ValueType::String];

/// Header entries of a response packet: correlation id.
pub const RESPONSE_HEADER: [ValueType; 1] = [ValueType::String];

/// A call from a client to a service operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPacket {
    /// Identifies the caller
    pub client_id: String,
    /// Unique per call; responses are published to its callback topic
    pub correlation_id: String,
    /// Operation arguments, in parameter order
    pub body: Vec<Value>,
}

impl RequestPacket {
    pub fn new(
        client_id: impl Into<String>,
        correlation_id: impl Into<String>,
        body: Vec<Value>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            correlation_id: correlation_id.into(),
            body,
        }
    }
}

/// A result returned for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePacket {
    /// Correlation id copied from the request
    pub correlation_id: String,
    /// Empty for void operations, otherwise exactly one value
    pub body: Vec<Value>,
}

impl ResponsePacket {
    /// Response carrying a single result.
    pub fn with_result(correlation_id: impl Into<String>, result: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            body: vec![result],
        }
    }

    /// Response for a void operation.
    pub fn empty(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            body: Vec::new(),
        }
    }

    /// The result value, `Value::Unit` for a void response.
    pub fn into_result(self) -> Value {
        self.body.into_iter().next().unwrap_or(Value::Unit)
    }
}

/// Body types expected in a response to an operation returning `returns`.
pub fn response_body_types(returns: ValueType) -> &'static [ValueType] {
    match returns {
        ValueType::Unit => &[],
        ValueType::Bool => &[ValueType::Bool],
        ValueType::I32 => &[ValueType::I32],
        ValueType::I64 => &[ValueType::I64],
        ValueType::F64 => &[ValueType::F64],
        ValueType::String => &[ValueType::String],
        ValueType::Bytes => &[ValueType::Bytes],
        ValueType::Record => &[ValueType::Record],
    }
}

/// Reads and writes packets through a value codec.
#[derive(Clone)]
pub struct PacketCodec {
    codec: Arc<dyn ValueCodec>,
}

impl std::fmt::Debug for PacketCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketCodec")
            .field("codec", &self.codec.name())
            .finish()
    }
}

impl PacketCodec {
    pub fn new(codec: Arc<dyn ValueCodec>) -> Self {
        Self { codec }
    }

    /// Encode header values followed by body values as one list.
    pub fn encode(&self, header: &[Value], body: &[Value]) -> Result<Vec<u8>, CodecError> {
        let mut values = Vec::with_capacity(header.len() + body.len());
        values.extend_from_slice(header);
        values.extend_from_slice(body);
        self.codec.encode(&values)
    }

    /// Decode one packet, returning (header, body, bytes consumed).
    pub fn decode(
        &self,
        bytes: &[u8],
        header_types: &[ValueType],
        body_types: &[ValueType],
    ) -> Result<(Vec<Value>, Vec<Value>, usize), CodecError> {
        let mut types = Vec::with_capacity(header_types.len() + body_types.len());
        types.extend_from_slice(header_types);
        types.extend_from_slice(body_types);

        let decoded = self.codec.decode(bytes, &types)?;
        if decoded.values.len() != types.len() {
            return Err(CodecError::MalformedPacket(format!(
                "codec returned {} values for {} types",
                decoded.values.len(),
                types.len()
            )));
        }

        let mut header = decoded.values;
        let body = header.split_off(header_types.len());
        Ok((header, body, decoded.consumed))
    }

    pub fn encode_request(&self, packet: &RequestPacket) -> Result<Vec<u8>, CodecError> {
        let header = [
            Value::String(packet.client_id.clone()),
            Value::String(packet.correlation_id.clone()),
        ];
        self.encode(&header, &packet.body)
    }

    pub fn decode_request(
        &self,
        bytes: &[u8],
        body_types: &[ValueType],
    ) -> Result<RequestPacket, CodecError> {
        let (header, body, _) = self.decode(bytes, &REQUEST_HEADER, body_types)?;
        let mut header = header.into_iter().map(Value::into_string);
        match (header.next().flatten(), header.next().flatten()) {
            (Some(client_id), Some(correlation_id)) => Ok(RequestPacket {
                client_id,
                correlation_id,
                body,
            }),
            _ => Err(CodecError::MalformedPacket(
                "request header is not (string, string)".to_string(),
            )),
        }
    }

    pub fn encode_response(&self, packet: &ResponsePacket) -> Result<Vec<u8>, CodecError> {
        let header = [Value::String(packet.correlation_id.clone())];
        self.encode(&header, &packet.body)
    }

    pub fn decode_response(
        &self,
        bytes: &[u8],
        body_types: &[ValueType],
    ) -> Result<ResponsePacket, CodecError> {
        let (header, body, _) = self.decode(bytes, &RESPONSE_HEADER, body_types)?;
        match header.into_iter().next().and_then(Value::into_string) {
            Some(correlation_id) => Ok(ResponsePacket {
                correlation_id,
                body,
            }),
            None => Err(CodecError::MalformedPacket(
                "response header is not (string)".to_string(),
            )),
        }
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }
}
