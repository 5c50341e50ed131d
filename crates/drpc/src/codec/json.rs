// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON array codec.
//!
//! A value list is written as one JSON array: `["client", "corr-1", 3, 4]`.
//! Decoding reads a single array off the front of the input and leaves any
//! trailing bytes untouched.

use super::{CodecError, Decoded, Value, ValueCodec, ValueType};
use serde_json::Value as Json;

/// Encodes value lists as JSON arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub const fn new() -> Self {
        Self
    }
}

impl ValueCodec for JsonCodec {
    fn encode(&self, values: &[Value]) -> Result<Vec<u8>, CodecError> {
        let array = values
            .iter()
            .map(to_json)
            .collect::<Result<Vec<_>, _>>()?;
        serde_json::to_vec(&array).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8], types: &[ValueType]) -> Result<Decoded, CodecError> {
        let mut stream = serde_json::Deserializer::from_slice(bytes).into_iter::<Json>();
        let array = match stream.next() {
            Some(Ok(Json::Array(items))) => items,
            Some(Ok(other)) => {
                return Err(CodecError::MalformedPacket(format!(
                    "expected JSON array, found {}",
                    kind_of(&other)
                )))
            }
            Some(Err(e)) => return Err(CodecError::MalformedPacket(e.to_string())),
            None => return Err(CodecError::MalformedPacket("empty input".to_string())),
        };
        let consumed = stream.byte_offset();

        if array.len() != types.len() {
            return Err(CodecError::MalformedPacket(format!(
                "expected {} values, found {}",
                types.len(),
                array.len()
            )));
        }

        let values = array
            .into_iter()
            .zip(types)
            .enumerate()
            .map(|(position, (item, ty))| from_json(position, *ty, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Decoded { values, consumed })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

fn to_json(value: &Value) -> Result<Json, CodecError> {
    Ok(match value {
        Value::Unit => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::I32(n) => Json::from(*n),
        Value::I64(n) => Json::from(*n),
        Value::F64(n) => serde_json::Number::from_f64(*n)
            .map(Json::Number)
            .ok_or_else(|| CodecError::Encode(format!("non-finite float {}", n)))?,
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Record(record) => record.clone(),
    })
}

fn from_json(position: usize, expected: ValueType, item: Json) -> Result<Value, CodecError> {
    let mismatch = |item: &Json| CodecError::TypeMismatch {
        position,
        expected,
        found: kind_of(item).to_string(),
    };

    match expected {
        ValueType::Unit => match item {
            Json::Null => Ok(Value::Unit),
            other => Err(mismatch(&other)),
        },
        ValueType::Bool => item.as_bool().map(Value::Bool).ok_or_else(|| mismatch(&item)),
        ValueType::I32 => item
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::I32)
            .ok_or_else(|| mismatch(&item)),
        ValueType::I64 => item.as_i64().map(Value::I64).ok_or_else(|| mismatch(&item)),
        ValueType::F64 => item.as_f64().map(Value::F64).ok_or_else(|| mismatch(&item)),
        ValueType::String => match item {
            Json::String(s) => Ok(Value::String(s)),
            other => Err(mismatch(&other)),
        },
        ValueType::Bytes => {
            let bytes = item.as_array().and_then(|items| {
                items
                    .iter()
                    .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
            });
            bytes.map(Value::Bytes).ok_or_else(|| mismatch(&item))
        }
        ValueType::Record => match item {
            Json::Object(_) | Json::Array(_) => Ok(Value::Record(item)),
            other => Err(mismatch(&other)),
        },
    }
}

fn kind_of(item: &Json) -> &'static str {
    match item {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_f64() => "float",
        Json::Number(_) => "integer",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
