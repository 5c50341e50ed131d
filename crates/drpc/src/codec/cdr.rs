// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Little-endian binary codec in the spirit of CDR.
//!
//! Layout: `u32` value count, then each value without a type tag:
//!
//! | Type     | Encoding                               |
//! |----------|----------------------------------------|
//! | unit     | nothing                                |
//! | bool     | 1 byte (0 or 1)                        |
//! | i32/i64  | 4/8 bytes LE                           |
//! | f64      | 8 bytes LE (IEEE-754 bits)             |
//! | string   | `u32` length + UTF-8 bytes             |
//! | bytes    | `u32` length + raw bytes               |
//! | record   | `u32` length + JSON document           |
//!
//! The format is not self-describing; a wrong type list is only detected
//! where the bytes are invalid for the requested type (bad bool, bad UTF-8,
//! bad JSON) or where the input runs short.

use super::{CodecError, Decoded, Value, ValueCodec, ValueType};

/// Encodes value lists as little-endian binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdrCodec;

impl CdrCodec {
    pub const fn new() -> Self {
        Self
    }
}

impl ValueCodec for CdrCodec {
    fn encode(&self, values: &[Value]) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(4 + values.len() * 8);
        write_len(&mut buf, values.len())?;
        for value in values {
            match value {
                Value::Unit => {}
                Value::Bool(b) => buf.push(u8::from(*b)),
                Value::I32(n) => buf.extend_from_slice(&n.to_le_bytes()),
                Value::I64(n) => buf.extend_from_slice(&n.to_le_bytes()),
                Value::F64(n) => buf.extend_from_slice(&n.to_bits().to_le_bytes()),
                Value::String(s) => write_blob(&mut buf, s.as_bytes())?,
                Value::Bytes(bytes) => write_blob(&mut buf, bytes)?,
                Value::Record(record) => {
                    let json =
                        serde_json::to_vec(record).map_err(|e| CodecError::Encode(e.to_string()))?;
                    write_blob(&mut buf, &json)?;
                }
            }
        }
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8], types: &[ValueType]) -> Result<Decoded, CodecError> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.read_u32_le()? as usize;
        if count != types.len() {
            return Err(CodecError::MalformedPacket(format!(
                "expected {} values, found {}",
                types.len(),
                count
            )));
        }

        let mut values = Vec::with_capacity(count);
        for (position, ty) in types.iter().enumerate() {
            values.push(cursor.read_value(position, *ty)?);
        }

        Ok(Decoded {
            values,
            consumed: cursor.offset(),
        })
    }

    fn name(&self) -> &'static str {
        "cdr"
    }
}

fn write_len(buf: &mut Vec<u8>, len: usize) -> Result<(), CodecError> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::Encode(format!("length {} exceeds u32", len)))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_blob(buf: &mut Vec<u8>, data: &[u8]) -> Result<(), CodecError> {
    write_len(buf, data.len())?;
    buf.extend_from_slice(data);
    Ok(())
}

/// Generate bounds-checked little-endian read methods.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        fn $name(&mut self) -> Result<$type, CodecError> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.take($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Bounds-checked read cursor.
struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| {
                CodecError::MalformedPacket(format!(
                    "unexpected end of buffer at offset {} (need {} bytes)",
                    self.offset, len
                ))
            })?;
        let buffer: &'a [u8] = self.buffer;
        let slice = &buffer[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    impl_read_le!(read_u32_le, u32, 4);
    impl_read_le!(read_i32_le, i32, 4);
    impl_read_le!(read_i64_le, i64, 8);
    impl_read_le!(read_u64_le, u64, 8);

    fn read_blob(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_u32_le()? as usize;
        self.take(len)
    }

    fn read_value(&mut self, position: usize, expected: ValueType) -> Result<Value, CodecError> {
        let mismatch = |found: String| CodecError::TypeMismatch {
            position,
            expected,
            found,
        };

        Ok(match expected {
            ValueType::Unit => Value::Unit,
            ValueType::Bool => match self.take(1)?[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(mismatch(format!("byte {:#04x}", other))),
            },
            ValueType::I32 => Value::I32(self.read_i32_le()?),
            ValueType::I64 => Value::I64(self.read_i64_le()?),
            ValueType::F64 => Value::F64(f64::from_bits(self.read_u64_le()?)),
            ValueType::String => {
                let raw = self.read_blob()?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| mismatch(format!("invalid UTF-8 ({})", e)))?;
                Value::String(s.to_string())
            }
            ValueType::Bytes => Value::Bytes(self.read_blob()?.to_vec()),
            ValueType::Record => {
                let raw = self.read_blob()?;
                let record = serde_json::from_slice(raw)
                    .map_err(|e| mismatch(format!("invalid record ({})", e)))?;
                Value::Record(record)
            }
        })
    }
}
