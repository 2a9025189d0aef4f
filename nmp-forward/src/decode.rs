// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forward-protocol frame decoder.
//!
//! A frame is a msgpack array `[tag, payload, option]`. The payload
//! discriminates the mode:
//!
//! * unsigned integer: one record, payload is the timestamp, `option`
//!   carries the data mapping;
//! * float: same, timestamp is the floor of the float;
//! * array of entries: each entry is `[timestamp, data]`;
//! * binary blob: a concatenation of entry frames, decoded until the blob
//!   is exhausted.
//!
//! Byte-string values inside data mappings are coerced to text, recursing
//! into nested mappings.

use nmp_core::{Entry, FieldMap, RecordSet};
use rmpv::Value;
use std::io::Cursor;

/// Error raised while decoding a single frame. The connection that produced
/// the frame is no longer framed-synchronized and must be closed.
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    /// The outer value is not a `[tag, payload, option]` array.
    InvalidFrame(String),
    /// The timestamp element is not an unsigned integer or float.
    InvalidTimestamp(String),
    /// A data mapping or entry has the wrong shape.
    InvalidData(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidFrame(msg) => write!(f, "invalid frame: {msg}"),
            DecodeError::InvalidTimestamp(msg) => write!(f, "invalid timestamp: {msg}"),
            DecodeError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one frame into a record set.
pub fn decode_frame(frame: Value) -> Result<RecordSet, DecodeError> {
    let Value::Array(mut parts) = frame else {
        return Err(DecodeError::InvalidFrame("frame is not an array".to_owned()));
    };
    if parts.len() < 2 || parts.len() > 3 {
        return Err(DecodeError::InvalidFrame(format!(
            "expected [tag, payload, option], got {} elements",
            parts.len()
        )));
    }
    let option = if parts.len() == 3 {
        parts.pop().unwrap_or(Value::Nil)
    } else {
        Value::Nil
    };
    let payload = parts.pop().unwrap_or(Value::Nil);
    let tag = text(
        parts.pop().unwrap_or(Value::Nil),
        DecodeError::InvalidFrame("tag is not a string".to_owned()),
    )?;

    let entries = match payload {
        Value::Integer(n) => {
            let timestamp = n.as_u64().ok_or_else(|| {
                DecodeError::InvalidTimestamp(format!("negative timestamp {n}"))
            })?;
            vec![Entry {
                timestamp,
                data: field_map(option)?,
            }]
        }
        Value::F32(f) => vec![Entry {
            timestamp: f.floor() as u64,
            data: field_map(option)?,
        }],
        Value::F64(f) => vec![Entry {
            timestamp: f.floor() as u64,
            data: field_map(option)?,
        }],
        Value::Array(raw_entries) => raw_entries
            .into_iter()
            .map(decode_entry)
            .collect::<Result<Vec<_>, _>>()?,
        Value::Binary(blob) => decode_packed(&blob)?,
        // The agent may emit the packed blob with the str wire type; the
        // bytes are the same concatenation of entry frames.
        Value::String(s) => decode_packed(s.as_bytes())?,
        other => {
            return Err(DecodeError::InvalidFrame(format!(
                "unsupported payload type: {other}"
            )))
        }
    };

    Ok(RecordSet { tag, entries })
}

/// Decode the concatenated entries of a packed-forward blob, incrementally
/// until the blob is exhausted.
fn decode_packed(blob: &[u8]) -> Result<Vec<Entry>, DecodeError> {
    let mut cursor = Cursor::new(blob);
    let mut entries = Vec::new();
    while (cursor.position() as usize) < blob.len() {
        let value = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| DecodeError::InvalidData(format!("packed entry: {e}")))?;
        entries.push(decode_entry(value)?);
    }
    Ok(entries)
}

fn decode_entry(value: Value) -> Result<Entry, DecodeError> {
    let Value::Array(mut parts) = value else {
        return Err(DecodeError::InvalidData("entry is not an array".to_owned()));
    };
    if parts.len() < 2 {
        return Err(DecodeError::InvalidData(format!(
            "entry has {} elements, expected [timestamp, data]",
            parts.len()
        )));
    }
    let data = field_map(parts.swap_remove(1))?;
    let timestamp = match parts.swap_remove(0) {
        Value::Integer(n) => n
            .as_u64()
            .ok_or_else(|| DecodeError::InvalidTimestamp(format!("negative timestamp {n}")))?,
        Value::F32(f) => f.floor() as u64,
        Value::F64(f) => f.floor() as u64,
        other => {
            return Err(DecodeError::InvalidTimestamp(format!(
                "timestamp has unsupported type: {other}"
            )))
        }
    };
    Ok(Entry { timestamp, data })
}

/// Turn a decoded map into a `FieldMap`, coercing values on the way in.
fn field_map(value: Value) -> Result<FieldMap, DecodeError> {
    let Value::Map(pairs) = value else {
        return Err(DecodeError::InvalidData(
            "record data is not a map".to_owned(),
        ));
    };
    let mut map = FieldMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        let key = text(
            key,
            DecodeError::InvalidData("map key is not a string".to_owned()),
        )?;
        map.insert(key, coerce(value));
    }
    Ok(map)
}

/// Byte-strings become text strings; nested mappings are coerced
/// recursively. Other values pass through unchanged.
fn coerce(value: Value) -> Value {
    match value {
        Value::Binary(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned().into()),
        Value::Map(pairs) => Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (coerce(k), coerce(v)))
                .collect(),
        ),
        other => other,
    }
}

fn text(value: Value, err: DecodeError) -> Result<String, DecodeError> {
    match value {
        Value::String(s) => Ok(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        Value::Binary(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        _ => Err(err),
    }
}
