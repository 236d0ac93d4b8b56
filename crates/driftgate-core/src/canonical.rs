//! Canonical JSON serialization for digest preimages.
//!
//! Fingerprint digests must be deterministic regardless of how a diff was
//! assembled, so everything that is hashed goes through this canonical form:
//!
//! - Object keys sorted lexicographically (UTF-8 byte order)
//! - No whitespace
//! - UTF-8 output
//!
//! Digests produced here are only ever compared against digests this system
//! stored, so the canonical form does not need to match any external
//! serializer.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Serializes `value` into canonical JSON bytes.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the value cannot be converted to JSON
/// (e.g. a map with non-string keys) or contains a non-finite number.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let v = serde_json::to_value(value).map_err(|e| Error::Serialization {
        message: format!("failed to convert value to JSON: {e}"),
    })?;
    let mut out = Vec::<u8>::new();
    write_value(&v, &mut out)?;
    Ok(out)
}

fn write_value(v: &Value, out: &mut Vec<u8>) -> Result<()> {
    match v {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => write_string(s, out)?,
        Value::Array(arr) => {
            out.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(map, out)?,
    }
    Ok(())
}

fn write_object(map: &Map<String, Value>, out: &mut Vec<u8>) -> Result<()> {
    out.push(b'{');

    // Sort keys deterministically by UTF-8 byte order.
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    for (i, k) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_string(k, out)?;
        out.push(b':');
        if let Some(val) = map.get(*k) {
            write_value(val, out)?;
        }
    }

    out.push(b'}');
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) -> Result<()> {
    // serde_json writes the quoted, escaped form with no whitespace.
    serde_json::to_writer(&mut *out, s).map_err(|e| Error::Serialization {
        message: format!("failed to write JSON string: {e}"),
    })
}

fn write_number(n: &Number, out: &mut Vec<u8>) -> Result<()> {
    use std::io::Write;

    if let Some(i) = n.as_i64() {
        write!(out, "{i}").map_err(io_err)?;
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        write!(out, "{u}").map_err(io_err)?;
        return Ok(());
    }
    // Floats appear in observed state we do not control. serde_json's Number
    // rejects NaN/Infinity at construction, and its Display is the shortest
    // round-trippable form, which is stable within one binary.
    write!(out, "{n}").map_err(io_err)
}

fn io_err(e: std::io::Error) -> Error {
    Error::Serialization {
        message: format!("failed to write canonical JSON: {e}"),
    }
}
