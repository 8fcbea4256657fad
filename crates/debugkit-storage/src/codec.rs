//! Versioned tagged binary encoding of JSON values.
//!
//! Layout: `b"DK"`, a version byte, then one tagged value. Lengths and counts
//! are big-endian `u32`; numbers are 8 big-endian bytes.

use serde_json::{Map, Number, Value};

use crate::{Error, Result};

const MAGIC: &[u8; 2] = b"DK";
const VERSION: u8 = 1;
const MAX_DEPTH: usize = 128;

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_I64: u8 = 3;
const TAG_U64: u8 = 4;
const TAG_F64: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_ARRAY: u8 = 7;
const TAG_OBJECT: u8 = 8;

pub fn encode_binary(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    write_value(&mut out, value)?;
    Ok(out)
}

pub fn decode_binary(bytes: &[u8]) -> Result<Value> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(2)? != MAGIC {
        return Err(Error::Codec("missing DK header".to_string()));
    }
    let version = reader.u8()?;
    if version != VERSION {
        return Err(Error::Codec(format!("unsupported version {}", version)));
    }

    let value = reader.value(0)?;
    if reader.pos != bytes.len() {
        return Err(Error::Codec(format!(
            "{} trailing byte(s)",
            bytes.len() - reader.pos
        )));
    }
    Ok(value)
}

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| Error::Codec(format!("length {} too large", len)))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    write_len(out, s.len())?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push(TAG_I64);
                out.extend_from_slice(&i.to_be_bytes());
            } else if let Some(u) = n.as_u64() {
                out.push(TAG_U64);
                out.extend_from_slice(&u.to_be_bytes());
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                out.push(TAG_F64);
                out.extend_from_slice(&f.to_bits().to_be_bytes());
            }
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            write_str(out, s)?;
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY);
            write_len(out, items.len())?;
            for item in items {
                write_value(out, item)?;
            }
        }
        Value::Object(map) => {
            out.push(TAG_OBJECT);
            write_len(out, map.len())?;
            for (key, item) in map {
                write_str(out, key)?;
                write_value(out, item)?;
            }
        }
    }
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::Codec(format!("truncated input at byte {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn array8(&mut self) -> Result<[u8; 8]> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(buf)
    }

    fn len(&mut self) -> Result<usize> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf) as usize)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.len()?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| Error::Codec(format!("invalid UTF-8: {}", e)))
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(Error::Codec("nesting too deep".to_string()));
        }

        let tag = self.u8()?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_I64 => Value::from(i64::from_be_bytes(self.array8()?)),
            TAG_U64 => Value::from(u64::from_be_bytes(self.array8()?)),
            TAG_F64 => {
                let f = f64::from_bits(u64::from_be_bytes(self.array8()?));
                Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
            }
            TAG_STRING => Value::String(self.string()?),
            TAG_ARRAY => {
                let count = self.len()?;
                // Counts come from untrusted input; cap the preallocation.
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                Value::Array(items)
            }
            TAG_OBJECT => {
                let count = self.len()?;
                let mut map = Map::new();
                for _ in 0..count {
                    let key = self.string()?;
                    let item = self.value(depth + 1)?;
                    map.insert(key, item);
                }
                Value::Object(map)
            }
            other => return Err(Error::Codec(format!("unknown tag {}", other))),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_value_survives() {
        let value = json!({
            "usages": [1024, 2048],
            "elapsed": 0.125,
            "negative": -3,
            "big": u64::MAX,
            "name": "héllo",
            "flags": [true, false, null],
        });

        let bytes = encode_binary(&value).unwrap();
        assert_eq!(&bytes[..3], b"DK\x01");
        assert_eq!(decode_binary(&bytes).unwrap(), value);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(decode_binary(b"XX\x01\x00").is_err());
        assert!(decode_binary(b"DK\x02\x00").is_err());
        assert!(decode_binary(b"DK\x01\x09").is_err());
        assert!(decode_binary(b"DK\x01\x06\x00\x00\x00\x05ab").is_err());
        assert!(decode_binary(b"DK\x01\x00\x00").is_err());
    }
}
