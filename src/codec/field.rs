use std::collections::HashMap;

use super::varint::{VarIntError, read_varint, write_varint};
use crate::error::{Error, Result};

/// The wire primitives every packet is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16Le,
    U16Be,
    I32Be,
    U64Be,
    VarInt,
    /// VarInt byte length followed by UTF-8.
    VarIntString,
    /// Big-endian u16 byte length followed by UTF-8.
    ShortString,
    /// Bytes up to a 0x00 terminator, which isn't part of the value.
    NullString,
    /// NullStrings until an empty one. See [`PLUGINS_KEY`].
    NullStringArray,
    /// Opaque bytes whose length is passed in through [`DecodeOptions`].
    Bytes,
    /// A constant that must appear verbatim. Decodes to `true`.
    Magic(&'static [u8]),
}

/// Full stat responses send `plugins` followed by an empty value, which would
/// otherwise end the array early.
pub const PLUGINS_KEY: &str = "plugins";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Every integer type except [`FieldType::U64Be`].
    Int(i64),
    Long(u64),
    Str(String),
    StrArray(Vec<String>),
    Bytes(Vec<u8>),
    Flag(bool),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Long(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StrArray(v)
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Flag(v)
    }
}

/// Out-of-band parameters for fields that don't carry their own length.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    lengths: HashMap<&'static str, usize>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn length(mut self, field: &'static str, length: usize) -> Self {
        self.lengths.insert(field, length);
        self
    }

    pub fn get_length(&self, field: &str) -> Option<usize> {
        self.lengths.get(field).copied()
    }
}

fn int_in_range(name: &'static str, value: &Value, min: i64, max: i64) -> Result<i64> {
    let Value::Int(v) = value else {
        return Err(Error::malformed(name, "expected an integer"));
    };
    if *v < min || *v > max {
        return Err(Error::malformed(
            name,
            format!("{v} is outside of {min}..={max}"),
        ));
    }
    Ok(*v)
}

fn string<'a>(name: &'static str, value: &'a Value) -> Result<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(Error::malformed(name, "expected a string")),
    }
}

fn write_null_string(out: &mut Vec<u8>, name: &'static str, s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(Error::malformed(name, "string contains a null byte"));
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

/// Encodes one field. `name` is only used for error messages.
pub fn encode_field(name: &'static str, field_type: FieldType, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match field_type {
        FieldType::U8 => {
            out.push(int_in_range(name, value, 0, u8::MAX as i64)? as u8);
        }
        FieldType::U16Le => {
            let v = int_in_range(name, value, 0, u16::MAX as i64)? as u16;
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldType::U16Be => {
            let v = int_in_range(name, value, 0, u16::MAX as i64)? as u16;
            out.extend_from_slice(&v.to_be_bytes());
        }
        FieldType::I32Be => {
            let v = int_in_range(name, value, i32::MIN as i64, i32::MAX as i64)? as i32;
            out.extend_from_slice(&v.to_be_bytes());
        }
        FieldType::U64Be => {
            let Value::Long(v) = value else {
                return Err(Error::malformed(name, "expected a u64"));
            };
            out.extend_from_slice(&v.to_be_bytes());
        }
        FieldType::VarInt => {
            let v = int_in_range(name, value, i32::MIN as i64, i32::MAX as i64)? as i32;
            write_varint(&mut out, v);
        }
        FieldType::VarIntString => {
            let s = string(name, value)?;
            let len = i32::try_from(s.len())
                .map_err(|_| Error::malformed(name, "string is too long for a VarInt length"))?;
            write_varint(&mut out, len);
            out.extend_from_slice(s.as_bytes());
        }
        FieldType::ShortString => {
            let s = string(name, value)?;
            let len = u16::try_from(s.len())
                .map_err(|_| Error::malformed(name, "string is too long for a u16 length"))?;
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        FieldType::NullString => {
            write_null_string(&mut out, name, string(name, value)?)?;
        }
        FieldType::NullStringArray => {
            let Value::StrArray(strings) = value else {
                return Err(Error::malformed(name, "expected a string array"));
            };
            let mut previous: Option<&str> = None;
            for s in strings {
                if s.is_empty() && previous != Some(PLUGINS_KEY) {
                    return Err(Error::malformed(
                        name,
                        "empty entry would terminate the array",
                    ));
                }
                write_null_string(&mut out, name, s)?;
                previous = Some(s);
            }
            out.push(0);
        }
        FieldType::Bytes => {
            let Value::Bytes(bytes) = value else {
                return Err(Error::malformed(name, "expected bytes"));
            };
            out.extend_from_slice(bytes);
        }
        FieldType::Magic(magic) => {
            // the value only matters when decoding
            out.extend_from_slice(magic);
        }
    }
    Ok(out)
}

fn take<'a>(name: &'static str, buf: &'a [u8], offset: usize, len: usize) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| {
            Error::malformed(
                name,
                format!(
                    "needed {len} bytes at offset {offset} but only {} remain",
                    buf.len().saturating_sub(offset)
                ),
            )
        })
}

fn read_varint_at(name: &'static str, buf: &[u8], offset: usize) -> Result<(i32, usize)> {
    read_varint(buf.get(offset..).unwrap_or_default()).map_err(|e| match e {
        VarIntError::Incomplete => Error::malformed(name, "buffer ended inside a VarInt"),
        VarIntError::TooLong => Error::malformed(name, "VarInt is longer than 5 bytes"),
    })
}

fn read_utf8(name: &'static str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::malformed(name, e.to_string()))
}

/// Reads bytes up to a null terminator or the end of the buffer. Returns the
/// string and the bytes consumed, terminator included.
fn read_null_string(buf: &[u8], offset: usize) -> (String, usize) {
    let rest = buf.get(offset..).unwrap_or_default();
    match rest.iter().position(|&b| b == 0) {
        Some(end) => (String::from_utf8_lossy(&rest[..end]).into_owned(), end + 1),
        None => (String::from_utf8_lossy(rest).into_owned(), rest.len()),
    }
}

/// Decodes one field starting at `offset`, returning the value and how many
/// bytes it took up.
pub fn decode_field(
    name: &'static str,
    field_type: FieldType,
    buf: &[u8],
    offset: usize,
    options: &DecodeOptions,
) -> Result<(Value, usize)> {
    let decoded = match field_type {
        FieldType::U8 => {
            let b = take(name, buf, offset, 1)?;
            (Value::Int(b[0] as i64), 1)
        }
        FieldType::U16Le => {
            let b = take(name, buf, offset, 2)?;
            (Value::Int(u16::from_le_bytes([b[0], b[1]]) as i64), 2)
        }
        FieldType::U16Be => {
            let b = take(name, buf, offset, 2)?;
            (Value::Int(u16::from_be_bytes([b[0], b[1]]) as i64), 2)
        }
        FieldType::I32Be => {
            let b = take(name, buf, offset, 4)?;
            (Value::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64), 4)
        }
        FieldType::U64Be => {
            let b = take(name, buf, offset, 8)?;
            let mut bytes = [0; 8];
            bytes.copy_from_slice(b);
            (Value::Long(u64::from_be_bytes(bytes)), 8)
        }
        FieldType::VarInt => {
            let (v, len) = read_varint_at(name, buf, offset)?;
            (Value::Int(v as i64), len)
        }
        FieldType::VarIntString => {
            let (len, prefix_len) = read_varint_at(name, buf, offset)?;
            let len = usize::try_from(len)
                .map_err(|_| Error::malformed(name, format!("negative string length {len}")))?;
            let bytes = take(name, buf, offset + prefix_len, len)?;
            (Value::Str(read_utf8(name, bytes)?), prefix_len + len)
        }
        FieldType::ShortString => {
            let b = take(name, buf, offset, 2)?;
            let len = u16::from_be_bytes([b[0], b[1]]) as usize;
            let bytes = take(name, buf, offset + 2, len)?;
            (Value::Str(read_utf8(name, bytes)?), 2 + len)
        }
        FieldType::NullString => {
            if offset >= buf.len() {
                return Err(Error::malformed(name, "no bytes left for a string"));
            }
            let (s, len) = read_null_string(buf, offset);
            (Value::Str(s), len)
        }
        FieldType::NullStringArray => {
            // even an empty array has its terminator
            if offset >= buf.len() {
                return Err(Error::malformed(name, "no bytes left for a string array"));
            }
            let mut strings: Vec<String> = Vec::new();
            let mut pos = offset;
            while pos < buf.len() {
                let after_plugins = strings.last().map(String::as_str) == Some(PLUGINS_KEY);
                if buf[pos] == 0 && !after_plugins {
                    // the terminator
                    pos += 1;
                    break;
                }
                let (s, len) = read_null_string(buf, pos);
                strings.push(s);
                pos += len;
            }
            (Value::StrArray(strings), pos - offset)
        }
        FieldType::Bytes => {
            let len = options
                .get_length(name)
                .ok_or_else(|| Error::malformed(name, "no length was given for a bytes field"))?;
            let bytes = take(name, buf, offset, len)?;
            (Value::Bytes(bytes.to_vec()), len)
        }
        FieldType::Magic(magic) => {
            let bytes = take(name, buf, offset, magic.len())?;
            if bytes != magic {
                return Err(Error::MagicMismatch(name));
            }
            (Value::Flag(true), magic.len())
        }
    };
    Ok(decoded)
}
