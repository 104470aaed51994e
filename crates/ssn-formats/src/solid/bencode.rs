//! Minimal Bencode decoder
//!
//! Supports the four Bencode types. Integers are unsigned, matching what
//! the metafiles actually contain. Errors carry the byte offset at which
//! decoding failed.

use crate::solid::error::{SolidError, SolidResult};
use std::collections::BTreeMap;

/// Nesting limit for lists and dictionaries
const MAX_DEPTH: usize = 32;

/// Decoded Bencode value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `i<digits>e`
    Integer(u64),
    /// `<len>:<bytes>`
    Bytes(Vec<u8>),
    /// `l<values>e`
    List(Vec<Value>),
    /// `d<key><value>...e`
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Integer value
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Raw byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Byte string as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// List items
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary
    pub fn as_dict(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Dictionary lookup
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_dict().and_then(|map| map.get(key))
    }

    /// Encode into canonical Bencode (dictionary keys sorted)
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Integer(n) => {
                out.push(b'i');
                out.extend_from_slice(n.to_string().as_bytes());
                out.push(b'e');
            }
            Self::Bytes(bytes) => encode_bytes(bytes, out),
            Self::List(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Self::Dict(map) => {
                out.push(b'd');
                for (key, value) in map {
                    encode_bytes(key.as_bytes(), out);
                    value.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Integer(n)
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

/// Decode a complete Bencode document
///
/// Trailing bytes after the top-level value are rejected.
pub fn decode(data: &[u8]) -> SolidResult<Value> {
    let mut decoder = Decoder { data, pos: 0 };
    let value = decoder.value(0)?;
    if decoder.pos != data.len() {
        return Err(decoder.error("trailing data after top-level value"));
    }
    Ok(value)
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Decoder<'_> {
    fn error(&self, reason: &'static str) -> SolidError {
        SolidError::Bencode {
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> SolidResult<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unexpected end of input"))
    }

    fn next(&mut self) -> SolidResult<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn value(&mut self, depth: usize) -> SolidResult<Value> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }

        match self.peek()? {
            b'd' => {
                self.pos += 1;
                let mut map = BTreeMap::new();
                while self.peek()? != b'e' {
                    let key_offset = self.pos;
                    let key = match self.value(depth + 1)? {
                        Value::Bytes(bytes) => String::from_utf8(bytes).map_err(|_| {
                            SolidError::Bencode {
                                offset: key_offset,
                                reason: "dictionary key is not UTF-8",
                            }
                        })?,
                        _ => {
                            return Err(SolidError::Bencode {
                                offset: key_offset,
                                reason: "dictionary key is not a string",
                            });
                        }
                    };
                    let value = self.value(depth + 1)?;
                    map.insert(key, value);
                }
                self.pos += 1;
                Ok(Value::Dict(map))
            }
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'i' => {
                self.pos += 1;
                let n = self.number(b'e', "unexpected character in integer")?;
                Ok(Value::Integer(n))
            }
            b'0'..=b'9' => {
                let len = self.number(b':', "unexpected character in string length")?;
                let start = self.pos;
                let end = usize::try_from(len)
                    .ok()
                    .and_then(|len| start.checked_add(len))
                    .filter(|&end| end <= self.data.len())
                    .ok_or_else(|| self.error("string runs past end of input"))?;
                self.pos = end;
                Ok(Value::Bytes(self.data[start..end].to_vec()))
            }
            _ => Err(self.error("unexpected leading character")),
        }
    }

    /// Read decimal digits up to `terminator`, consuming it
    fn number(&mut self, terminator: u8, reason: &'static str) -> SolidResult<u64> {
        let start = self.pos;
        let mut n: u64 = 0;
        loop {
            let byte = self.peek()?;
            if byte == terminator {
                break;
            }
            if !byte.is_ascii_digit() {
                return Err(self.error(reason));
            }
            n = n
                .checked_mul(10)
                .and_then(|n| n.checked_add(u64::from(byte - b'0')))
                .ok_or_else(|| self.error("number overflows"))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("empty number"));
        }
        self.next()?;
        Ok(n)
    }
}
