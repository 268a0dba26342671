//! Bencode decoder
//!
//! Strict, total decoder: every malformed, truncated or non-canonical input
//! yields [`SeederError::MalformedEncoding`] instead of a partial value.

use tracing::trace;

use crate::bencode::value::{BencodeDict, BencodeValue};
use crate::error::{Result, SeederError};

/// Nesting limit for lists and dictionaries
const MAX_DEPTH: usize = 128;

/// Decode a complete bencode value, rejecting trailing bytes
pub fn decode(data: &[u8]) -> Result<BencodeValue> {
    let (value, consumed) = decode_prefix(data)?;
    if consumed != data.len() {
        return Err(SeederError::malformed_encoding_at(
            format!("{} trailing bytes after value", data.len() - consumed),
            consumed,
        ));
    }
    Ok(value)
}

/// Decode one value from the front of `data`, returning it with the number
/// of bytes it occupied
pub fn decode_prefix(data: &[u8]) -> Result<(BencodeValue, usize)> {
    trace!("Decoding bencode from {} bytes", data.len());
    let mut decoder = Decoder { data, pos: 0 };
    let value = decoder.value(0)?;
    Ok((value, decoder.pos))
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| SeederError::malformed_encoding_at("Unexpected end of data", self.pos))
    }

    fn value(&mut self, depth: usize) -> Result<BencodeValue> {
        if depth > MAX_DEPTH {
            return Err(SeederError::malformed_encoding_at("Nesting too deep", self.pos));
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.bytes().map(BencodeValue::Bytes),
            other => Err(SeederError::malformed_encoding_at(
                format!("Unknown bencode type marker {:?}", other as char),
                self.pos,
            )),
        }
    }

    /// Read up to `terminator`, returning the digits in between
    fn digits_until(&mut self, terminator: u8, what: &str) -> Result<&'a str> {
        let data: &'a [u8] = self.data;
        let start = self.pos;
        let end = data[start..]
            .iter()
            .position(|&b| b == terminator)
            .map(|p| start + p)
            .ok_or_else(|| SeederError::malformed_encoding_at(format!("Unterminated {}", what), start))?;

        let text = std::str::from_utf8(&data[start..end])
            .map_err(|_| SeederError::malformed_encoding_at(format!("Non-numeric {}", what), start))?;
        self.pos = end + 1;
        Ok(text)
    }

    fn integer(&mut self) -> Result<BencodeValue> {
        let start = self.pos;
        self.pos += 1; // 'i'
        let text = self.digits_until(b'e', "integer")?;

        let unsigned = text.strip_prefix('-').unwrap_or(text);
        if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SeederError::malformed_encoding_at(format!("Non-numeric integer {:?}", text), start));
        }
        if (unsigned.len() > 1 && unsigned.starts_with('0')) || text == "-0" {
            return Err(SeederError::malformed_encoding_at(format!("Non-canonical integer {:?}", text), start));
        }

        text.parse::<i64>()
            .map(BencodeValue::Int)
            .map_err(|e| SeederError::malformed_encoding_at(format!("Integer out of range: {}", e), start))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        let text = self.digits_until(b':', "string length")?;

        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SeederError::malformed_encoding_at(format!("Non-numeric string length {:?}", text), start));
        }
        if text.len() > 1 && text.starts_with('0') {
            return Err(SeederError::malformed_encoding_at(format!("Non-canonical string length {:?}", text), start));
        }
        let length: usize = text
            .parse()
            .map_err(|_| SeederError::malformed_encoding_at("String length out of range", start))?;

        let remaining = self.data.len() - self.pos;
        if length > remaining {
            return Err(SeederError::malformed_encoding_at(
                format!("String length {} exceeds remaining {} bytes", length, remaining),
                start,
            ));
        }

        let bytes = self.data[self.pos..self.pos + length].to_vec();
        self.pos += length;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<BencodeValue> {
        self.pos += 1; // 'l'
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.pos += 1;
        Ok(BencodeValue::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<BencodeValue> {
        self.pos += 1; // 'd'
        let mut dict = BencodeDict::new();
        while self.peek()? != b'e' {
            let key_pos = self.pos;
            if !self.peek()?.is_ascii_digit() {
                return Err(SeederError::malformed_encoding_at("Dictionary key must be a byte string", key_pos));
            }
            let key = self.bytes()?;
            let value = self.value(depth + 1)?;
            if dict.insert(key, value).is_some() {
                return Err(SeederError::malformed_encoding_at("Duplicate dictionary key", key_pos));
            }
        }
        self.pos += 1;
        Ok(BencodeValue::Dict(dict))
    }
}
