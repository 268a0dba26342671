//! Bencode encoder
//!
//! Output is canonical: dictionary entries are written in ascending raw key
//! order, which [`BencodeDict`](crate::bencode::BencodeDict) guarantees by
//! construction. Two encoders that agree on this produce identical bytes,
//! and therefore identical info hashes.

use crate::bencode::value::BencodeValue;

/// Encode a value into a fresh buffer
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

/// Append the encoding of `value` to `out`
pub fn encode_into(value: &BencodeValue, out: &mut Vec<u8>) {
    match value {
        BencodeValue::Int(n) => {
            out.push(b'i');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b'e');
        }
        BencodeValue::Bytes(bytes) => write_bytes(bytes, out),
        BencodeValue::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        BencodeValue::Dict(dict) => {
            out.push(b'd');
            for (key, item) in dict {
                write_bytes(key, out);
                encode_into(item, out);
            }
            out.push(b'e');
        }
    }
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}
