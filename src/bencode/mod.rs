//! Bencode codec
//!
//! Encoder and decoder for the four bencode shapes: integers, byte strings,
//! lists and dictionaries. Dictionaries are kept sorted by raw key bytes, so
//! [`encode`] always produces the canonical form that info hashes are
//! computed over.

pub mod value;
pub mod decode;
pub mod encode;

pub use value::{BencodeDict, BencodeValue};
pub use decode::{decode, decode_prefix};
pub use encode::{encode, encode_into};
