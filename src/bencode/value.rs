//! Bencode value model

use std::collections::BTreeMap;
use std::fmt;

/// Dictionary with byte-string keys, ordered by raw key bytes
pub type BencodeDict = BTreeMap<Vec<u8>, BencodeValue>;

/// A decoded bencode value
#[derive(Clone, PartialEq, Eq)]
pub enum BencodeValue {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<BencodeValue>),
    Dict(BencodeDict),
}

impl BencodeValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            BencodeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Byte string interpreted as UTF-8, if it is valid
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BencodeDict> {
        match self {
            BencodeValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Look up a key when this value is a dictionary
    pub fn get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.as_dict().and_then(|d| d.get(key))
    }

    /// Short name of the shape, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            BencodeValue::Int(_) => "integer",
            BencodeValue::Bytes(_) => "byte string",
            BencodeValue::List(_) => "list",
            BencodeValue::Dict(_) => "dictionary",
        }
    }

    /// Build a dictionary from `(key, value)` pairs in any order
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, BencodeValue)>,
    {
        BencodeValue::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Debug for BencodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BencodeValue::Int(n) => write!(f, "Int({})", n),
            BencodeValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) if s.len() <= 64 => write!(f, "Bytes({:?})", s),
                _ => write!(f, "Bytes([{} bytes])", b.len()),
            },
            BencodeValue::List(l) => f.debug_tuple("List").field(l).finish(),
            BencodeValue::Dict(d) => {
                let mut map = f.debug_map();
                for (k, v) in d {
                    map.entry(&String::from_utf8_lossy(k), v);
                }
                map.finish()
            }
        }
    }
}

impl From<i64> for BencodeValue {
    fn from(value: i64) -> Self {
        BencodeValue::Int(value)
    }
}

impl From<&str> for BencodeValue {
    fn from(value: &str) -> Self {
        BencodeValue::Bytes(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for BencodeValue {
    fn from(value: &[u8]) -> Self {
        BencodeValue::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for BencodeValue {
    fn from(value: Vec<u8>) -> Self {
        BencodeValue::Bytes(value)
    }
}

impl From<Vec<BencodeValue>> for BencodeValue {
    fn from(value: Vec<BencodeValue>) -> Self {
        BencodeValue::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let value = BencodeValue::dict([
            ("name", BencodeValue::from("ubuntu.iso")),
            ("length", BencodeValue::from(1000)),
        ]);

        assert_eq!(value.get(b"name").and_then(|v| v.as_str()), Some("ubuntu.iso"));
        assert_eq!(value.get(b"length").and_then(|v| v.as_int()), Some(1000));
        assert!(value.get(b"missing").is_none());
        assert!(value.as_list().is_none());
        assert_eq!(value.kind(), "dictionary");
    }

    #[test]
    fn test_dict_orders_keys() {
        let value = BencodeValue::dict([
            ("zebra", BencodeValue::from(1)),
            ("apple", BencodeValue::from(2)),
        ]);
        let keys: Vec<_> = value.as_dict().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec![b"apple".to_vec(), b"zebra".to_vec()]);
    }

    #[test]
    fn test_debug_hides_binary() {
        let value = BencodeValue::Bytes(vec![0xff; 40]);
        assert_eq!(format!("{:?}", value), "Bytes([40 bytes])");
    }
}
