//! Sample .torrent payloads for tests

use crate::bencode::{self, BencodeDict, BencodeValue};

fn base_info(length: i64) -> BencodeDict {
    let mut info = BencodeDict::new();
    info.insert(b"name".to_vec(), BencodeValue::from("sample.bin"));
    info.insert(b"piece length".to_vec(), BencodeValue::Int(16384));
    info.insert(b"pieces".to_vec(), BencodeValue::Bytes(vec![0xab; 20]));
    info.insert(b"length".to_vec(), BencodeValue::Int(length));
    info
}

fn encode_root(announce: &str, info: BencodeDict) -> Vec<u8> {
    let mut root = BencodeDict::new();
    root.insert(b"announce".to_vec(), BencodeValue::from(announce));
    root.insert(b"info".to_vec(), BencodeValue::Dict(info));
    bencode::encode(&BencodeValue::Dict(root))
}

/// Single-file torrent named `sample.bin` with one piece
pub(crate) fn single_file_torrent(announce: &str, length: i64) -> Vec<u8> {
    encode_root(announce, base_info(length))
}

/// Multi-file torrent whose i-th file is `dir/file{i}.bin`
pub(crate) fn multi_file_torrent(announce: &str, lengths: &[i64]) -> Vec<u8> {
    let mut info = base_info(0);
    info.remove(b"length".as_slice());
    let files = lengths
        .iter()
        .enumerate()
        .map(|(i, len)| {
            BencodeValue::dict([
                ("length", BencodeValue::Int(*len)),
                (
                    "path",
                    BencodeValue::List(vec![
                        BencodeValue::from("dir"),
                        BencodeValue::from(format!("file{}.bin", i).as_str()),
                    ]),
                ),
            ])
        })
        .collect();
    info.insert(b"files".to_vec(), BencodeValue::List(files));
    encode_root(announce, info)
}

/// Single-file torrent (1000 bytes, `http://tracker.example/announce`)
/// after `edit` has modified the root and info dictionaries
pub(crate) fn torrent_with(edit: impl FnOnce(&mut BencodeDict, &mut BencodeDict)) -> Vec<u8> {
    let mut root = BencodeDict::new();
    root.insert(b"announce".to_vec(), BencodeValue::from("http://tracker.example/announce"));
    let mut info = base_info(1000);
    edit(&mut root, &mut info);
    root.insert(b"info".to_vec(), BencodeValue::Dict(info));
    bencode::encode(&BencodeValue::Dict(root))
}
