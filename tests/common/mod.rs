//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::io::{Cursor, Read};
use zip::ZipArchive;

pub fn open(bytes: &[u8]) -> ZipArchive<Cursor<&[u8]>> {
    ZipArchive::new(Cursor::new(bytes)).expect("archive should parse")
}

/// Entry names in central directory order
pub fn names(bytes: &[u8]) -> Vec<String> {
    let mut archive = open(bytes);
    (0..archive.len())
        .map(|i| archive.by_index_raw(i).unwrap().name().to_string())
        .collect()
}

pub fn read_plain(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = open(bytes);
    let mut file = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

pub fn read_encrypted(bytes: &[u8], name: &str, password: &str) -> zip::result::ZipResult<Vec<u8>> {
    let mut archive = open(bytes);
    let mut file = archive.by_name_decrypt(name, password.as_bytes())?;
    let mut out = Vec::new();
    file.read_to_end(&mut out)?;
    Ok(out)
}

pub fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

/// (entry count, central directory size, central directory offset) from the trailing EOCD
pub fn eocd(bytes: &[u8]) -> (u16, u32, u32) {
    let at = bytes.len() - 22;
    assert_eq!(u32_at(bytes, at), 0x06054b50, "archive should end with an EOCD record");
    (u16_at(bytes, at + 10), u32_at(bytes, at + 12), u32_at(bytes, at + 16))
}
