//! End-to-end tests for unencrypted archives, verified with the `zip` crate

mod common;

use common::*;
use zip::CompressionMethod as ZipMethod;
use zip_builder::{ArchiveWriter, CompressionMethod, Encryption, Result, WriterState, ZipBuilderError};

#[test]
fn test_text_entries_in_order() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer
        .create()?
        .add_text_content("hello", "a.txt")?
        .add_text_content("world", "b/c.txt")?;
    let bytes = writer.finalize()?;

    assert_eq!(names(&bytes), vec!["a.txt", "b/c.txt"]);
    assert_eq!(read_plain(&bytes, "a.txt"), b"hello");
    assert_eq!(read_plain(&bytes, "b/c.txt"), b"world");
    Ok(())
}

#[test]
fn test_empty_archive() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer.create()?;
    let bytes = writer.finalize()?;

    assert_eq!(bytes.len(), 22);
    assert_eq!(eocd(&bytes), (0, 0, 0));
    assert_eq!(open(&bytes).len(), 0);
    Ok(())
}

#[test]
fn test_eocd_counts_and_offsets() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer.create()?;
    for i in 0..5 {
        writer.add_bytes(format!("payload {}", i).as_bytes(), &format!("{}.txt", i))?;
    }
    let bytes = writer.finalize()?;

    let (count, cd_size, cd_offset) = eocd(&bytes);
    assert_eq!(count, 5);
    // the central directory starts right after the last data descriptor
    assert_eq!(u32_at(&bytes, cd_offset as usize), 0x02014b50);
    assert_eq!((cd_offset + cd_size) as usize, bytes.len() - 22);
    Ok(())
}

#[test]
fn test_crc_matches_source() -> Result<()> {
    let data: Vec<u8> = (0..50_000u32).map(|i| (i * 31 % 251) as u8).collect();

    for method in [CompressionMethod::Deflate, CompressionMethod::Stored] {
        let mut writer = ArchiveWriter::new();
        writer.create()?.compression(method, 6)?.add_bytes(&data, "data.bin")?;
        let bytes = writer.finalize()?;

        let mut archive = open(&bytes);
        let file = archive.by_name("data.bin").unwrap();
        assert_eq!(file.crc32(), crc32fast::hash(&data));
        assert_eq!(file.size(), data.len() as u64);
        let expected = match method {
            CompressionMethod::Deflate => ZipMethod::Deflated,
            CompressionMethod::Stored => ZipMethod::Stored,
        };
        assert_eq!(file.compression(), expected);
        drop(file);
        assert_eq!(read_plain(&bytes, "data.bin"), data);
    }
    Ok(())
}

#[test]
fn test_large_entry_roundtrip() -> Result<()> {
    // larger than the transfer buffer
    let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 97) as u8).collect();

    let mut writer = ArchiveWriter::new();
    writer.create()?.add_bytes(&data, "big/data.bin")?;
    let bytes = writer.finalize()?;

    assert!(bytes.len() < data.len());
    assert_eq!(read_plain(&bytes, "big/data.bin"), data);
    Ok(())
}

#[test]
fn test_duplicate_names_are_kept() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer
        .create()?
        .add_text_content("one", "same.txt")?
        .add_text_content("two", "same.txt")?;
    assert_eq!(writer.entry_count(), 2);
    let bytes = writer.finalize()?;

    assert_eq!(eocd(&bytes).0, 2);
    Ok(())
}

#[test]
fn test_entry_name_cleaning() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer
        .create()?
        .add_text_content("x", "dir\\file.txt")?
        .add_text_content("y", "/rooted.txt")?
        .add_text_content("z", "répertoire/é.txt")?;
    let bytes = writer.finalize()?;

    assert_eq!(names(&bytes), vec!["dir/file.txt", "rooted.txt", "répertoire/é.txt"]);
    Ok(())
}

#[test]
fn test_empty_entry_name_rejected() {
    let mut writer = ArchiveWriter::new();
    writer.create().unwrap();
    assert!(matches!(
        writer.add_text_content("x", ""),
        Err(ZipBuilderError::InvalidArgument { .. })
    ));
    assert_eq!(writer.state(), WriterState::Configuring);
}

#[test]
fn test_configuration_locked_after_first_entry() {
    let mut writer = ArchiveWriter::new();
    writer.create().unwrap();
    writer.add_text_content("x", "x.txt").unwrap();

    assert!(matches!(
        writer.disable_zip64(),
        Err(ZipBuilderError::InvalidConfigurationState(_))
    ));
    assert!(matches!(
        writer.use_encryption("pw", Encryption::Aes256),
        Err(ZipBuilderError::InvalidConfigurationState(_))
    ));
    assert!(matches!(
        writer.compression(CompressionMethod::Stored, 0),
        Err(ZipBuilderError::InvalidConfigurationState(_))
    ));
}

#[test]
fn test_finalize_twice() {
    let mut writer = ArchiveWriter::new();
    writer.create().unwrap();
    writer.add_text_content("x", "x.txt").unwrap();
    writer.finalize().unwrap();

    assert!(matches!(writer.finalize(), Err(ZipBuilderError::AlreadyFinalized)));
    assert!(matches!(
        writer.add_text_content("y", "y.txt"),
        Err(ZipBuilderError::AlreadyFinalized)
    ));
    assert!(matches!(writer.create(), Err(ZipBuilderError::AlreadyFinalized)));
}

#[test]
fn test_finalize_without_create() {
    let mut writer = ArchiveWriter::new();
    assert!(matches!(writer.finalize(), Err(ZipBuilderError::NotInitialized)));
}

#[test]
fn test_zip64_disabled_small_archive() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer.create()?.disable_zip64()?.add_text_content("small", "s.txt")?;
    assert!(!writer.is_zip64_enabled());
    let bytes = writer.finalize()?;

    assert_eq!(read_plain(&bytes, "s.txt"), b"small");
    Ok(())
}

#[test]
fn test_unix_permissions() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer.create()?.add_text_content("x", "x.txt")?;
    let bytes = writer.finalize()?;

    let mut archive = open(&bytes);
    assert_eq!(archive.by_index(0).unwrap().unix_mode(), Some(0o100644));
    Ok(())
}
