//! Basic example - build a ZIP in memory and write it to disk
//!
//! Run with: cargo run --example basic

use zip_builder::{ArchiveWriter, Result};

fn main() -> Result<()> {
    let mut writer = ArchiveWriter::new();
    writer
        .create()?
        .add_text_content("Hello, World!", "hello.txt")?
        .add_text_content("Another file", "nested/another.txt")?
        .add_bytes(&(0u8..=255).collect::<Vec<_>>(), "data/bytes.bin")?;

    let zip_bytes = writer.finalize()?;
    std::fs::write("basic.zip", &zip_bytes)?;

    println!("Created basic.zip ({} bytes)", zip_bytes.len());
    Ok(())
}
