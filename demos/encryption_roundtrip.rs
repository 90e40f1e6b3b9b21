//! Encryption example - one archive per method, ready for `7z t -p<password>`
//!
//! Run with: cargo run --example encryption_roundtrip

use zip_builder::{ArchiveWriter, Encryption, Result};

fn main() -> Result<()> {
    let password = "test_password_12345";

    for (file, method) in [
        ("classic.zip", Encryption::Classic),
        ("aes128.zip", Encryption::Aes128),
        ("aes256.zip", Encryption::Aes256),
    ] {
        let mut writer = ArchiveWriter::new();
        writer
            .create()?
            .use_encryption(password, method)?
            .add_text_content("This is the first secret message!", "secret1.txt")?
            .add_text_content("Nested secret file in a folder!", "folder/secret2.txt")?;

        let zip_bytes = writer.finalize()?;
        std::fs::write(file, &zip_bytes)?;
        println!("{:?}: wrote {} ({} bytes)", method, file, zip_bytes.len());
    }

    println!("Password: {}", password);
    Ok(())
}
