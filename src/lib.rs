//! # zip-builder: In-Memory ZIP Archive Builder
//!
//! `zip-builder` assembles a complete ZIP archive in a single in-memory buffer
//! from bytes, text and files, with optional whole-archive password encryption.
//!
//! ## Features
//!
//! - **Builder API**: chain `create`, configuration and `add_*` calls, then `finalize`
//! - **Encryption**: WinZip AES-128/AES-256 (AE-2) or legacy PKZIP Classic for old readers
//! - **Zip64**: enabled by default, can be disabled for pre-Zip64 readers
//! - **Bounded reads**: files are streamed through a fixed transfer buffer
//!
//! ## Quick Start
//!
//! ```no_run
//! use zip_builder::ArchiveWriter;
//!
//! let mut writer = ArchiveWriter::new();
//! writer
//!     .create()?
//!     .add_text_content("hello", "a.txt")?
//!     .add_text_content("world", "b/c.txt")?
//!     .add_file("report.pdf", "docs/report.pdf")?;
//!
//! let zip_bytes = writer.finalize()?;
//! println!("Created ZIP with {} bytes", zip_bytes.len());
//! # Ok::<(), zip_builder::ZipBuilderError>(())
//! ```
//!
//! ### Password protection
//!
//! ```no_run
//! use zip_builder::{ArchiveWriter, Encryption};
//!
//! let mut writer = ArchiveWriter::new();
//! writer
//!     .create()?
//!     .use_encryption("secret", Encryption::Aes256)?
//!     .add_bytes(&[0u8; 16], "x.bin")?;
//! let zip_bytes = writer.finalize()?;
//! # Ok::<(), zip_builder::ZipBuilderError>(())
//! ```

pub mod encryption;
pub mod error;
pub mod frame;
pub mod writer;

pub use encryption::{AesStrength, Encryption};
pub use error::{Result, ZipBuilderError};
pub use frame::DosDateTime;
pub use writer::{ArchiveWriter, CompressionMethod, WriterState};
