//! In-memory ZIP archive builder
//!
//! [`ArchiveWriter`] pushes every entry through CRC-32 accounting, the
//! compressor and the archive's encryption strategy, then appends the local
//! header, payload and data descriptor to one growing buffer. The central
//! directory is emitted by [`ArchiveWriter::finalize`].
//!
//! An entry is built completely before anything is appended, so a failing
//! call never leaves a partial entry in the archive.

use crate::encryption::{CipherWriter, Encryption, EncryptionStrategy};
use crate::error::{Result, ZipBuilderError};
use crate::frame::{self, CentralDirectoryEnd, DosDateTime, EntryRecord};
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Size of the transfer buffer used to stream sources into the compressor
const TRANSFER_BUFFER_SIZE: usize = 64 * 1024;

/// Compression method to use for ZIP entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// DEFLATE compression (most common)
    #[default]
    Deflate,
}

impl CompressionMethod {
    pub(crate) fn to_zip_method(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
        }
    }
}

/// Lifecycle of an [`ArchiveWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// `create` has not been called
    Uninitialized,
    /// Archive open, configuration still allowed
    Configuring,
    /// At least one entry written; configuration is locked
    Writing,
    /// Terminal: the archive bytes have been handed out
    Finalized,
}

/// Builds a ZIP archive in memory.
///
/// Configuration (`disable_zip64`, `use_encryption`, `compression`) is only
/// accepted between [`create`](Self::create) and the first entry. Every
/// operation returns `&mut Self` so calls can be chained with `?`.
///
/// The writer is not synchronized; callers sharing one across threads must
/// serialize access themselves.
///
/// # Example
/// ```no_run
/// use zip_builder::{ArchiveWriter, Encryption};
///
/// let mut writer = ArchiveWriter::new();
/// writer
///     .create()?
///     .use_encryption("secret", Encryption::Aes256)?
///     .add_text_content("hello", "a.txt")?
///     .add_bytes(&[1, 2, 3], "data/raw.bin")?;
/// let archive: Vec<u8> = writer.finalize()?;
/// # Ok::<(), zip_builder::ZipBuilderError>(())
/// ```
#[derive(Debug)]
pub struct ArchiveWriter {
    state: WriterState,
    buffer: Vec<u8>,
    entries: Vec<EntryRecord>,
    zip64_enabled: bool,
    encryption: EncryptionStrategy,
    encryption_configured: bool,
    compression_method: CompressionMethod,
    compression_level: u32,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

trait CompressorWrite: Write {
    fn finish_compression(self: Box<Self>) -> Result<CipherWriter<Vec<u8>>>;
}

struct DeflateCompressor {
    encoder: DeflateEncoder<CipherWriter<Vec<u8>>>,
}

impl Write for DeflateCompressor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl CompressorWrite for DeflateCompressor {
    fn finish_compression(self: Box<Self>) -> Result<CipherWriter<Vec<u8>>> {
        Ok(self.encoder.finish()?)
    }
}

struct StoredCompressor {
    inner: CipherWriter<Vec<u8>>,
}

impl Write for StoredCompressor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl CompressorWrite for StoredCompressor {
    fn finish_compression(self: Box<Self>) -> Result<CipherWriter<Vec<u8>>> {
        Ok(self.inner)
    }
}

/// Metadata tracker for CRC and byte counts
struct CrcCounter {
    crc: Crc32,
    uncompressed_count: u64,
}

impl CrcCounter {
    fn new() -> Self {
        Self {
            crc: Crc32::new(),
            uncompressed_count: 0,
        }
    }

    fn update_uncompressed(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.uncompressed_count += data.len() as u64;
    }

    fn finalize(self) -> u32 {
        self.crc.finalize()
    }
}

impl ArchiveWriter {
    /// A writer with no archive yet; call [`create`](Self::create) next
    pub fn new() -> Self {
        Self {
            state: WriterState::Uninitialized,
            buffer: Vec::new(),
            entries: Vec::new(),
            zip64_enabled: true,
            encryption: EncryptionStrategy::None,
            encryption_configured: false,
            compression_method: CompressionMethod::Deflate,
            compression_level: 6,
        }
    }

    /// Open the in-memory archive
    pub fn create(&mut self) -> Result<&mut Self> {
        match self.state {
            WriterState::Uninitialized => {}
            WriterState::Finalized => return Err(ZipBuilderError::AlreadyFinalized),
            _ => return Err(ZipBuilderError::AlreadyInitialized),
        }
        self.state = WriterState::Configuring;
        debug!("archive created");
        Ok(self)
    }

    /// Disallow Zip64 records, for readers that predate them (such as
    /// Windows XP Compressed Folders).
    ///
    /// Archives that then need a size, offset or count beyond the 32-bit
    /// fields fail at [`finalize`](Self::finalize) with
    /// [`ZipBuilderError::SizeLimitExceeded`].
    pub fn disable_zip64(&mut self) -> Result<&mut Self> {
        self.require_configuring("Zip64 can only be disabled before entries are added")?;
        self.zip64_enabled = false;
        debug!("zip64 disabled");
        Ok(self)
    }

    /// Encrypt every entry of the archive with `password`.
    ///
    /// Allowed once, before the first entry. `Encryption::None` keeps the
    /// archive unencrypted and ignores the password.
    pub fn use_encryption(&mut self, password: &str, method: Encryption) -> Result<&mut Self> {
        self.require_configuring("encryption must be configured before entries are added")?;
        if self.encryption_configured {
            return Err(ZipBuilderError::InvalidConfigurationState(
                "encryption has already been configured",
            ));
        }

        self.encryption = EncryptionStrategy::new(password, method)?;
        self.encryption_configured = true;

        if method == Encryption::Classic {
            warn!("classic PKZIP encryption is insecure; use it only for legacy readers");
        }
        debug!(strategy = ?self.encryption, "encryption configured");
        Ok(self)
    }

    /// Select the compression method and level (0-9, DEFLATE only) for all entries.
    ///
    /// Defaults to DEFLATE at level 6.
    pub fn compression(&mut self, method: CompressionMethod, level: u32) -> Result<&mut Self> {
        self.require_configuring("compression must be configured before entries are added")?;
        if level > 9 {
            return Err(ZipBuilderError::invalid_argument(
                "level",
                format!("{} is outside 0-9", level),
            ));
        }
        self.compression_method = method;
        self.compression_level = level;
        debug!(?method, level, "compression configured");
        Ok(self)
    }

    /// Add an entry holding `bytes`
    pub fn add_bytes(&mut self, bytes: &[u8], entry_name: &str) -> Result<&mut Self> {
        self.write_entry(entry_name, DosDateTime::now(), bytes)?;
        Ok(self)
    }

    /// Add `content` as a UTF-8 encoded entry
    pub fn add_text_content(&mut self, content: &str, entry_name: &str) -> Result<&mut Self> {
        self.add_bytes(content.as_bytes(), entry_name)
    }

    /// Add the file at `source_path`, streamed through a bounded buffer.
    ///
    /// The entry is stamped with the file's modification time when the
    /// platform reports one, unlike [`add_bytes`](Self::add_bytes) and
    /// [`add_text_content`](Self::add_text_content) which use the current
    /// time. A path that cannot be opened for reading is reported as
    /// [`ZipBuilderError::NotFound`].
    pub fn add_file<P: AsRef<Path>>(&mut self, source_path: P, entry_name: &str) -> Result<&mut Self> {
        let path = source_path.as_ref();
        self.require_writable()?;

        let not_found = || ZipBuilderError::NotFound(path.display().to_string());
        let metadata = fs::metadata(path).map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }
        let file = File::open(path).map_err(|_| not_found())?;

        let modified = metadata
            .modified()
            .map(DosDateTime::from_system_time)
            .unwrap_or_else(|_| DosDateTime::now());

        self.write_entry(entry_name, modified, file)?;
        Ok(self)
    }

    /// Add the top-level files of directory `path` (no recursion) under `entry_name`.
    ///
    /// Each file becomes `entry_name/<file name>`; subdirectories are skipped.
    /// Entry order follows the filesystem's enumeration order, which is not
    /// stable across platforms, so archives built this way are not
    /// byte-for-byte reproducible. Files added before a failing file stay in
    /// the archive.
    pub fn add_directory_shallow<P: AsRef<Path>>(&mut self, path: P, entry_name: &str) -> Result<&mut Self> {
        let path = path.as_ref();
        self.require_writable()?;
        if !path.is_dir() {
            return Err(ZipBuilderError::invalid_argument(
                "path",
                format!("'{}' is not a directory", path.display()),
            ));
        }

        let prefix = entry_name.trim_end_matches(['/', '\\']);
        for dir_entry in fs::read_dir(path)? {
            let file_path = dir_entry?.path();
            if !file_path.is_file() {
                continue;
            }
            let Some(file_name) = file_path.file_name() else {
                continue;
            };
            let file_name = file_name.to_string_lossy();
            let name = if prefix.is_empty() {
                file_name.into_owned()
            } else {
                format!("{}/{}", prefix, file_name)
            };
            self.add_file(&file_path, &name)?;
        }
        Ok(self)
    }

    /// Append the central directory and end records and hand out the archive.
    ///
    /// Valid once; afterwards every call fails with
    /// [`ZipBuilderError::AlreadyFinalized`]. When Zip64 is disabled and the
    /// archive needs it, the writer stays open and nothing is appended.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        match self.state {
            WriterState::Uninitialized => return Err(ZipBuilderError::NotInitialized),
            WriterState::Finalized => return Err(ZipBuilderError::AlreadyFinalized),
            WriterState::Configuring | WriterState::Writing => {}
        }

        let offset = self.buffer.len() as u64;
        let mut central = Vec::new();
        for entry in &self.entries {
            entry.write_central_record(&mut central);
        }
        let end = CentralDirectoryEnd {
            entries: self.entries.len() as u64,
            size: central.len() as u64,
            offset,
        };

        if !self.zip64_enabled {
            frame::check_zip32_limits(&self.entries, &end)?;
        }
        let zip64 = self.zip64_enabled
            && (end.needs_zip64() || self.entries.iter().any(EntryRecord::needs_zip64));

        self.buffer.extend_from_slice(&central);
        end.write(&mut self.buffer, zip64);

        debug!(
            entries = end.entries,
            central_directory_offset = end.offset,
            zip64,
            size = self.buffer.len(),
            "archive finalized"
        );

        self.state = WriterState::Finalized;
        Ok(std::mem::take(&mut self.buffer))
    }

    /// Current lifecycle state
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Number of entries written so far; still reported after `finalize`
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_zip64_enabled(&self) -> bool {
        self.zip64_enabled
    }

    fn require_configuring(&self, reason: &'static str) -> Result<()> {
        match self.state {
            WriterState::Uninitialized => Err(ZipBuilderError::NotInitialized),
            WriterState::Configuring => Ok(()),
            WriterState::Writing => Err(ZipBuilderError::InvalidConfigurationState(reason)),
            WriterState::Finalized => Err(ZipBuilderError::AlreadyFinalized),
        }
    }

    fn require_writable(&self) -> Result<()> {
        match self.state {
            WriterState::Uninitialized => Err(ZipBuilderError::NotInitialized),
            WriterState::Configuring | WriterState::Writing => Ok(()),
            WriterState::Finalized => Err(ZipBuilderError::AlreadyFinalized),
        }
    }

    /// Compress, encrypt and frame one entry, then append it to the archive
    fn write_entry<R: Read>(&mut self, entry_name: &str, modified: DosDateTime, mut source: R) -> Result<()> {
        self.require_writable()?;
        let name = clean_entry_name(entry_name)?;

        // Classic check byte: high byte of the DOS time, as readers expect
        // when a data descriptor follows
        let cipher = self
            .encryption
            .wrap(Vec::new(), (modified.time >> 8) as u8)?;
        let mut compressor: Box<dyn CompressorWrite> = match self.compression_method {
            CompressionMethod::Deflate => Box::new(DeflateCompressor {
                encoder: DeflateEncoder::new(cipher, Compression::new(self.compression_level)),
            }),
            CompressionMethod::Stored => Box::new(StoredCompressor { inner: cipher }),
        };

        let mut counter = CrcCounter::new();
        let mut chunk = vec![0u8; TRANSFER_BUFFER_SIZE];
        loop {
            let read = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            counter.update_uncompressed(&chunk[..read]);
            compressor.write_all(&chunk[..read])?;
        }

        let payload = compressor.finish_compression()?.finish()?;
        let uncompressed_size = counter.uncompressed_count;
        let compressed_size = payload.len() as u64;

        let record = EntryRecord {
            name,
            modified,
            crc32: counter.finalize(),
            compressed_size,
            uncompressed_size,
            method: self.compression_method,
            encrypted: self.encryption.is_encrypted(),
            aes: self.encryption.aes_strength(),
            local_header_offset: self.buffer.len() as u64,
            zip64_local: self.zip64_enabled
                && frame::local_needs_zip64(compressed_size, uncompressed_size),
        };

        record.write_local_header(&mut self.buffer);
        self.buffer.extend_from_slice(&payload);
        record.write_data_descriptor(&mut self.buffer);

        trace!(
            name = %record.name,
            uncompressed_size,
            compressed_size,
            overhead = self.encryption.overhead(),
            offset = record.local_header_offset,
            "entry written"
        );

        self.entries.push(record);
        self.state = WriterState::Writing;
        Ok(())
    }
}

/// Normalize an entry name to forward slashes without a leading separator
fn clean_entry_name(entry_name: &str) -> Result<String> {
    let name = entry_name.replace('\\', "/");
    let name = name.trim_start_matches('/');
    if name.is_empty() {
        return Err(ZipBuilderError::invalid_argument(
            "entry_name",
            "must not be empty",
        ));
    }
    if name.len() > u16::MAX as usize {
        return Err(ZipBuilderError::invalid_argument(
            "entry_name",
            format!("{} bytes exceeds the 65535-byte limit", name.len()),
        ));
    }
    Ok(name.to_string())
}
