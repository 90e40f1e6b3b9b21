//! Binary framing of ZIP records
//!
//! Encodes the local file header, data descriptor, central directory record
//! and end-of-central-directory records (APPNOTE 4.3) for entries that have
//! already been compressed and encrypted. Entries are always written with a
//! trailing data descriptor (flag bit 3), so the local header carries zero
//! CRC and sizes.

use crate::encryption::AesStrength;
use crate::error::{Result, ZipBuilderError};
use crate::writer::CompressionMethod;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use std::time::SystemTime;

pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub(crate) const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub(crate) const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
pub(crate) const ZIP64_EOCD_SIGNATURE: u32 = 0x06064b50;
pub(crate) const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x07064b50;
pub(crate) const EOCD_SIGNATURE: u32 = 0x06054b50;

pub(crate) const FLAG_ENCRYPTED: u16 = 0x0001;
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
pub(crate) const FLAG_UTF8: u16 = 0x0800;

/// Compression method value announcing WinZip AES (actual method is in the extra field)
pub(crate) const METHOD_AES: u16 = 99;

const ZIP64_EXTRA_ID: u16 = 0x0001;
const AES_EXTRA_ID: u16 = 0x9901;
const AES_VENDOR_VERSION_AE2: u16 = 0x0002;

const VERSION_DEFAULT: u16 = 20;
const VERSION_ZIP64: u16 = 45;
const VERSION_AES: u16 = 51;
/// Upper byte 3 = Unix, lower byte = APPNOTE 6.3
const VERSION_MADE_BY: u16 = (3 << 8) | 63;
/// Regular file, rw-r--r--
const UNIX_FILE_ATTRIBUTES: u32 = 0o100644 << 16;

const ZIP32_MAX: u64 = u32::MAX as u64;
const ZIP32_MAX_ENTRIES: u64 = u16::MAX as u64;

/// A date and time in the MS-DOS representation used by ZIP headers.
///
/// DOS time has two-second resolution and covers 1980 through 2107; values
/// outside that range are clamped.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub struct DosDateTime {
    pub(crate) date: u16,
    pub(crate) time: u16,
}

impl DosDateTime {
    /// The current local time
    pub fn now() -> Self {
        Self::from_chrono(&Local::now())
    }

    /// Convert a filesystem timestamp, interpreted in local time
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_chrono(&DateTime::<Local>::from(time))
    }

    pub fn from_chrono<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        let year = dt.year();
        if year < 1980 {
            return Self::from_parts(1980, 1, 1, 0, 0, 0);
        }
        if year > 2107 {
            return Self::from_parts(2107, 12, 31, 23, 59, 58);
        }
        Self::from_parts(
            year as u16,
            dt.month() as u16,
            dt.day() as u16,
            dt.hour() as u16,
            dt.minute() as u16,
            dt.second() as u16,
        )
    }

    fn from_parts(year: u16, month: u16, day: u16, hour: u16, minute: u16, second: u16) -> Self {
        Self {
            date: ((year - 1980) << 9) | (month << 5) | day,
            time: (hour << 11) | (minute << 5) | (second >> 1),
        }
    }

    pub fn year(&self) -> i32 {
        (((self.date & 0xFE00) >> 9) + 1980).into()
    }

    pub fn month(&self) -> u32 {
        ((self.date & 0x1E0) >> 5).into()
    }

    pub fn day(&self) -> u32 {
        (self.date & 0x1F).into()
    }

    pub fn hour(&self) -> u32 {
        ((self.time & 0xF800) >> 11).into()
    }

    pub fn minute(&self) -> u32 {
        ((self.time & 0x7E0) >> 5).into()
    }

    /// Note that MS-DOS has a maximum granularity of two seconds.
    pub fn second(&self) -> u32 {
        ((self.time & 0x1F) << 1).into()
    }
}

/// Metadata of one written entry, kept until the central directory is emitted
#[derive(Debug, Clone)]
pub(crate) struct EntryRecord {
    pub(crate) name: String,
    pub(crate) modified: DosDateTime,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) method: CompressionMethod,
    pub(crate) encrypted: bool,
    pub(crate) aes: Option<AesStrength>,
    pub(crate) local_header_offset: u64,
    /// The local header carries a Zip64 extra field and the data descriptor 64-bit sizes
    pub(crate) zip64_local: bool,
}

impl EntryRecord {
    fn flags(&self) -> u16 {
        let mut flags = FLAG_DATA_DESCRIPTOR;
        if self.encrypted {
            flags |= FLAG_ENCRYPTED;
        }
        if !self.name.is_ascii() {
            flags |= FLAG_UTF8;
        }
        flags
    }

    /// Whether any central directory field of this entry overflows 32 bits
    pub(crate) fn needs_zip64(&self) -> bool {
        local_needs_zip64(self.compressed_size, self.uncompressed_size)
            || self.local_header_offset >= ZIP32_MAX
    }

    fn version_needed(&self, zip64: bool) -> u16 {
        if self.aes.is_some() {
            VERSION_AES
        } else if zip64 {
            VERSION_ZIP64
        } else {
            VERSION_DEFAULT
        }
    }

    fn header_method(&self) -> u16 {
        match self.aes {
            Some(_) => METHOD_AES,
            None => self.method.to_zip_method(),
        }
    }

    /// CRC for the data descriptor; AE-2 leaves it zero
    fn descriptor_crc(&self) -> u32 {
        match self.aes {
            Some(_) => 0,
            None => self.crc32,
        }
    }

    fn aes_extra_field(&self, out: &mut Vec<u8>) {
        if let Some(strength) = self.aes {
            put_u16(out, AES_EXTRA_ID);
            put_u16(out, 7);
            put_u16(out, AES_VENDOR_VERSION_AE2);
            out.extend_from_slice(b"AE");
            out.push(strength.to_winzip_code());
            put_u16(out, self.method.to_zip_method());
        }
    }

    pub(crate) fn write_local_header(&self, out: &mut Vec<u8>) {
        let mut extra = Vec::new();
        if self.zip64_local {
            // sizes follow in the data descriptor
            put_u16(&mut extra, ZIP64_EXTRA_ID);
            put_u16(&mut extra, 16);
            put_u64(&mut extra, 0);
            put_u64(&mut extra, 0);
        }
        self.aes_extra_field(&mut extra);

        let placeholder_size = if self.zip64_local { u32::MAX } else { 0 };

        put_u32(out, LOCAL_FILE_HEADER_SIGNATURE);
        put_u16(out, self.version_needed(self.zip64_local));
        put_u16(out, self.flags());
        put_u16(out, self.header_method());
        put_u16(out, self.modified.time);
        put_u16(out, self.modified.date);
        put_u32(out, 0); // crc32
        put_u32(out, placeholder_size);
        put_u32(out, placeholder_size);
        put_u16(out, self.name.len() as u16);
        put_u16(out, extra.len() as u16);
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&extra);
    }

    pub(crate) fn write_data_descriptor(&self, out: &mut Vec<u8>) {
        put_u32(out, DATA_DESCRIPTOR_SIGNATURE);
        put_u32(out, self.descriptor_crc());
        if self.zip64_local {
            put_u64(out, self.compressed_size);
            put_u64(out, self.uncompressed_size);
        } else {
            put_u32(out, clamp32(self.compressed_size));
            put_u32(out, clamp32(self.uncompressed_size));
        }
    }

    pub(crate) fn write_central_record(&self, out: &mut Vec<u8>) {
        // Zip64 values appear only for fields whose 32-bit slot holds the sentinel
        let mut zip64_data = Vec::new();
        if self.uncompressed_size >= ZIP32_MAX {
            put_u64(&mut zip64_data, self.uncompressed_size);
        }
        if self.compressed_size >= ZIP32_MAX {
            put_u64(&mut zip64_data, self.compressed_size);
        }
        if self.local_header_offset >= ZIP32_MAX {
            put_u64(&mut zip64_data, self.local_header_offset);
        }

        let mut extra = Vec::new();
        if !zip64_data.is_empty() {
            put_u16(&mut extra, ZIP64_EXTRA_ID);
            put_u16(&mut extra, zip64_data.len() as u16);
            extra.extend_from_slice(&zip64_data);
        }
        self.aes_extra_field(&mut extra);

        put_u32(out, CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(out, VERSION_MADE_BY);
        put_u16(out, self.version_needed(self.needs_zip64()));
        put_u16(out, self.flags());
        put_u16(out, self.header_method());
        put_u16(out, self.modified.time);
        put_u16(out, self.modified.date);
        put_u32(out, self.crc32);
        put_u32(out, clamp32(self.compressed_size));
        put_u32(out, clamp32(self.uncompressed_size));
        put_u16(out, self.name.len() as u16);
        put_u16(out, extra.len() as u16);
        put_u16(out, 0); // comment length
        put_u16(out, 0); // disk number start
        put_u16(out, 0); // internal attributes
        put_u32(out, UNIX_FILE_ATTRIBUTES);
        put_u32(out, clamp32(self.local_header_offset));
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&extra);
    }
}

/// Location and extent of the central directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CentralDirectoryEnd {
    pub(crate) entries: u64,
    pub(crate) size: u64,
    pub(crate) offset: u64,
}

impl CentralDirectoryEnd {
    pub(crate) fn needs_zip64(&self) -> bool {
        self.entries >= ZIP32_MAX_ENTRIES || self.size >= ZIP32_MAX || self.offset >= ZIP32_MAX
    }

    /// Write the trailer records; the Zip64 record and locator are emitted when
    /// `zip64` is set. They must start right after the central directory.
    pub(crate) fn write(&self, out: &mut Vec<u8>, zip64: bool) {
        if zip64 {
            let zip64_eocd_offset = self.offset + self.size;

            put_u32(out, ZIP64_EOCD_SIGNATURE);
            put_u64(out, 44); // size of the remaining record
            put_u16(out, VERSION_MADE_BY);
            put_u16(out, VERSION_ZIP64);
            put_u32(out, 0); // this disk
            put_u32(out, 0); // disk with central directory
            put_u64(out, self.entries);
            put_u64(out, self.entries);
            put_u64(out, self.size);
            put_u64(out, self.offset);

            put_u32(out, ZIP64_EOCD_LOCATOR_SIGNATURE);
            put_u32(out, 0); // disk with zip64 eocd
            put_u64(out, zip64_eocd_offset);
            put_u32(out, 1); // total disks
        }

        let entries = if self.entries >= ZIP32_MAX_ENTRIES {
            u16::MAX
        } else {
            self.entries as u16
        };

        put_u32(out, EOCD_SIGNATURE);
        put_u16(out, 0); // this disk
        put_u16(out, 0); // disk with central directory
        put_u16(out, entries);
        put_u16(out, entries);
        put_u32(out, clamp32(self.size));
        put_u32(out, clamp32(self.offset));
        put_u16(out, 0); // comment length
    }
}

/// Reject an archive that cannot be expressed without Zip64
pub(crate) fn check_zip32_limits(entries: &[EntryRecord], end: &CentralDirectoryEnd) -> Result<()> {
    if let Some(entry) = entries.iter().find(|e| e.needs_zip64()) {
        return Err(ZipBuilderError::SizeLimitExceeded(format!(
            "entry '{}' (compressed {} bytes, uncompressed {} bytes, offset {})",
            entry.name, entry.compressed_size, entry.uncompressed_size, entry.local_header_offset
        )));
    }
    if end.entries >= ZIP32_MAX_ENTRIES {
        return Err(ZipBuilderError::SizeLimitExceeded(format!(
            "{} entries",
            end.entries
        )));
    }
    if end.size >= ZIP32_MAX || end.offset >= ZIP32_MAX {
        return Err(ZipBuilderError::SizeLimitExceeded(format!(
            "central directory of {} bytes at offset {}",
            end.size, end.offset
        )));
    }
    Ok(())
}

/// Local-header Zip64 is only needed when a size overflows; offsets live in the central directory
pub(crate) fn local_needs_zip64(compressed_size: u64, uncompressed_size: u64) -> bool {
    compressed_size >= ZIP32_MAX || uncompressed_size >= ZIP32_MAX
}

fn clamp32(value: u64) -> u32 {
    value.min(ZIP32_MAX) as u32
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}
