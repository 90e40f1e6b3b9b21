//! Whole-archive encryption for ZIP entries
//!
//! Two ciphers are available, both applied to the *compressed* entry stream:
//!
//! - **Classic**: the original PKWARE stream cipher (APPNOTE 6.1). It is broken
//!   by known-plaintext attacks and exists only for readers that cannot do
//!   anything else, such as older Windows Compressed Folders.
//! - **AES** (WinZip AE-2): AES-128 or AES-256 in CTR mode, keys derived with
//!   PBKDF2-HMAC-SHA1 (1000 iterations), authenticated with a 10-byte
//!   HMAC-SHA1 tag.
//!
//! Every entry derives fresh key material: the AES salt and the Classic header
//! bytes are drawn from the OS random source for each entry.

use crate::error::{Result, ZipBuilderError};
use aes::{Aes128, Aes256};
use ctr::{
    cipher::{KeyIvInit, StreamCipher},
    Ctr128LE,
};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use std::io::{self, Write};

type HmacSha1 = Hmac<Sha1>;

const PBKDF2_ITERATIONS: u32 = 1000;

/// Length of the WinZip AES authentication code
pub const AUTH_CODE_SIZE: usize = 10;

/// Length of the AES password verification value
pub const PASSWORD_VERIFY_SIZE: usize = 2;

/// Length of the Classic encryption header
pub const CLASSIC_HEADER_SIZE: usize = 12;

/// Encryption method applied to every entry of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encryption {
    /// No encryption
    None,
    /// PKZIP 2.0 "Classic" encryption.
    ///
    /// Very weak and NOT RECOMMENDED. Only useful for old clients that do not
    /// understand AES.
    Classic,
    /// WinZip AES with a 128-bit key
    Aes128,
    /// WinZip AES with a 192-bit key (rejected, see [`Encryption::aes_strength`])
    Aes192,
    /// WinZip AES with a 256-bit key
    #[default]
    Aes256,
}

impl Encryption {
    /// WinZip AES with the default key size
    pub const AES: Encryption = Encryption::Aes256;

    /// Map an AES method to its supported strength.
    ///
    /// Returns `Ok(None)` for non-AES methods and
    /// [`ZipBuilderError::UnsupportedEncryptionStrength`] for AES-192.
    pub fn aes_strength(self) -> Result<Option<AesStrength>> {
        match self {
            Encryption::None | Encryption::Classic => Ok(None),
            Encryption::Aes128 => Ok(Some(AesStrength::Aes128)),
            Encryption::Aes192 => Err(ZipBuilderError::UnsupportedEncryptionStrength(192)),
            Encryption::Aes256 => Ok(Some(AesStrength::Aes256)),
        }
    }
}

/// Supported AES key strengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AesStrength {
    Aes128,
    Aes256,
}

impl AesStrength {
    /// Get salt size in bytes
    pub fn salt_size(&self) -> usize {
        match self {
            AesStrength::Aes128 => 8,
            AesStrength::Aes256 => 16,
        }
    }

    /// Get key size in bytes
    pub fn key_size(&self) -> usize {
        match self {
            AesStrength::Aes128 => 16,
            AesStrength::Aes256 => 32,
        }
    }

    /// Encryption key + authentication key + password verification value
    pub fn derived_key_size(&self) -> usize {
        self.key_size() * 2 + PASSWORD_VERIFY_SIZE
    }

    /// Get WinZip encryption strength code
    pub fn to_winzip_code(&self) -> u8 {
        match self {
            AesStrength::Aes128 => 0x01,
            AesStrength::Aes256 => 0x03,
        }
    }

    /// Bytes added around the ciphertext: salt, verification value and tag
    pub fn overhead(&self) -> u64 {
        (self.salt_size() + PASSWORD_VERIFY_SIZE + AUTH_CODE_SIZE) as u64
    }
}

/// The validated, archive-wide encryption choice.
///
/// Holds the password; per-entry state is created by [`EncryptionStrategy::wrap`].
#[derive(Clone, Default)]
pub(crate) enum EncryptionStrategy {
    #[default]
    None,
    Classic {
        password: String,
    },
    Aes {
        password: String,
        strength: AesStrength,
    },
}

impl std::fmt::Debug for EncryptionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the password
        match self {
            EncryptionStrategy::None => f.write_str("None"),
            EncryptionStrategy::Classic { .. } => f.write_str("Classic"),
            EncryptionStrategy::Aes { strength, .. } => write!(f, "Aes({:?})", strength),
        }
    }
}

impl EncryptionStrategy {
    /// Validate a password/method pair.
    ///
    /// `Encryption::None` ignores the password.
    pub(crate) fn new(password: &str, method: Encryption) -> Result<Self> {
        if method == Encryption::None {
            return Ok(EncryptionStrategy::None);
        }
        if password.trim().is_empty() {
            return Err(ZipBuilderError::invalid_argument(
                "password",
                "must not be empty or whitespace",
            ));
        }
        let password = password.to_string();
        Ok(match method.aes_strength()? {
            Some(strength) => EncryptionStrategy::Aes { password, strength },
            None => EncryptionStrategy::Classic { password },
        })
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        !matches!(self, EncryptionStrategy::None)
    }

    pub(crate) fn aes_strength(&self) -> Option<AesStrength> {
        match self {
            EncryptionStrategy::Aes { strength, .. } => Some(*strength),
            _ => None,
        }
    }

    /// Fixed number of bytes each entry gains on the wire
    pub(crate) fn overhead(&self) -> u64 {
        match self {
            EncryptionStrategy::None => 0,
            EncryptionStrategy::Classic { .. } => CLASSIC_HEADER_SIZE as u64,
            EncryptionStrategy::Aes { strength, .. } => strength.overhead(),
        }
    }

    /// Start encrypting one entry into `inner`.
    ///
    /// Cipher header bytes (Classic header, or AES salt + verification value)
    /// are written immediately. `check_byte` is the last Classic header byte
    /// a reader compares after decrypting the header.
    pub(crate) fn wrap<W: Write>(&self, mut inner: W, check_byte: u8) -> Result<CipherWriter<W>> {
        let cipher = match self {
            EncryptionStrategy::None => EntryCipher::Plain,
            EncryptionStrategy::Classic { password } => {
                let mut crypto = ZipCrypto::new(password.as_bytes());
                let mut header = [0u8; CLASSIC_HEADER_SIZE];
                fill_random(&mut header[..CLASSIC_HEADER_SIZE - 1])?;
                header[CLASSIC_HEADER_SIZE - 1] = check_byte;
                crypto.encrypt(&mut header);
                inner.write_all(&header)?;
                EntryCipher::Classic(crypto)
            }
            EncryptionStrategy::Aes { password, strength } => {
                let encryptor = AesEncryptor::new(password, *strength)?;
                inner.write_all(encryptor.salt())?;
                inner.write_all(encryptor.password_verify())?;
                EntryCipher::Aes(Box::new(encryptor))
            }
        };
        Ok(CipherWriter {
            inner,
            cipher,
            scratch: Vec::new(),
        })
    }
}

enum EntryCipher {
    Plain,
    Classic(ZipCrypto),
    Aes(Box<AesEncryptor>),
}

/// Writer that encrypts everything passing through it into `inner`
pub(crate) struct CipherWriter<W: Write> {
    inner: W,
    cipher: EntryCipher,
    scratch: Vec<u8>,
}

impl<W: Write> CipherWriter<W> {
    /// Write any trailer (the AES authentication code) and return the inner writer
    pub(crate) fn finish(mut self) -> io::Result<W> {
        if let EntryCipher::Aes(encryptor) = self.cipher {
            self.inner.write_all(&encryptor.finalize())?;
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.cipher {
            EntryCipher::Plain => self.inner.write(buf),
            EntryCipher::Classic(crypto) => {
                self.scratch.clear();
                self.scratch.extend_from_slice(buf);
                crypto.encrypt(&mut self.scratch);
                self.inner.write_all(&self.scratch)?;
                Ok(buf.len())
            }
            EntryCipher::Aes(encryptor) => {
                self.scratch.clear();
                self.scratch.extend_from_slice(buf);
                encryptor.encrypt(&mut self.scratch);
                self.inner.write_all(&self.scratch)?;
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

enum AesCtr {
    Aes128(Ctr128LE<Aes128>),
    Aes256(Ctr128LE<Aes256>),
}

impl AesCtr {
    fn new(strength: AesStrength, key: &[u8]) -> Result<Self> {
        // WinZip counter: little-endian, starting at 1
        let mut iv = [0u8; 16];
        iv[0] = 1;
        let cipher = match strength {
            AesStrength::Aes128 => Ctr128LE::<Aes128>::new_from_slices(key, &iv).map(AesCtr::Aes128),
            AesStrength::Aes256 => Ctr128LE::<Aes256>::new_from_slices(key, &iv).map(AesCtr::Aes256),
        };
        cipher.map_err(|e| ZipBuilderError::Crypto(format!("AES-CTR init failed: {}", e)))
    }

    fn apply_keystream(&mut self, data: &mut [u8]) {
        match self {
            AesCtr::Aes128(c) => c.apply_keystream(data),
            AesCtr::Aes256(c) => c.apply_keystream(data),
        }
    }
}

/// Derived AES keys for one entry
struct AesKeys {
    encryption_key: Vec<u8>,
    auth_key: Vec<u8>,
    password_verify: [u8; 2],
}

fn derive_aes_keys(password: &str, strength: AesStrength, salt: &[u8]) -> AesKeys {
    let mut derived = vec![0u8; strength.derived_key_size()];
    pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut derived);

    let key_size = strength.key_size();
    AesKeys {
        encryption_key: derived[..key_size].to_vec(),
        auth_key: derived[key_size..key_size * 2].to_vec(),
        password_verify: [derived[key_size * 2], derived[key_size * 2 + 1]],
    }
}

/// AES encryption context for a ZIP entry
pub(crate) struct AesEncryptor {
    salt: Vec<u8>,
    password_verify: [u8; 2],
    cipher: AesCtr,
    hmac: HmacSha1,
}

impl AesEncryptor {
    /// Create an encryptor with a fresh random salt
    pub(crate) fn new(password: &str, strength: AesStrength) -> Result<Self> {
        let mut salt = vec![0u8; strength.salt_size()];
        fill_random(&mut salt)?;
        Self::with_salt(password, strength, salt)
    }

    fn with_salt(password: &str, strength: AesStrength, salt: Vec<u8>) -> Result<Self> {
        let keys = derive_aes_keys(password, strength, &salt);
        let cipher = AesCtr::new(strength, &keys.encryption_key)?;
        let hmac = HmacSha1::new_from_slice(&keys.auth_key)
            .map_err(|e| ZipBuilderError::Crypto(format!("HMAC init failed: {}", e)))?;

        Ok(Self {
            salt,
            password_verify: keys.password_verify,
            cipher,
            hmac,
        })
    }

    pub(crate) fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub(crate) fn password_verify(&self) -> &[u8; 2] {
        &self.password_verify
    }

    /// Encrypt in place; the MAC covers the ciphertext
    pub(crate) fn encrypt(&mut self, data: &mut [u8]) {
        self.cipher.apply_keystream(data);
        self.hmac.update(data);
    }

    /// Finalize and get the authentication code (first 10 bytes of the HMAC)
    pub(crate) fn finalize(self) -> [u8; AUTH_CODE_SIZE] {
        let mac = self.hmac.finalize().into_bytes();
        let mut code = [0u8; AUTH_CODE_SIZE];
        code.copy_from_slice(&mac[..AUTH_CODE_SIZE]);
        code
    }
}

/// CRC-32 lookup table (polynomial 0xEDB88320, reflected)
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

#[inline]
fn crc32_update(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// PKWARE Classic stream cipher state
#[derive(Clone)]
pub(crate) struct ZipCrypto {
    keys: [u32; 3],
}

impl ZipCrypto {
    pub(crate) fn new(password: &[u8]) -> Self {
        let mut crypto = Self {
            keys: [0x12345678, 0x23456789, 0x34567890],
        };
        for &byte in password {
            crypto.update_keys(byte);
        }
        crypto
    }

    #[inline]
    fn update_keys(&mut self, byte: u8) {
        self.keys[0] = crc32_update(self.keys[0], byte);
        self.keys[1] = self.keys[1]
            .wrapping_add(self.keys[0] & 0xFF)
            .wrapping_mul(134775813)
            .wrapping_add(1);
        self.keys[2] = crc32_update(self.keys[2], (self.keys[1] >> 24) as u8);
    }

    #[inline]
    fn stream_byte(&self) -> u8 {
        let temp = (self.keys[2] | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    pub(crate) fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let plain = *byte;
            *byte = plain ^ self.stream_byte();
            self.update_keys(plain);
        }
    }

    #[cfg(test)]
    fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let plain = *byte ^ self.stream_byte();
            *byte = plain;
            self.update_keys(plain);
        }
    }
}

fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf)
        .map_err(|e| ZipBuilderError::Crypto(format!("random source unavailable: {}", e)))
}
