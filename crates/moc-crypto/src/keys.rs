//! Key management: master key, per-file keys, FileId generation

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::recovery;
use crate::KEY_SIZE;

/// Fill `buf` from the OS CSPRNG. Never falls back to a weaker source.
pub(crate) fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::CryptoUnavailable(format!("secure random source: {e}")))
}

fn random_key_bytes() -> CryptoResult<[u8; KEY_SIZE]> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    Ok(bytes)
}

/// The session's 256-bit master key. Zeroized on drop.
///
/// Not used for chunk encryption; it exists to be displayed and recovered.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Lowercase hex, 64 chars.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A per-file 256-bit encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build a key from an arbitrary slice, rejecting anything but 32 bytes.
    pub fn from_slice(key: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKey { len: key.len() })?;
        Ok(Self { bytes })
    }

    /// Parse a hex-encoded key (surrounding whitespace ignored).
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let mut raw = hex::decode(s.trim()).map_err(|_| CryptoError::InvalidKey {
            len: s.trim().len() / 2,
        })?;
        let key = Self::from_slice(&raw);
        raw.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Opaque per-file identifier, e.g. `file_1760870400123_k3x9q0z2a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Issue an id from the process-wide generator, for files encrypted
    /// without a `KeyManager`-issued id.
    pub fn generate() -> CryptoResult<Self> {
        PROCESS_IDS.next()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Issues `file_<millis>_<suffix>` ids.
///
/// The millisecond component never repeats within one generator: when the
/// clock has not advanced past the last issued value, last + 1 is used. The
/// 9-char base-36 suffix (~46 bits) separates ids from different generators
/// that land on the same millisecond.
#[derive(Debug, Default)]
struct FileIdGenerator {
    last_millis: AtomicU64,
}

impl FileIdGenerator {
    const fn new() -> Self {
        Self {
            last_millis: AtomicU64::new(0),
        }
    }

    fn next(&self) -> CryptoResult<FileId> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);

        let advance = |prev: u64| now.max(prev.saturating_add(1));
        let prev = match self
            .last_millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| Some(advance(prev)))
        {
            Ok(prev) | Err(prev) => prev,
        };

        Ok(FileId(format!("file_{}_{}", advance(prev), random_base36(SUFFIX_LEN)?)))
    }
}

static PROCESS_IDS: FileIdGenerator = FileIdGenerator::new();

/// Unbiased base-36 string via rejection sampling over random bytes.
fn random_base36(len: usize) -> CryptoResult<String> {
    // 252 = 36 * 7, the largest multiple of 36 that fits in a byte
    const LIMIT: u8 = 252;

    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 16];
    while out.len() < len {
        fill_random(&mut buf)?;
        for &b in buf.iter().filter(|&&b| b < LIMIT) {
            if out.len() == len {
                break;
            }
            out.push(char::from(BASE36[usize::from(b % 36)]));
        }
    }
    Ok(out)
}

/// Owns the session master key and the FileId → FileKey map.
///
/// Share it behind an `Arc`; lookups take a read lock and never block each
/// other. A FileId is returned only after its key is in the map.
#[derive(Debug, Default)]
pub struct KeyManager {
    master: RwLock<Option<MasterKey>>,
    file_keys: RwLock<HashMap<FileId, FileKey>>,
    ids: FileIdGenerator,
}

impl KeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh master key, replacing any previous one.
    ///
    /// Returns the key as lowercase hex for display.
    pub fn generate_master_key(&self) -> CryptoResult<String> {
        let master = MasterKey::from_bytes(random_key_bytes()?);
        let hex = master.to_hex();
        *self.master.write() = Some(master);
        tracing::debug!("generated master key");
        Ok(hex)
    }

    /// Generate a per-file key and register it under a new FileId.
    pub fn generate_file_key(&self) -> CryptoResult<(FileId, FileKey)> {
        let key = FileKey::from_bytes(random_key_bytes()?);
        let file_id = self.ids.next()?;
        self.file_keys.write().insert(file_id.clone(), key.clone());
        tracing::debug!(file_id = %file_id, "generated file key");
        Ok((file_id, key))
    }

    pub fn file_key(&self, file_id: &FileId) -> Option<FileKey> {
        self.file_keys.read().get(file_id).cloned()
    }

    /// Drop the key for `file_id`. Returns whether a key was present.
    pub fn forget_file_key(&self, file_id: &FileId) -> bool {
        self.file_keys.write().remove(file_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.file_keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_keys.read().is_empty()
    }

    pub fn master_key_hex(&self) -> Option<String> {
        self.master.read().as_ref().map(MasterKey::to_hex)
    }

    /// The master key as a 24-word BIP-39 mnemonic, if one has been generated.
    pub fn master_key_mnemonic(&self) -> CryptoResult<Option<String>> {
        self.master
            .read()
            .as_ref()
            .map(recovery::master_key_to_mnemonic)
            .transpose()
    }

    /// Replace the session master key with the one encoded in `words`.
    pub fn restore_master_key(&self, words: &str) -> CryptoResult<()> {
        let master = recovery::mnemonic_to_master_key(words)?;
        *self.master.write() = Some(master);
        Ok(())
    }
}
