//! Per-chunk AES-256-GCM encryption/decryption
//!
//! Each chunk carries its own random 96-bit nonce:
//! ```text
//! EncryptedChunk { nonce: [12 bytes], ciphertext: [N bytes][16 bytes: GCM tag] }
//! ```
//!
//! By default no associated data is authenticated, so a chunk verifies under
//! its key and nonce alone. `ChunkBinding::IndexAndFileId` opts into
//! `AAD = chunk_index (8 bytes, big-endian) || file_id (utf8)`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use bytes::Bytes;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{fill_random, FileId, FileKey};
use crate::{NONCE_SIZE, TAG_SIZE};

/// One encrypted chunk: ciphertext with the GCM tag appended, plus its nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedChunk {
    pub ciphertext: Bytes,
    pub nonce: [u8; NONCE_SIZE],
}

impl EncryptedChunk {
    /// Length of the plaintext this chunk decrypts to.
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// What each chunk's tag authenticates besides the ciphertext.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChunkBinding {
    /// Empty AAD.
    #[default]
    Unbound,
    /// A chunk moved to another index or spliced into another file fails
    /// authentication.
    IndexAndFileId,
}

impl ChunkBinding {
    /// Associated data for chunk `chunk_index` of `file_id`.
    pub fn aad(self, chunk_index: u64, file_id: &FileId) -> Vec<u8> {
        match self {
            ChunkBinding::Unbound => Vec::new(),
            ChunkBinding::IndexAndFileId => {
                let id = file_id.as_str().as_bytes();
                let mut aad = Vec::with_capacity(8 + id.len());
                aad.extend_from_slice(&chunk_index.to_be_bytes());
                aad.extend_from_slice(id);
                aad
            }
        }
    }
}

/// Encrypt a single chunk under a fresh random nonce.
///
/// - `file_key`: the per-file encryption key
/// - `plaintext`: at most `CHUNK_SIZE` bytes
/// - `aad`: associated data, empty unless the file is bound (see `ChunkBinding`)
pub fn encrypt_chunk(
    file_key: &FileKey,
    plaintext: &[u8],
    aad: &[u8],
) -> CryptoResult<EncryptedChunk> {
    let cipher = Aes256Gcm::new(file_key.as_bytes().into());

    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut nonce)?;

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::CryptoUnavailable(format!("chunk encryption failed: {e}")))?;

    Ok(EncryptedChunk {
        ciphertext: Bytes::from(ciphertext),
        nonce,
    })
}

/// Decrypt and verify a single chunk.
///
/// `aad` must match the value used at encryption. `chunk_index` only labels
/// the error.
pub fn decrypt_chunk(
    file_key: &FileKey,
    chunk_index: u64,
    chunk: &EncryptedChunk,
    aad: &[u8],
) -> CryptoResult<Vec<u8>> {
    if chunk.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed { chunk_index });
    }

    let cipher = Aes256Gcm::new(file_key.as_bytes().into());

    cipher
        .decrypt(
            Nonce::from_slice(&chunk.nonce),
            Payload {
                msg: &chunk.ciphertext[..],
                aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed { chunk_index })
}
