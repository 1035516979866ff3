//! File-level encryption: split into fixed-size chunks, encrypt each one
//! independently, reassemble by index.
//!
//! Chunk work runs on the blocking pool with at most `parallelism` tasks in
//! flight. Completion order is irrelevant: every result lands in the slot of
//! its original index.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::chunk::{decrypt_chunk, encrypt_chunk, ChunkBinding, EncryptedChunk};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{FileId, FileKey};
use crate::CHUNK_SIZE;

/// An encrypted file: ordered chunks plus the plaintext length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedFile {
    pub file_id: FileId,
    pub chunks: Vec<EncryptedChunk>,
    pub original_size: u64,
    /// Associated data the chunk tags were computed over.
    pub binding: ChunkBinding,
}

/// Number of chunks a payload of `len` bytes splits into.
pub fn chunk_count(len: u64) -> u64 {
    len.div_ceil(CHUNK_SIZE as u64)
}

/// Split `data` into consecutive `CHUNK_SIZE` slices sharing its buffer.
///
/// Empty input yields no chunks; only the last chunk may be short.
pub fn split_chunks(data: &Bytes) -> Vec<Bytes> {
    (0..data.len())
        .step_by(CHUNK_SIZE)
        .map(|start| data.slice(start..data.len().min(start + CHUNK_SIZE)))
        .collect()
}

/// Chunked AES-256-GCM file cipher with bounded concurrency.
#[derive(Debug, Clone)]
pub struct ChunkCipher {
    parallelism: usize,
    binding: ChunkBinding,
}

impl Default for ChunkCipher {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cores)
    }
}

impl ChunkCipher {
    /// `parallelism` is clamped to at least 1. Chunks are unbound.
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
            binding: ChunkBinding::Unbound,
        }
    }

    /// Use `binding` for files encrypted by this cipher. Decryption always
    /// follows the binding recorded in the `EncryptedFile`.
    pub fn with_binding(mut self, binding: ChunkBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn binding(&self) -> ChunkBinding {
        self.binding
    }

    /// Encrypt `raw` under `key`, recording a freshly generated FileId.
    ///
    /// Fails with `InvalidKey` unless `key` is exactly 32 bytes, and with
    /// `CryptoUnavailable` if the random source or AEAD primitive fails.
    pub async fn encrypt_file(&self, raw: Bytes, key: &[u8]) -> CryptoResult<EncryptedFile> {
        let file_key = FileKey::from_slice(key)?;
        let file_id = FileId::generate()?;
        self.encrypt_with(raw, file_id, file_key).await
    }

    /// Like `encrypt_file`, but records `file_id`, typically the id
    /// `KeyManager::generate_file_key` issued together with `key`.
    pub async fn encrypt_file_as(
        &self,
        raw: Bytes,
        file_id: FileId,
        key: &[u8],
    ) -> CryptoResult<EncryptedFile> {
        let file_key = FileKey::from_slice(key)?;
        self.encrypt_with(raw, file_id, file_key).await
    }

    async fn encrypt_with(
        &self,
        raw: Bytes,
        file_id: FileId,
        file_key: FileKey,
    ) -> CryptoResult<EncryptedFile> {
        let file_key = Arc::new(file_key);
        let original_size = raw.len() as u64;
        let chunks = split_chunks(&raw);
        drop(raw);

        let binding = self.binding;
        let id = Arc::new(file_id.clone());
        let encrypted = self
            .run_ordered(chunks, move |index, plaintext: Bytes| {
                encrypt_chunk(&file_key, &plaintext, &binding.aad(index, &id))
            })
            .await?;

        debug!(
            file_id = %file_id,
            chunks = encrypted.len(),
            bytes = original_size,
            ?binding,
            "encrypted file"
        );

        Ok(EncryptedFile {
            file_id,
            chunks: encrypted,
            original_size,
            binding,
        })
    }

    /// Decrypt and verify every chunk of `file`, returning the original bytes.
    ///
    /// Any chunk failing authentication aborts the whole call with
    /// `AuthenticationFailed`; no plaintext is returned. The reassembled
    /// length must equal `original_size`, else `SizeMismatch`.
    pub async fn decrypt_file(&self, file: &EncryptedFile, key: &[u8]) -> CryptoResult<Vec<u8>> {
        let file_key = Arc::new(FileKey::from_slice(key)?);
        let binding = file.binding;
        let id = Arc::new(file.file_id.clone());

        let plaintexts = self
            .run_ordered(file.chunks.clone(), move |index, chunk: EncryptedChunk| {
                decrypt_chunk(&file_key, index, &chunk, &binding.aad(index, &id))
            })
            .await
            .inspect_err(|e| {
                if let CryptoError::AuthenticationFailed { chunk_index } = e {
                    warn!(file_id = %file.file_id, chunk_index, "chunk authentication failed");
                }
            })?;

        let actual: u64 = plaintexts.iter().map(|p| p.len() as u64).sum();
        if actual != file.original_size {
            return Err(CryptoError::SizeMismatch {
                expected: file.original_size,
                actual,
            });
        }

        let mut out = Vec::with_capacity(plaintexts.iter().map(Vec::len).sum());
        for plaintext in plaintexts {
            out.extend_from_slice(&plaintext);
        }

        debug!(
            file_id = %file.file_id,
            chunks = file.chunks.len(),
            bytes = actual,
            "decrypted file"
        );
        Ok(out)
    }

    /// Run `work(index, input)` for every input on the blocking pool and
    /// return the outputs in input order. The first error wins; dropping the
    /// `JoinSet` aborts whatever has not started yet.
    async fn run_ordered<I, T, F>(&self, inputs: Vec<I>, work: F) -> CryptoResult<Vec<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(u64, I) -> CryptoResult<T> + Send + Sync + 'static,
    {
        let total = inputs.len();
        let work = Arc::new(work);
        let mut slots: Vec<Option<T>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        let mut pending = inputs.into_iter().enumerate();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < self.parallelism {
                let Some((index, input)) = pending.next() else {
                    break;
                };
                let work = Arc::clone(&work);
                tasks.spawn_blocking(move || (index, work(index as u64, input)));
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (index, result) = joined
                .map_err(|e| CryptoError::CryptoUnavailable(format!("chunk task failed: {e}")))?;
            slots[index] = Some(result?);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    CryptoError::CryptoUnavailable(format!("chunk {index} produced no result"))
                })
            })
            .collect()
    }
}

/// Encrypt with the default `ChunkCipher` (one task per available core).
pub async fn encrypt_file(raw: Bytes, key: &[u8]) -> CryptoResult<EncryptedFile> {
    ChunkCipher::default().encrypt_file(raw, key).await
}

/// Decrypt with the default `ChunkCipher`.
pub async fn decrypt_file(file: &EncryptedFile, key: &[u8]) -> CryptoResult<Vec<u8>> {
    ChunkCipher::default().decrypt_file(file, key).await
}
