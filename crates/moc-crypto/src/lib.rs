//! moc-crypto: client-side encryption for photo uploads
//!
//! Architecture: fixed-size chunking, then per-chunk AES-256-GCM
//!
//! Pipeline: raw bytes → 64 KiB chunks → encrypt each chunk (fresh nonce) → EncryptedFile → container
//!
//! Keys:
//! ```text
//! Master Key (256-bit random, display/recovery only: hex or BIP-39 mnemonic)
//! File Key   (per-file, 256-bit random, tracked by KeyManager under a FileId)
//!   └── Chunk AEAD: AES-256-GCM (key=file_key, nonce=random_96bit, AAD=empty)
//!       optional binding: AAD=chunk_idx||file_id (`ChunkBinding::IndexAndFileId`)
//! ```

pub mod chunk;
pub mod cipher;
pub mod error;
pub mod format;
pub mod keys;
pub mod recovery;

pub use chunk::{decrypt_chunk, encrypt_chunk, ChunkBinding, EncryptedChunk};
pub use cipher::{chunk_count, decrypt_file, encrypt_file, split_chunks, ChunkCipher, EncryptedFile};
pub use error::{CryptoError, CryptoResult};
pub use keys::{FileId, FileKey, KeyManager, MasterKey};
pub use recovery::{master_key_to_mnemonic, mnemonic_to_master_key};

/// Size of master and file keys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Maximum plaintext bytes per chunk
pub const CHUNK_SIZE: usize = 64 * 1024;
