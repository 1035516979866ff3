use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// No secure random source or AEAD primitive. Fatal, never retried.
    #[error("crypto unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("invalid key: expected 32 bytes, got {len}")]
    InvalidKey { len: usize },

    #[error("authentication failed on chunk {chunk_index}: wrong key or corrupted data")]
    AuthenticationFailed { chunk_index: u64 },

    #[error("size mismatch: expected {expected} bytes, decrypted {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("invalid recovery mnemonic: {0}")]
    InvalidMnemonic(String),
}
