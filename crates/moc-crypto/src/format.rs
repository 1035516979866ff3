//! Binary container for `EncryptedFile`
//!
//! Layout (all integers big-endian):
//! ```text
//! [4 bytes: magic "MOC1"][1 byte: version][1 byte: binding]
//! [8 bytes: original_size][4 bytes: chunk count]
//! [2 bytes: file_id length][file_id utf8]
//! per chunk: [12 bytes: nonce][4 bytes: ciphertext length][ciphertext || 16-byte tag]
//! ```
//!
//! `binding` is 0 for chunks sealed without associated data and 1 for
//! chunks bound to `index || file_id` (see `ChunkBinding`).
//!
//! Parsing checks structure only. Authentication happens in `decrypt_file`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::chunk::{ChunkBinding, EncryptedChunk};
use crate::cipher::EncryptedFile;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::FileId;
use crate::{CHUNK_SIZE, NONCE_SIZE, TAG_SIZE};

pub const MAGIC: &[u8; 4] = b"MOC1";
pub const FORMAT_VERSION: u8 = 1;

const HEADER_FIXED: usize = 4 + 1 + 1 + 8 + 4 + 2;
const CHUNK_HEADER: usize = NONCE_SIZE + 4;
const MAX_CIPHERTEXT: usize = CHUNK_SIZE + TAG_SIZE;

fn malformed(msg: impl Into<String>) -> CryptoError {
    CryptoError::MalformedContainer(msg.into())
}

fn binding_code(binding: ChunkBinding) -> u8 {
    match binding {
        ChunkBinding::Unbound => 0,
        ChunkBinding::IndexAndFileId => 1,
    }
}

fn binding_from_code(code: u8) -> CryptoResult<ChunkBinding> {
    match code {
        0 => Ok(ChunkBinding::Unbound),
        1 => Ok(ChunkBinding::IndexAndFileId),
        other => Err(malformed(format!("unknown chunk binding {other}"))),
    }
}

fn ensure(buf: &Bytes, needed: usize, what: &str) -> CryptoResult<()> {
    if buf.remaining() < needed {
        return Err(malformed(format!(
            "truncated {what}: need {needed} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

impl EncryptedFile {
    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_FIXED
            + self.file_id.as_str().len()
            + self
                .chunks
                .iter()
                .map(|c| CHUNK_HEADER + c.ciphertext.len())
                .sum::<usize>()
    }

    /// Encode to the container layout.
    pub fn to_bytes(&self) -> CryptoResult<Bytes> {
        let id = self.file_id.as_str().as_bytes();
        let id_len = u16::try_from(id.len())
            .map_err(|_| malformed(format!("file id too long: {} bytes", id.len())))?;
        let count = u32::try_from(self.chunks.len())
            .map_err(|_| malformed(format!("too many chunks: {}", self.chunks.len())))?;

        let mut out = BytesMut::with_capacity(self.encoded_len());
        out.put_slice(MAGIC);
        out.put_u8(FORMAT_VERSION);
        out.put_u8(binding_code(self.binding));
        out.put_u64(self.original_size);
        out.put_u32(count);
        out.put_u16(id_len);
        out.put_slice(id);

        for (index, chunk) in self.chunks.iter().enumerate() {
            let len = chunk.ciphertext.len();
            if !(TAG_SIZE..=MAX_CIPHERTEXT).contains(&len) {
                return Err(malformed(format!(
                    "chunk {index}: ciphertext length {len} out of range"
                )));
            }
            out.put_slice(&chunk.nonce);
            out.put_u32(len as u32);
            out.put_slice(&chunk.ciphertext);
        }

        Ok(out.freeze())
    }

    /// Decode a container. Chunk ciphertexts borrow from `data` without copying.
    pub fn from_bytes(data: impl Into<Bytes>) -> CryptoResult<Self> {
        let mut buf: Bytes = data.into();

        ensure(&buf, HEADER_FIXED, "header")?;
        let magic = buf.split_to(MAGIC.len());
        if &magic[..] != MAGIC {
            return Err(malformed("bad magic"));
        }
        let version = buf.get_u8();
        if version != FORMAT_VERSION {
            return Err(malformed(format!("unsupported version {version}")));
        }
        let binding = binding_from_code(buf.get_u8())?;
        let original_size = buf.get_u64();
        let count = buf.get_u32() as usize;
        let id_len = usize::from(buf.get_u16());

        ensure(&buf, id_len, "file id")?;
        let id = buf.split_to(id_len);
        let file_id = std::str::from_utf8(&id)
            .map_err(|_| malformed("file id is not utf8"))?
            .to_string();

        // never trust `count` for the allocation size
        let plausible = buf.remaining() / (CHUNK_HEADER + TAG_SIZE);
        let mut chunks = Vec::with_capacity(count.min(plausible));
        for index in 0..count {
            ensure(&buf, CHUNK_HEADER, "chunk header")?;
            let mut nonce = [0u8; NONCE_SIZE];
            buf.copy_to_slice(&mut nonce);
            let len = buf.get_u32() as usize;
            if !(TAG_SIZE..=MAX_CIPHERTEXT).contains(&len) {
                return Err(malformed(format!(
                    "chunk {index}: ciphertext length {len} out of range"
                )));
            }
            ensure(&buf, len, "chunk body")?;
            chunks.push(EncryptedChunk {
                ciphertext: buf.split_to(len),
                nonce,
            });
        }

        if buf.has_remaining() {
            return Err(malformed(format!("{} trailing bytes", buf.remaining())));
        }

        Ok(EncryptedFile {
            file_id: FileId::new(file_id),
            chunks,
            original_size,
            binding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedFile {
        EncryptedFile {
            file_id: FileId::new("file_1760870400000_a1b2c3d4e"),
            chunks: vec![
                EncryptedChunk {
                    ciphertext: Bytes::from(vec![0x11u8; CHUNK_SIZE + TAG_SIZE]),
                    nonce: [1u8; NONCE_SIZE],
                },
                EncryptedChunk {
                    ciphertext: Bytes::from(vec![0x22u8; 4464 + TAG_SIZE]),
                    nonce: [2u8; NONCE_SIZE],
                },
            ],
            original_size: 70_000,
            binding: ChunkBinding::Unbound,
        }
    }

    #[test]
    fn test_encode_decode() {
        let file = sample();
        let encoded = file.to_bytes().unwrap();
        assert_eq!(encoded.len(), file.encoded_len());
        assert_eq!(&encoded[..4], MAGIC);

        let decoded = EncryptedFile::from_bytes(encoded).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn test_empty_file() {
        let file = EncryptedFile {
            file_id: FileId::new("file_0_000000000"),
            chunks: vec![],
            original_size: 0,
            binding: ChunkBinding::Unbound,
        };
        let encoded = file.to_bytes().unwrap();
        assert_eq!(encoded.len(), HEADER_FIXED + 16);
        assert_eq!(EncryptedFile::from_bytes(encoded).unwrap(), file);
    }

    #[test]
    fn test_bad_magic() {
        let mut raw = sample().to_bytes().unwrap().to_vec();
        raw[0] = b'X';
        let err = EncryptedFile::from_bytes(raw).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedContainer(_)));
    }

    #[test]
    fn test_unknown_version() {
        let mut raw = sample().to_bytes().unwrap().to_vec();
        raw[4] = 9;
        let err = EncryptedFile::from_bytes(raw).unwrap_err();
        assert!(err.to_string().contains("unsupported version 9"));
    }

    #[test]
    fn test_binding_preserved() {
        let mut file = sample();
        file.binding = ChunkBinding::IndexAndFileId;
        let encoded = file.to_bytes().unwrap();
        assert_eq!(encoded[5], 1);
        assert_eq!(EncryptedFile::from_bytes(encoded).unwrap(), file);

        let unbound = sample().to_bytes().unwrap();
        assert_eq!(unbound[5], 0);
    }

    #[test]
    fn test_unknown_binding() {
        let mut raw = sample().to_bytes().unwrap().to_vec();
        raw[5] = 7;
        let err = EncryptedFile::from_bytes(raw).unwrap_err();
        assert!(err.to_string().contains("unknown chunk binding 7"));
    }

    #[test]
    fn test_truncated_everywhere() {
        let raw = sample().to_bytes().unwrap();
        for cut in [0, 3, HEADER_FIXED - 1, HEADER_FIXED + 5, raw.len() - 1] {
            let result = EncryptedFile::from_bytes(raw.slice(..cut));
            assert!(
                matches!(result, Err(CryptoError::MalformedContainer(_))),
                "cut at {cut} must be rejected"
            );
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut raw = sample().to_bytes().unwrap().to_vec();
        raw.push(0);
        let err = EncryptedFile::from_bytes(raw).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_ciphertext_length_out_of_range() {
        let mut file = sample();
        file.chunks[1].ciphertext = Bytes::from_static(b"short");
        assert!(file.to_bytes().is_err());

        // hand-patch a valid encoding to claim an oversized chunk
        let mut raw = sample().to_bytes().unwrap().to_vec();
        let len_at = HEADER_FIXED + sample().file_id.as_str().len() + NONCE_SIZE;
        raw[len_at..len_at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        let err = EncryptedFile::from_bytes(raw).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_huge_count_does_not_allocate() {
        let mut raw = Vec::new();
        raw.extend_from_slice(MAGIC);
        raw.push(FORMAT_VERSION);
        raw.push(0);
        raw.extend_from_slice(&0u64.to_be_bytes());
        raw.extend_from_slice(&u32::MAX.to_be_bytes());
        raw.extend_from_slice(&0u16.to_be_bytes());

        let result = EncryptedFile::from_bytes(raw);
        assert!(matches!(result, Err(CryptoError::MalformedContainer(_))));
    }

    #[test]
    fn test_non_utf8_file_id() {
        let mut raw = Vec::new();
        raw.extend_from_slice(MAGIC);
        raw.push(FORMAT_VERSION);
        raw.push(0);
        raw.extend_from_slice(&0u64.to_be_bytes());
        raw.extend_from_slice(&0u32.to_be_bytes());
        raw.extend_from_slice(&2u16.to_be_bytes());
        raw.extend_from_slice(&[0xFF, 0xFE]);

        let err = EncryptedFile::from_bytes(raw).unwrap_err();
        assert!(err.to_string().contains("utf8"));
    }
}
