//! On-disk file key: the FileId and its hex-encoded key, as TOML.
//!
//! ```toml
//! file_id = "file_1760870400123_k3x9q0z2a"
//! key = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! ```

use std::path::Path;

use moc_core::{MocError, MocResult};
use moc_crypto::{FileId, FileKey};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct KeyFileRepr {
    file_id: String,
    key: String,
}

/// A file key together with the FileId it was issued for.
#[derive(Debug)]
pub struct KeyFile {
    pub file_id: FileId,
    pub key: FileKey,
}

impl KeyFile {
    pub fn new(file_id: FileId, key: FileKey) -> Self {
        Self { file_id, key }
    }

    pub fn parse(content: &str) -> MocResult<Self> {
        let repr: KeyFileRepr =
            toml::from_str(content).map_err(|e| MocError::KeyFile(e.to_string()))?;
        let key = FileKey::from_hex(&repr.key).map_err(|e| MocError::KeyFile(e.to_string()))?;
        Ok(Self {
            file_id: FileId::new(repr.file_id),
            key,
        })
    }

    pub fn render(&self) -> MocResult<String> {
        let repr = KeyFileRepr {
            file_id: self.file_id.to_string(),
            key: self.key.to_hex(),
        };
        toml::to_string(&repr).map_err(|e| MocError::KeyFile(e.to_string()))
    }

    pub async fn load(path: &Path) -> MocResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Create the key file, owner-readable only on unix. An existing file is
    /// never overwritten.
    pub async fn save(&self, path: &Path) -> MocResult<()> {
        use tokio::io::AsyncWriteExt;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = self.render()?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                MocError::KeyFile(format!("{} already exists", path.display()))
            }
            _ => MocError::Io(e),
        })?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_parse() {
        let original = KeyFile::new(
            FileId::new("file_1760870400123_k3x9q0z2a"),
            FileKey::from_bytes([0x3Cu8; 32]),
        );
        let parsed = KeyFile::parse(&original.render().unwrap()).unwrap();

        assert_eq!(parsed.file_id, original.file_id);
        assert_eq!(parsed.key.as_bytes(), original.key.as_bytes());
    }

    #[test]
    fn test_short_key_rejected() {
        let result = KeyFile::parse("file_id = \"file_1_a\"\nkey = \"abcd\"\n");
        assert!(matches!(result, Err(MocError::KeyFile(_))));
    }

    #[test]
    fn test_missing_field_rejected() {
        let result = KeyFile::parse("file_id = \"file_1_a\"\n");
        assert!(matches!(result, Err(MocError::KeyFile(_))));
    }

    #[tokio::test]
    async fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/photo.key");
        let original = KeyFile::new(FileId::new("file_9_zzzzzzzzz"), FileKey::from_bytes([1u8; 32]));

        original.save(&path).await.unwrap();
        let loaded = KeyFile::load(&path).await.unwrap();
        assert_eq!(loaded.file_id, original.file_id);
        assert_eq!(loaded.key.as_bytes(), original.key.as_bytes());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_save_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.key");
        let first = KeyFile::new(FileId::new("file_1_aaaaaaaaa"), FileKey::from_bytes([1u8; 32]));
        let second = KeyFile::new(FileId::new("file_2_bbbbbbbbb"), FileKey::from_bytes([2u8; 32]));

        first.save(&path).await.unwrap();
        let err = second.save(&path).await.unwrap_err();
        assert!(matches!(err, MocError::KeyFile(ref msg) if msg.contains("already exists")));

        let kept = KeyFile::load(&path).await.unwrap();
        assert_eq!(kept.file_id, first.file_id);
        assert_eq!(kept.key.as_bytes(), first.key.as_bytes());
    }
}
