use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MocError, MocResult};

/// Top-level configuration (loaded from moc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MocConfig {
    pub log: LogConfig,
    pub crypto: CryptoConfig,
    pub keys: KeysConfig,
}

impl MocConfig {
    /// Parse a TOML document. Missing sections and fields take their defaults.
    pub fn parse(toml_str: &str) -> MocResult<Self> {
        toml::from_str(toml_str).map_err(|e| MocError::Config(e.to_string()))
    }

    /// Render the config back to TOML (used by `moc config show`).
    pub fn to_toml(&self) -> MocResult<String> {
        toml::to_string_pretty(self).map_err(|e| MocError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Chunk encryption settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Maximum chunks encrypted/decrypted concurrently (0 = available cores)
    pub parallelism: usize,
    /// Authenticate each chunk's index and FileId as associated data
    pub bind_chunks: bool,
}

impl CryptoConfig {
    /// Resolve `parallelism = 0` to the number of available cores.
    pub fn effective_parallelism(&self) -> usize {
        if self.parallelism > 0 {
            return self.parallelism;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Directory where `moc keygen` writes file keys when no explicit path is given
    pub key_dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("~/.local/share/moc/keys"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[log]
level = "debug"
format = "json"

[crypto]
parallelism = 8
bind_chunks = true

[keys]
key_dir = "/var/lib/moc/keys"
"#;
        let config = MocConfig::parse(toml_str).unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
        assert_eq!(config.crypto.parallelism, 8);
        assert_eq!(config.crypto.effective_parallelism(), 8);
        assert!(config.crypto.bind_chunks);
        assert_eq!(config.keys.key_dir, PathBuf::from("/var/lib/moc/keys"));
    }

    #[test]
    fn test_parse_defaults() {
        let config = MocConfig::parse("").unwrap();

        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
        assert_eq!(config.crypto.parallelism, 0);
        assert!(!config.crypto.bind_chunks);
        assert!(config.crypto.effective_parallelism() >= 1);
        assert_eq!(config.keys.key_dir, PathBuf::from("~/.local/share/moc/keys"));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = MocConfig::parse("[crypto]\nparallelism = 2\n").unwrap();

        assert_eq!(config.crypto.parallelism, 2);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = MocConfig::parse("[crypto]\nparallelism = \"many\"\n");
        assert!(matches!(result, Err(MocError::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = MocConfig::default();
        config.crypto.parallelism = 3;

        let rendered = config.to_toml().unwrap();
        let back = MocConfig::parse(&rendered).unwrap();

        assert_eq!(back.crypto.parallelism, 3);
        assert_eq!(back.log.format, "text");
    }
}
