//! moc: client-side photo encryption CLI
//!
//! Commands:
//!   keygen [--out <key file>]              - new master key (hex + mnemonic) and a file key
//!   encrypt <input> <output> --key <file>  - chunk and encrypt a file into a container
//!   decrypt <input> <output> --key <file>  - verify and decrypt a container
//!   inspect <container>                    - show container metadata
//!   recover                                - master key hex from a recovery mnemonic
//!   config show                            - display current configuration

mod commands;
mod keyfile;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use moc_core::MocConfig;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "moc",
    version,
    about = "Client-side photo encryption",
    long_about = "moc: generate keys and encrypt/decrypt photos in 64 KiB AES-256-GCM chunks"
)]
struct Cli {
    /// Path to moc.toml configuration file
    #[arg(long, short = 'c', env = "MOC_CONFIG", default_value = "~/.config/moc/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "MOC_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "MOC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a master key and a file key
    Keygen {
        /// Where to write the file key (default: <key_dir>/<file_id>.key)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Encrypt a file into a chunked container
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Container to write
        output: PathBuf,
        /// Key file produced by `moc keygen`
        #[arg(long, short = 'k', env = "MOC_KEY_FILE")]
        key: PathBuf,
    },

    /// Decrypt a container back to the original file
    Decrypt {
        /// Container to read
        input: PathBuf,
        /// Where to write the plaintext
        output: PathBuf,
        /// Key file produced by `moc keygen`
        #[arg(long, short = 'k', env = "MOC_KEY_FILE")]
        key: PathBuf,
    },

    /// Show container metadata without decrypting
    Inspect {
        /// Container to read
        container: PathBuf,
    },

    /// Print the master key encoded by a 24-word recovery mnemonic
    Recover {
        /// The mnemonic words (quoted)
        #[arg(long, env = "MOC_MNEMONIC")]
        mnemonic: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let (config, found) = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    if !found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }

    match cli.command {
        Commands::Keygen { out } => commands::keygen(&config, out.as_deref()).await,
        Commands::Encrypt { input, output, key } => {
            commands::encrypt(&config, &input, &output, &key).await
        }
        Commands::Decrypt { input, output, key } => {
            commands::decrypt(&config, &input, &output, &key).await
        }
        Commands::Inspect { container } => commands::inspect(&container).await,
        Commands::Recover { mnemonic } => commands::recover(&mnemonic),
        Commands::Config { action: ConfigAction::Show } => {
            commands::config_show(&config, &config_path)
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<(MocConfig, bool)> {
    if !path.exists() {
        return Ok((MocConfig::default(), false));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config: {}", path.display()))?;
    let config =
        MocConfig::parse(&content).with_context(|| format!("parsing config: {}", path.display()))?;
    Ok((config, true))
}

/// Expand `~` in path to the user's home directory
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // logs go to stderr so stdout stays clean for key material and reports
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
