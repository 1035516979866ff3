//! Subcommand implementations

use anyhow::{Context, Result};
use bytes::Bytes;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use moc_core::MocConfig;
use moc_crypto::{chunk_count, ChunkBinding, ChunkCipher, EncryptedFile, KeyManager};

use crate::expand_tilde;
use crate::keyfile::KeyFile;

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn fmt_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn cipher_for(config: &MocConfig) -> ChunkCipher {
    let binding = if config.crypto.bind_chunks {
        ChunkBinding::IndexAndFileId
    } else {
        ChunkBinding::Unbound
    };
    ChunkCipher::new(config.crypto.effective_parallelism()).with_binding(binding)
}

// ── `moc keygen` ──────────────────────────────────────────────────────────────

pub async fn keygen(config: &MocConfig, out: Option<&Path>) -> Result<()> {
    let manager = KeyManager::new();

    let master_hex = manager
        .generate_master_key()
        .context("generating master key")?;
    let mnemonic = manager
        .master_key_mnemonic()
        .context("encoding recovery mnemonic")?
        .unwrap_or_default();

    let (file_id, key) = manager.generate_file_key().context("generating file key")?;
    let path = key_file_path(config, out, file_id.as_str());
    KeyFile::new(file_id.clone(), key)
        .save(&path)
        .await
        .with_context(|| format!("writing key file: {}", path.display()))?;

    info!(file_id = %file_id, path = %path.display(), "file key written");

    println!("Master key (store offline, never share):");
    println!("  hex:      {master_hex}");
    println!("  mnemonic: {mnemonic}");
    println!();
    println!("File key:");
    println!("  file id:  {file_id}");
    println!("  key file: {}", path.display());
    Ok(())
}

fn key_file_path(config: &MocConfig, out: Option<&Path>, file_id: &str) -> PathBuf {
    match out {
        Some(p) => p.to_path_buf(),
        None => expand_tilde(&config.keys.key_dir).join(format!("{file_id}.key")),
    }
}

// ── `moc encrypt` ─────────────────────────────────────────────────────────────

pub async fn encrypt(
    config: &MocConfig,
    input: &Path,
    output: &Path,
    key_path: &Path,
) -> Result<()> {
    let key_file = KeyFile::load(key_path)
        .await
        .with_context(|| format!("loading key file: {}", key_path.display()))?;

    let raw = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let size = raw.len() as u64;

    let pb = make_spinner("encrypt");
    pb.set_message(format!("{} ({} chunks)", input.display(), chunk_count(size)));

    let encrypted = cipher_for(config)
        .encrypt_file_as(Bytes::from(raw), key_file.file_id.clone(), key_file.key.as_bytes())
        .await
        .with_context(|| format!("encrypting {}", input.display()))?;
    let container = encrypted.to_bytes().context("encoding container")?;

    tokio::fs::write(output, &container)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    pb.finish_with_message("done".to_string());

    println!("  file id: {}", encrypted.file_id);
    println!("  chunks:  {}", encrypted.chunks.len());
    println!("  bytes:   {} → {}", fmt_bytes(size), fmt_bytes(container.len() as u64));
    println!("  output:  {}", output.display());
    Ok(())
}

// ── `moc decrypt` ─────────────────────────────────────────────────────────────

pub async fn decrypt(
    config: &MocConfig,
    input: &Path,
    output: &Path,
    key_path: &Path,
) -> Result<()> {
    let key_file = KeyFile::load(key_path)
        .await
        .with_context(|| format!("loading key file: {}", key_path.display()))?;
    let encrypted = read_container(input).await?;

    if encrypted.file_id != key_file.file_id {
        anyhow::bail!(
            "key file is for {}, but {} holds {}",
            key_file.file_id,
            input.display(),
            encrypted.file_id
        );
    }

    let pb = make_spinner("decrypt");
    pb.set_message(format!("{} ({} chunks)", input.display(), encrypted.chunks.len()));

    let plaintext = cipher_for(config)
        .decrypt_file(&encrypted, key_file.key.as_bytes())
        .await;
    let plaintext = match plaintext {
        Ok(p) => p,
        Err(e) => {
            pb.abandon_with_message("failed".to_string());
            return Err(e).with_context(|| format!("decrypting {}", input.display()));
        }
    };

    tokio::fs::write(output, &plaintext)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    pb.finish_with_message("done".to_string());

    println!("  bytes:  {}", fmt_bytes(plaintext.len() as u64));
    println!("  output: {}", output.display());
    Ok(())
}

async fn read_container(path: &Path) -> Result<EncryptedFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    EncryptedFile::from_bytes(data).with_context(|| format!("parsing container {}", path.display()))
}

// ── `moc inspect` ─────────────────────────────────────────────────────────────

pub async fn inspect(container: &Path) -> Result<()> {
    let file = read_container(container).await?;
    print!("{}", describe(&file));
    Ok(())
}

fn describe(file: &EncryptedFile) -> String {
    let mut out = format!(
        "file id:       {}\noriginal size: {} ({})\nbinding:       {:?}\nchunks:        {}\n",
        file.file_id,
        file.original_size,
        fmt_bytes(file.original_size),
        file.binding,
        file.chunks.len()
    );
    for (index, chunk) in file.chunks.iter().enumerate() {
        out.push_str(&format!(
            "  [{index:>4}] plaintext {:>6} B  ciphertext {:>6} B\n",
            chunk.plaintext_len(),
            chunk.ciphertext.len()
        ));
    }
    out
}

// ── `moc recover` ─────────────────────────────────────────────────────────────

pub fn recover(mnemonic: &str) -> Result<()> {
    let manager = KeyManager::new();
    manager
        .restore_master_key(mnemonic)
        .context("restoring master key")?;
    println!("{}", manager.master_key_hex().unwrap_or_default());
    Ok(())
}

// ── `moc config show` ─────────────────────────────────────────────────────────

pub fn config_show(config: &MocConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    print!("{}", config.to_toml().context("rendering config")?);
    Ok(())
}
