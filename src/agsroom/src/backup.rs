//! Timestamped backup copies with integrity metadata.
//!
//! Before a patch write, the source room is copied to a `.bak` sibling and
//! a JSON sidecar records when the copy was made and what it hashed to, so
//! a later restore can be checked against what was actually backed up.

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sidecar metadata written next to each backup copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// When the backup was created (RFC3339)
    pub timestamp: String,

    /// Size of the backed-up file in bytes
    pub file_size: u64,

    /// SHA-256 hash of the backed-up file
    pub sha256: String,
}

/// Compute the SHA-256 hash of a byte buffer.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Sidecar path for a given backup file.
pub fn metadata_path(backup_path: &Path) -> PathBuf {
    backup_path.with_extension("bak.json")
}

/// Copy `path` to a timestamped `.bak` sibling and write its sidecar.
/// Returns the backup path.
pub fn create_backup(path: &Path) -> Result<PathBuf, BackupError> {
    let data = fs::read(path)?;
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => format!("{}.{}.bak", name, stamp),
        None => format!("room.{}.bak", stamp),
    };
    let backup_path = path.with_file_name(file_name);
    fs::write(&backup_path, &data)?;

    let metadata = BackupMetadata {
        timestamp: Utc::now().to_rfc3339(),
        file_size: data.len() as u64,
        sha256: hash_bytes(&data),
    };
    fs::write(
        metadata_path(&backup_path),
        serde_json::to_string_pretty(&metadata)?,
    )?;
    Ok(backup_path)
}

/// Check a backup copy against its sidecar. `Ok(false)` means the copy no
/// longer matches what was recorded at backup time.
pub fn verify_backup(backup_path: &Path) -> Result<bool, BackupError> {
    let metadata: BackupMetadata =
        serde_json::from_str(&fs::read_to_string(metadata_path(backup_path))?)?;
    let data = fs::read(backup_path)?;
    Ok(data.len() as u64 == metadata.file_size && hash_bytes(&data) == metadata.sha256)
}
