//! Full-state snapshots: atomic write, backup rotation, checksum pre-check.
//!
//! A snapshot is the entire key space serialised as one JSON document. It
//! exists so recovery doesn't have to replay an unbounded WAL from empty;
//! the WAL only needs to cover writes since the last snapshot.
//!
//! ## On-disk layout
//!
//! `snapshot.json` holds an 8-hex-digit CRC32 of the JSON payload on its
//! first line, followed by the payload itself. The checksum is a
//! pre-check, not the sole arbiter of validity: a file that passes the
//! checksum but fails to parse as JSON (or vice versa, in principle) is
//! still treated as corrupt and recovery falls back to the newest backup
//! that parses.
//!
//! Writes are atomic: the new snapshot is written to `snapshot.json.tmp`
//! and renamed into place, so a crash mid-write never leaves a half-written
//! `snapshot.json`. Before the rename, up to `backup_retention` prior
//! snapshots are kept as `snapshot.json.bak.1` (newest) through
//! `snapshot.json.bak.N`.

use emberstore_core::{EmberError, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One stored document as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The document value.
    pub value: Value,
    /// Unix millis expiry, if the key carries a TTL.
    pub expires_at: Option<i64>,
}

/// The full key space at the moment the snapshot was taken.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Every live key and its entry.
    pub entries: HashMap<String, SnapshotEntry>,
}

fn backup_path(base: &Path, n: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".bak.{n}"));
    PathBuf::from(name)
}

fn tmp_path(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `data` to `path` atomically, rotating up to `backup_retention`
/// prior snapshots out of the way first.
pub fn write_snapshot(path: &Path, data: &SnapshotData, backup_retention: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    if path.exists() && backup_retention > 0 {
        rotate_backups(path, backup_retention)?;
    }

    let payload = serde_json::to_vec(data)?;
    let checksum = crc32fast::hash(&payload);

    let tmp = tmp_path(path);
    let mut contents = format!("{checksum:08x}\n").into_bytes();
    contents.extend_from_slice(&payload);
    fs::write(&tmp, &contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn rotate_backups(path: &Path, retention: usize) -> Result<()> {
    // Drop the oldest backup, then shift every remaining one up by one slot.
    let oldest = backup_path(path, retention);
    let _ = fs::remove_file(&oldest);
    for n in (1..retention).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            fs::rename(&from, backup_path(path, n + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))?;
    Ok(())
}

/// Read and validate a single snapshot file: checksum, then parse.
fn read_one(path: &Path) -> Result<SnapshotData> {
    let contents = fs::read(path)?;
    let newline = contents
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| EmberError::corruption("snapshot missing checksum header"))?;
    let (header, rest) = contents.split_at(newline);
    let payload = &rest[1..];

    let header_str = std::str::from_utf8(header)
        .map_err(|_| EmberError::corruption("snapshot checksum header is not valid utf-8"))?;
    let expected = u32::from_str_radix(header_str.trim(), 16)
        .map_err(|_| EmberError::corruption("snapshot checksum header is not valid hex"))?;
    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(EmberError::corruption("snapshot checksum mismatch"));
    }

    serde_json::from_slice(payload).map_err(EmberError::from)
}

/// Load the newest valid snapshot at `path`, falling back through
/// `.bak.1`, `.bak.2`, ... if the primary file is missing or corrupt.
/// Returns `Ok(None)` only if no snapshot (primary or backup) exists yet.
pub fn load_snapshot(path: &Path, backup_retention: usize) -> Result<Option<SnapshotData>> {
    if path.exists() {
        match read_one(path) {
            Ok(data) => return Ok(Some(data)),
            Err(e) => tracing::warn!(error = %e, path = %path.display(), "primary snapshot unreadable, falling back to backups"),
        }
    }
    for n in 1..=backup_retention {
        let candidate = backup_path(path, n);
        if !candidate.exists() {
            continue;
        }
        match read_one(&candidate) {
            Ok(data) => {
                tracing::warn!(path = %candidate.display(), "recovered from backup snapshot");
                return Ok(Some(data));
            }
            Err(e) => tracing::warn!(error = %e, path = %candidate.display(), "backup snapshot unreadable"),
        }
    }
    Ok(None)
}
