//! Startup recovery: load the latest snapshot, then replay the WAL on top.
//!
//! This is the only place WAL records and snapshot entries are reconciled.
//! Recovery order is: load snapshot (or start empty), open the WAL, replay
//! every record onto the snapshot's entries in file order. The WAL only
//! ever contains writes that happened *after* the last checkpoint, since
//! [`checkpoint`] truncates it once a new snapshot is durable.

use crate::snapshot::{load_snapshot, write_snapshot, SnapshotData, SnapshotEntry};
use crate::wal::{DurabilityMode, Wal, WalRecord};
use emberstore_core::Result;
use std::collections::HashMap;
use std::path::Path;

/// The reconstructed key space and the WAL handle ready for further appends.
pub struct Recovered {
    /// Every live key and its entry after replay.
    pub entries: HashMap<String, SnapshotEntry>,
    /// The open WAL, positioned at end-of-file for new appends.
    pub wal: Wal,
}

/// Load the snapshot at `snapshot_path` (if any) and replay `wal_path` on
/// top of it, opening the WAL for further writes.
pub fn recover(snapshot_path: &Path, wal_path: &Path, backup_retention: usize, mode: DurabilityMode) -> Result<Recovered> {
    let snapshot = load_snapshot(snapshot_path, backup_retention)?.unwrap_or_default();
    let mut entries = snapshot.entries;

    let wal = Wal::open(wal_path, mode)?;
    for record in wal.read_all()? {
        apply(&mut entries, record);
    }

    Ok(Recovered { entries, wal })
}

fn apply(entries: &mut HashMap<String, SnapshotEntry>, record: WalRecord) {
    match record {
        WalRecord::Put { k, v, exp } => {
            entries.insert(k, SnapshotEntry { value: v, expires_at: exp });
        }
        WalRecord::Del { k } => {
            entries.remove(&k);
        }
        WalRecord::Clr => entries.clear(),
        WalRecord::Ttl { k, exp } => {
            if let Some(entry) = entries.get_mut(&k) {
                entry.expires_at = exp;
            }
        }
    }
}

/// Persist the current key space as a new snapshot and truncate the WAL,
/// since everything in it is now captured by the snapshot. Called by the
/// background compaction thread on `saveInterval`, and on graceful close.
pub fn checkpoint(
    snapshot_path: &Path,
    backup_retention: usize,
    wal: &mut Wal,
    entries: &HashMap<String, SnapshotEntry>,
) -> Result<()> {
    let data = SnapshotData { entries: entries.clone() };
    write_snapshot(snapshot_path, &data, backup_retention)?;
    wal.truncate()
}
