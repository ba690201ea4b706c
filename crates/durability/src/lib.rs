//! On-disk durability: write-ahead log, snapshots, and startup recovery.
//!
//! - [`wal`]: append-only log of [`wal::WalRecord`]s, one JSON object per line.
//! - [`snapshot`]: full key-space checkpoints with checksum and backup rotation.
//! - [`recovery`]: reconciles the latest snapshot with WAL replay at startup.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod recovery;
pub mod snapshot;
pub mod wal;

pub use recovery::{checkpoint, recover, Recovered};
pub use snapshot::{load_snapshot, write_snapshot, SnapshotData, SnapshotEntry};
pub use wal::{DurabilityMode, Wal, WalRecord};
