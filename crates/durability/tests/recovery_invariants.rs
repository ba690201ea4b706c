//! Recovery invariant tests.
//!
//! These validate the invariants `recover`/`checkpoint` are required to
//! uphold:
//!
//! - I1: recovery is deterministic — the same snapshot + WAL always
//!   reconstructs the same key space, however many times it's replayed.
//! - I2: recovery never invents data — every key in the recovered state
//!   traces back to a record that was actually appended.
//! - I3: recovery never drops a durable write — anything fsynced before
//!   the process stopped survives a restart.
//! - I4: a checkpoint is a reconstruction-preserving operation — taking
//!   one and then recovering must yield the same state as recovering
//!   without it.
//! - I5: WAL order wins — a later record for the same key always
//!   overrides an earlier one, snapshot included.

use emberstore_core::Value;
use emberstore_durability::{checkpoint, recover, DurabilityMode, SnapshotEntry, Wal, WalRecord};
use std::collections::HashMap;
use tempfile::TempDir;

// ----------------------------------------------------------------------
// I1: recovery is deterministic
// ----------------------------------------------------------------------

#[test]
fn recovery_is_deterministic_across_repeated_runs() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        for i in 0..20 {
            wal.append(&WalRecord::Put { k: format!("key{i}"), v: Value::from(i as i64 * 100), exp: None }).unwrap();
        }
    }

    let snapshot_path = dir.path().join("snapshot.json");
    let mut previous: Option<Vec<(String, Value)>> = None;
    for _ in 0..5 {
        let recovered = recover(&snapshot_path, &wal_path, 5, DurabilityMode::default()).unwrap();
        let mut state: Vec<(String, Value)> =
            recovered.entries.into_iter().map(|(k, e)| (k, e.value)).collect();
        state.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(prev) = &previous {
            assert_eq!(&state, prev, "recovering the same files twice must produce the same state");
        }
        previous = Some(state);
    }
}

// ----------------------------------------------------------------------
// I2: recovery never invents data
// ----------------------------------------------------------------------

#[test]
fn recovery_never_invents_keys_that_were_never_written() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        wal.append(&WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None }).unwrap();
        wal.append(&WalRecord::Put { k: "b".into(), v: Value::from(2i64), exp: None }).unwrap();
    }
    let recovered = recover(&dir.path().join("snapshot.json"), &wal_path, 5, DurabilityMode::default()).unwrap();
    let mut keys: Vec<&String> = recovered.entries.keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
}

// ----------------------------------------------------------------------
// I3: recovery never drops a durable write
// ----------------------------------------------------------------------

#[test]
fn every_fsynced_write_survives_a_reopen() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    let snapshot_path = dir.path().join("snapshot.json");

    for i in 0..50 {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        wal.append(&WalRecord::Put { k: format!("k{i}"), v: Value::from(i as i64), exp: None }).unwrap();
    }

    let recovered = recover(&snapshot_path, &wal_path, 5, DurabilityMode::default()).unwrap();
    assert_eq!(recovered.entries.len(), 50);
}

// ----------------------------------------------------------------------
// I4: checkpointing preserves the reconstructed state
// ----------------------------------------------------------------------

#[test]
fn checkpoint_then_recover_matches_recover_without_checkpoint() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    let snapshot_path = dir.path().join("snapshot.json");

    let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    let mut entries = HashMap::new();
    for i in 0..10 {
        let key = format!("k{i}");
        wal.append(&WalRecord::Put { k: key.clone(), v: Value::from(i as i64), exp: None }).unwrap();
        entries.insert(key, SnapshotEntry { value: Value::from(i as i64), expires_at: None });
    }
    let before_checkpoint = entries.clone();

    checkpoint(&snapshot_path, 5, &mut wal, &entries).unwrap();
    drop(wal);

    let recovered = recover(&snapshot_path, &wal_path, 5, DurabilityMode::default()).unwrap();
    assert_eq!(recovered.entries.len(), before_checkpoint.len());
    for (key, entry) in &before_checkpoint {
        assert_eq!(recovered.entries.get(key).unwrap().value, entry.value);
    }
}

#[test]
fn checkpoint_truncates_so_a_second_recovery_does_not_replay_twice() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    let snapshot_path = dir.path().join("snapshot.json");

    let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    wal.append(&WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None }).unwrap();
    let mut entries = HashMap::new();
    entries.insert("a".to_string(), SnapshotEntry { value: Value::from(1i64), expires_at: None });
    checkpoint(&snapshot_path, 5, &mut wal, &entries).unwrap();

    assert_eq!(wal.read_all().unwrap().len(), 0, "checkpoint must truncate the WAL it just captured");
}

// ----------------------------------------------------------------------
// I5: WAL order wins over the snapshot for the same key
// ----------------------------------------------------------------------

#[test]
fn wal_record_after_a_checkpoint_overrides_the_snapshotted_value() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    let snapshot_path = dir.path().join("snapshot.json");

    let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    wal.append(&WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None }).unwrap();
    let mut entries = HashMap::new();
    entries.insert("a".to_string(), SnapshotEntry { value: Value::from(1i64), expires_at: None });
    checkpoint(&snapshot_path, 5, &mut wal, &entries).unwrap();

    // A later write lands in the freshly-truncated WAL, past the snapshot.
    wal.append(&WalRecord::Put { k: "a".into(), v: Value::from(2i64), exp: None }).unwrap();
    drop(wal);

    let recovered = recover(&snapshot_path, &wal_path, 5, DurabilityMode::default()).unwrap();
    assert_eq!(recovered.entries.get("a").unwrap().value, Value::from(2i64));
}

#[test]
fn delete_after_checkpoint_removes_a_snapshotted_key() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    let snapshot_path = dir.path().join("snapshot.json");

    let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    wal.append(&WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None }).unwrap();
    let mut entries = HashMap::new();
    entries.insert("a".to_string(), SnapshotEntry { value: Value::from(1i64), expires_at: None });
    checkpoint(&snapshot_path, 5, &mut wal, &entries).unwrap();

    wal.append(&WalRecord::Del { k: "a".into() }).unwrap();
    drop(wal);

    let recovered = recover(&snapshot_path, &wal_path, 5, DurabilityMode::default()).unwrap();
    assert!(!recovered.entries.contains_key("a"));
}
