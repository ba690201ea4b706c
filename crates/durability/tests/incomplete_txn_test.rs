//! Incomplete-write-sequence tests.
//!
//! This store has no multi-key transactions: each WAL record is its own
//! atomic unit (§4.1's single-record `Put{k,v,exp}` fold exists exactly
//! to keep a TTL write that way). What *can* go wrong is a sequence of
//! otherwise-independent records getting cut off partway through by a
//! crash, or a record naming a key the rest of the log never produced.
//! These tests check recovery handles both without inventing state.

use emberstore_core::Value;
use emberstore_durability::{recover, DurabilityMode, Wal, WalRecord};
use std::io::Write;
use tempfile::TempDir;

#[test]
fn ttl_record_for_a_key_that_was_never_put_is_a_harmless_no_op() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        // No preceding Put for "ghost" - maybe its Put record was the one that
        // got cut off by a crash, or the key was deleted in the same batch.
        wal.append(&WalRecord::Ttl { k: "ghost".into(), exp: Some(1000) }).unwrap();
    }
    let recovered = recover(&dir.path().join("snapshot.json"), &wal_path, 5, DurabilityMode::default()).unwrap();
    assert!(recovered.entries.is_empty(), "a Ttl record must never conjure a key into existence");
}

#[test]
fn delete_of_a_key_that_does_not_exist_is_a_harmless_no_op() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        wal.append(&WalRecord::Del { k: "never-existed".into() }).unwrap();
        wal.append(&WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None }).unwrap();
    }
    let recovered = recover(&dir.path().join("snapshot.json"), &wal_path, 5, DurabilityMode::default()).unwrap();
    assert_eq!(recovered.entries.len(), 1);
    assert!(recovered.entries.contains_key("a"));
}

#[test]
fn a_batch_of_writes_cut_off_halfway_keeps_only_the_completed_prefix() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        for i in 0..5 {
            wal.append(&WalRecord::Put { k: format!("k{i}"), v: Value::from(i as i64), exp: None }).unwrap();
        }
    }
    // A sixth write's line never finished: no trailing newline, as a crash
    // mid-`write_all` would leave it.
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&wal_path).unwrap();
        f.write_all(br#"{"op":"put","k":"k5","v":5"#).unwrap();
    }

    let recovered = recover(&dir.path().join("snapshot.json"), &wal_path, 5, DurabilityMode::default()).unwrap();
    assert_eq!(recovered.entries.len(), 5, "only the five complete writes before the cut-off must land");
    assert!(!recovered.entries.contains_key("k5"));
}

#[test]
fn reopening_after_an_incomplete_batch_still_recovers_the_completed_prefix() {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        wal.append(&WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None }).unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&wal_path).unwrap();
        f.write_all(br#"{"op":"put","k":"b","v":2"#).unwrap();
    }

    // Reopening must not choke on the dangling partial line.
    let wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    let records = wal.read_all().unwrap();
    assert_eq!(records, vec![WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None }]);
    drop(wal);

    let recovered = recover(&dir.path().join("snapshot.json"), &wal_path, 5, DurabilityMode::default()).unwrap();
    assert!(recovered.entries.contains_key("a"));
}
