//! WAL replay semantics.
//!
//! Focused on `recovery::apply`'s per-record-kind behavior in isolation
//! from snapshotting: later records must always win over earlier ones
//! for the same key, and each record kind must only touch the field it
//! claims to (a `Ttl` record never changes a value, a `Put` always
//! resets expiry to whatever it carries).

use emberstore_core::Value;
use emberstore_durability::{recover, DurabilityMode, Wal, WalRecord};
use tempfile::TempDir;

fn replay(records: &[WalRecord]) -> std::collections::HashMap<String, emberstore_durability::SnapshotEntry> {
    let dir = TempDir::new().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
        for record in records {
            wal.append(record).unwrap();
        }
    }
    recover(&dir.path().join("snapshot.json"), &wal_path, 5, DurabilityMode::default()).unwrap().entries
}

#[test]
fn later_put_overwrites_an_earlier_one_for_the_same_key() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None },
        WalRecord::Put { k: "a".into(), v: Value::from(2i64), exp: None },
        WalRecord::Put { k: "a".into(), v: Value::from(3i64), exp: None },
    ]);
    assert_eq!(entries.get("a").unwrap().value, Value::from(3i64));
}

#[test]
fn put_after_delete_resurrects_the_key() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None },
        WalRecord::Del { k: "a".into() },
        WalRecord::Put { k: "a".into(), v: Value::from(2i64), exp: None },
    ]);
    assert_eq!(entries.get("a").unwrap().value, Value::from(2i64));
}

#[test]
fn delete_after_put_removes_the_key() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None },
        WalRecord::Del { k: "a".into() },
    ]);
    assert!(!entries.contains_key("a"));
}

#[test]
fn a_fresh_put_always_resets_expiry_even_without_an_exp_field() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: Some(5_000) },
        WalRecord::Put { k: "a".into(), v: Value::from(2i64), exp: None },
    ]);
    assert_eq!(entries.get("a").unwrap().expires_at, None, "the second Put carries no TTL, so it must clear the first one's");
}

#[test]
fn ttl_record_changes_expiry_without_touching_the_value() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(42i64), exp: None },
        WalRecord::Ttl { k: "a".into(), exp: Some(9_000) },
    ]);
    let entry = entries.get("a").unwrap();
    assert_eq!(entry.value, Value::from(42i64));
    assert_eq!(entry.expires_at, Some(9_000));
}

#[test]
fn clr_removes_every_key_regardless_of_how_many_preceded_it() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None },
        WalRecord::Put { k: "b".into(), v: Value::from(2i64), exp: None },
        WalRecord::Put { k: "c".into(), v: Value::from(3i64), exp: None },
        WalRecord::Clr,
    ]);
    assert!(entries.is_empty());
}

#[test]
fn writes_after_a_clr_still_land() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None },
        WalRecord::Clr,
        WalRecord::Put { k: "b".into(), v: Value::from(2i64), exp: None },
    ]);
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key("b"));
}

#[test]
fn interleaved_keys_replay_independently_of_each_other() {
    let entries = replay(&[
        WalRecord::Put { k: "a".into(), v: Value::from(1i64), exp: None },
        WalRecord::Put { k: "b".into(), v: Value::from(10i64), exp: None },
        WalRecord::Del { k: "a".into() },
        WalRecord::Put { k: "b".into(), v: Value::from(20i64), exp: None },
    ]);
    assert!(!entries.contains_key("a"));
    assert_eq!(entries.get("b").unwrap().value, Value::from(20i64));
}
