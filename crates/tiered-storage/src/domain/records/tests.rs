//! # Record Tests

use super::*;
use crate::domain::tiering::TierKind;
use std::path::PathBuf;

#[test]
fn test_where_record_encoding_uses_short_keys() {
    let record = BlockWhereRecord::local("aa11", TierKind::Hot, "/vol/HK0/0/aa11.dat");
    let json = String::from_utf8(record.encode().unwrap()).unwrap();

    assert!(json.contains("\"tr\":4"));
    assert!(json.contains("\"vp\""));
    assert!(!json.contains("cp"));
    assert!(!json.contains("aa11\","));
}

#[test]
fn test_where_record_decode_restores_hash() {
    let mut record = BlockWhereRecord::local("beef", TierKind::Warm, "/vol/WK1/2/beef.dat");
    record.set_cold("/cold/CK0/0/beef.dat");

    let decoded = BlockWhereRecord::decode("beef", &record.encode().unwrap()).unwrap();
    assert_eq!(decoded, record);
    assert!(decoded.is_in(TierKind::Cold));
    assert!(decoded.is_in(TierKind::Warm));
}

#[test]
fn test_clear_local_drops_path() {
    let mut record = BlockWhereRecord::local("beef", TierKind::Hot, "/vol/HK0/0/beef.dat");
    record.set_cold("cold-path");
    record.clear_local();

    assert_eq!(record.local_path(), None);
    assert!(record.block_path.is_none());
    assert!(record.is_in(TierKind::Cold));
}

#[test]
fn test_local_path_requires_local_bit() {
    let mut record = BlockWhereRecord::local("beef", TierKind::Hot, "/vol/HK0/0/beef.dat");
    assert_eq!(
        record.local_path(),
        Some(PathBuf::from("/vol/HK0/0/beef.dat").as_path())
    );

    record.tiering.remove(TierKind::Hot);
    assert_eq!(record.local_path(), None);
}

#[test]
fn test_unmoved_keys_sort_by_time() {
    let older = UnmovedBlockRecord::new(9_000, "ffff");
    let newer = UnmovedBlockRecord::new(10_000, "0000");

    assert!(older.key() < newer.key());
    assert!(UnmovedBlockRecord::time_key(9_000) <= older.key());
    assert!(older.key() < UnmovedBlockRecord::upper_bound_key(9_000));
    assert!(newer.key() > UnmovedBlockRecord::upper_bound_key(9_999));
}

#[test]
fn test_unmoved_same_nanosecond_does_not_collide() {
    let a = UnmovedBlockRecord::new(42, "aa");
    let b = UnmovedBlockRecord::new(42, "bb");
    assert_ne!(a.key(), b.key());
}

#[test]
fn test_unmoved_from_entry() {
    let record = UnmovedBlockRecord::new(1_700_000_000_000_000_000, "cafe");
    let parsed = UnmovedBlockRecord::from_entry(&record.key(), b"cafe").unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn test_unmoved_from_malformed_entry() {
    assert!(UnmovedBlockRecord::from_entry(b"12", b"cafe").is_err());
    assert!(UnmovedBlockRecord::from_entry(b"0000000000000000000x:cafe", b"cafe").is_err());
}

#[test]
fn test_set_local_replaces_other_local_tier() {
    let mut record = BlockWhereRecord::local("beef", TierKind::Warm, "/w/WK0/0/beef.dat");
    record.set_cold("/c/CK0/0/beef.dat");
    record.set_local(TierKind::Hot, "/h/HK0/0/beef.dat");

    assert!(record.is_in(TierKind::Hot));
    assert!(!record.is_in(TierKind::Warm));
    assert!(record.is_in(TierKind::Cold));
    assert_eq!(record.local_path(), Some(std::path::Path::new("/h/HK0/0/beef.dat")));
}
