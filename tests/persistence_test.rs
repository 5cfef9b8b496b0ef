#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use serde_json::Value;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn run(csv: &tempfile::NamedTempFile, db_path: &std::path::Path, seed: bool) -> Vec<Value> {
    let mut cmd = Command::new(cargo_bin!("dispatch-ledger"));
    cmd.arg(csv.path()).arg("--db-path").arg(db_path);
    if seed {
        cmd.arg("--seed").arg("tests/fixtures/seed.json");
    }
    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: seed, dispatch and settle
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "kind, order_id, delivered_amount").unwrap();
    writeln!(csv1, "dispatch, o-1,").unwrap();
    writeln!(csv1, "settle, o-3, 1000").unwrap();

    let first = run(&csv1, &db_path, true);
    assert_eq!(first[0]["vendor_id"], "v-1");
    assert_eq!(first[1]["cashback"]["status"], "credited");

    // 2. Second run against the same DB path, without reseeding
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "kind, order_id, delivered_amount").unwrap();
    writeln!(csv2, "dispatch, o-1,").unwrap();
    writeln!(csv2, "settle, o-3, 1000").unwrap();

    let second = run(&csv2, &db_path, false);
    assert_eq!(second[0]["reason"], "already_handled");
    assert_eq!(second[0]["status"], "processing");
    assert_eq!(second[1]["cashback"]["status"], "already_settled");
    assert_eq!(second[1]["referral"]["status"], "already_settled");
}

#[test]
fn test_rocksdb_reseed_does_not_reset_progress() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "kind, order_id, delivered_amount").unwrap();
    writeln!(csv1, "dispatch, o-1,").unwrap();
    writeln!(csv1, "settle, o-3, 1000").unwrap();
    let first = run(&csv1, &db_path, true);
    assert_eq!(first[0]["vendor_id"], "v-1");
    assert_eq!(first[1]["cashback"]["status"], "credited");

    // Same seed again on the live database, then a fresh order for the same customer
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "kind, order_id, delivered_amount").unwrap();
    writeln!(csv2, "dispatch, o-1,").unwrap();
    writeln!(csv2, "dispatch, o-2,").unwrap();
    writeln!(csv2, "settle, o-3, 1000").unwrap();
    let second = run(&csv2, &db_path, true);

    assert_eq!(second[0]["reason"], "already_handled");
    assert_eq!(second[0]["status"], "processing");
    assert_eq!(second[1]["reason"], "missing_coordinates");
    assert_eq!(second[2]["cashback"]["status"], "already_settled");
}
