mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_csv_handling() {
    let events = common::events_file(&[
        "create,p-1,2024-01-01T10:00:00Z,1,alice,North,1100,EUR,,,,",
        // Unknown event type
        "refund,p-1,,,,,100,,,,,",
        // Timestamp that is not RFC 3339
        "paid,p-1,yesterday,,,,,,,,,",
        "paid,p-1,2024-01-01T10:05:00Z,,,,,,,,,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("fine-payments"));
    cmd.arg("replay").arg(events.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading event"))
        .stdout(predicate::str::contains(
            "1,p-1,,North,alice,paid,1100,0,EUR,2024-01-01T10:00:00Z,2024-01-01T10:05:00Z,,,",
        ));
}

#[test]
fn test_invalid_data_types() {
    let events = common::events_file(&[
        // Text in amount field
        "create,p-1,,1,alice,North,not_a_number,EUR,,,,",
        // Negative user id
        "create,p-2,,-4,bob,North,100,EUR,,,,",
        "create,p-3,2024-01-01T10:00:00Z,3,carol,North,500,EUR,,,,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("fine-payments"));
    cmd.arg("replay").arg(events.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading event"))
        .stdout(predicate::str::contains(",p-3,"))
        .stdout(predicate::str::contains(",p-1,").not())
        .stdout(predicate::str::contains(",p-2,").not());
}

#[test]
fn test_events_for_unknown_payments_are_skipped() {
    let events = common::events_file(&[
        "paid,ghost,,,,,,,,,,",
        "create,p-1,2024-01-01T10:00:00Z,1,alice,North,100,EUR,,,,",
        "create,p-1,2024-01-01T11:00:00Z,1,alice,North,999,EUR,,,,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("fine-payments"));
    cmd.arg("replay").arg(events.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Ignoring event for unknown payment"))
        .stderr(predicate::str::contains("Ignoring duplicate payment"))
        .stdout(predicate::str::contains(",p-1,,North,alice,in_progress,100,"))
        .stdout(predicate::str::contains("ghost").not());
}

#[test]
fn test_oversized_column_is_reported() {
    let long_username = "u".repeat(51);
    let row = format!("create,p-1,,1,{long_username},North,100,EUR,,,,");
    let events = common::events_file(&[row.as_str()]).unwrap();

    let mut cmd = Command::new(cargo_bin!("fine-payments"));
    cmd.arg("replay").arg(events.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing event"))
        .stdout(predicate::str::contains("p-1").not());
}

#[test]
fn test_negative_amount_is_rejected() {
    let events = common::events_file(&[
        "create,p-1,,1,alice,North,-5,EUR,,,,",
        "create,p-2,,1,alice,North,500,EUR,,,,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("fine-payments"));
    cmd.arg("replay").arg(events.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("amounts cannot be negative"))
        .stdout(predicate::str::contains("p-1").not())
        .stdout(predicate::str::contains(",p-2,"));
}
