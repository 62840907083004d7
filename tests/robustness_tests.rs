use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_trace_rows_are_skipped() {
    let mut cmd = Command::new(cargo_bin!());
    cmd.args([
        "--config",
        "tests/fixtures/fast.toml",
        "replay",
        "--dry-run",
        "tests/fixtures/malformed.csv",
    ]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading trace record"))
        // second start while TRX-1 is still open
        .stderr(predicate::str::contains(
            "Start rejected: a transaction is already in progress",
        ))
        .stdout(predicate::str::contains("TRX-1,success,1000,0,0,delivered,1"))
        .stdout(predicate::str::contains("TRX-9").not());
}

#[test]
fn test_invalid_start_values_are_rejected() {
    let trace = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(trace.path())
        .unwrap();
    wtr.write_record(["at_ms", "event", "id", "amount"]).unwrap();
    // Non-positive target
    wtr.write_record(["0", "start", "TRX-1", "-100"]).unwrap();
    // Missing id
    wtr.write_record(["10", "start", "", "1000"]).unwrap();
    // Edge with no transaction: ignored
    wtr.write_record(["20", "edge"]).unwrap();
    // Text in amount field
    wtr.write_record(["30", "start", "TRX-2", "lots"]).unwrap();
    // Valid
    wtr.write_record(["40", "start", "TRX-3", "1000"]).unwrap();
    wtr.write_record(["60", "edge"]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("--config")
        .arg("tests/fixtures/fast.toml")
        .arg("replay")
        .arg("--dry-run")
        .arg(trace.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(
            "Start rejected: target amount must be positive",
        ))
        .stderr(predicate::str::contains(
            "Start rejected: transaction id must not be empty",
        ))
        .stderr(predicate::str::contains("Error reading trace record"))
        .stdout(predicate::str::contains("TRX-3,success,1000,0,0,delivered,1"))
        .stdout(predicate::str::contains("TRX-1").not())
        .stdout(predicate::str::contains("TRX-2").not());
}

#[test]
fn test_missing_trace_file_fails() {
    let mut cmd = Command::new(cargo_bin!());
    cmd.args(["replay", "--dry-run", "tests/fixtures/no-such-trace.csv"]);
    cmd.assert().failure();
}
