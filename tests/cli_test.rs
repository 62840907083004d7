use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

#[test]
fn test_correct_prints_amounts() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.args(["correct", "1", "2", "4", "9", "15", "100"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("raw_count,amount"))
        .stdout(predicate::str::contains("1,1000\n"))
        .stdout(predicate::str::contains("2,2000\n"))
        // override band
        .stdout(predicate::str::contains("4,2000\n"))
        // nearest within tolerance
        .stdout(predicate::str::contains("9,10000\n"))
        .stdout(predicate::str::contains("15,invalid\n"))
        .stdout(predicate::str::contains("100,100000\n"));

    Ok(())
}

#[test]
fn test_correct_requires_counts() {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("correct");
    cmd.assert().failure();
}

#[test]
fn test_environment_overrides_tolerance() {
    let mut cmd = Command::new(cargo_bin!());
    cmd.env("BILL_ACCEPTOR__DENOMINATIONS__TOLERANCE", "0")
        .args(["correct", "9", "10"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("9,invalid\n"))
        .stdout(predicate::str::contains("10,10000\n"));
}

#[test]
fn test_replay_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.args([
        "--config",
        "tests/fixtures/fast.toml",
        "replay",
        "--dry-run",
        "tests/fixtures/replay.csv",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "id,status,total_inserted,overpaid,remaining_due,delivery,attempts",
        ))
        .stdout(predicate::str::contains("TRX-1,success,3000,0,0,delivered,1"))
        // no more notes after the first 2000: fails at the deadline
        .stdout(predicate::str::contains(
            "TRX-2,failed,2000,0,3000,delivered,1",
        ));

    Ok(())
}

#[test]
fn test_missing_config_file_fails() {
    let mut cmd = Command::new(cargo_bin!());
    cmd.args(["--config", "tests/fixtures/does-not-exist.toml", "correct", "1"]);
    cmd.assert().failure();
}

#[test]
fn test_inconsistent_timings_fail() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        "[acceptor]\nsettle_window_ms = 90000\ntransaction_timeout_secs = 60"
    )?;

    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("--config").arg(file.path()).args(["correct", "1"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("settle_window_ms must be shorter"));

    Ok(())
}

#[test]
fn test_shipped_config_matches_defaults() {
    let mut cmd = Command::new(cargo_bin!());
    cmd.args(["--config", "config/acceptor.toml", "correct", "1", "4", "52"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,1000\n"))
        .stdout(predicate::str::contains("4,2000\n"))
        .stdout(predicate::str::contains("52,50000\n"));
}
