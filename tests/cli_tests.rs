//! CLI smoke tests: each command runs in its own process against a
//! throwaway wallet file and database directory.

use assert_cmd::Command;
use tempfile::TempDir;

fn minicoin(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("minicoin").expect("binary exists");
    cmd.env("DATA_DIR", dir.path().join("db"))
        .env("WALLET_FILE", dir.path().join("wallet.dat"))
        .env("NODE_ID", "3999");
    cmd
}

#[test]
fn createwallet_then_listaddresses() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    minicoin(&dir).arg("createwallet").assert().success();
    minicoin(&dir).arg("listaddresses").assert().success();
}

#[test]
fn getbalance_rejects_malformed_address() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    minicoin(&dir)
        .args(["getbalance", "--address", "not-a-real-address"])
        .assert()
        .failure();
}

#[test]
fn getbalance_fails_without_chain() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    // A valid address but no chain on disk: the open fails with a non-zero
    // exit code. Create the wallet first to obtain a well-formed address.
    minicoin(&dir).arg("createwallet").assert().success();

    let output = minicoin(&dir)
        .arg("listaddresses")
        .output()
        .expect("Failed to run listaddresses");
    let listing = String::from_utf8_lossy(&output.stdout).to_string()
        + &String::from_utf8_lossy(&output.stderr);
    let address = listing
        .split_whitespace()
        .last()
        .expect("one address printed")
        .to_string();

    minicoin(&dir)
        .args(["getbalance", "--address", &address])
        .assert()
        .failure();
}

#[test]
fn reindexutxo_fails_without_chain() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    minicoin(&dir).arg("reindexutxo").assert().failure();
}
