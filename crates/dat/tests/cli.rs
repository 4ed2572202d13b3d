use std::{fs, path::Path, process::Command};

use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 8] = [
    "PRIVATE_KEY",
    "MNEMONIC",
    "ALCHEMY_API_KEY",
    "ETHERSCAN_API_KEY",
    "ETHER_SCAN_API_KEY",
    "DAT_RPC_URL",
    "HARDWARE_SIGNER_URL",
    "RUST_LOG",
];

fn run_dat(args: &[&str], cwd: &Path) -> (String, String, i32) {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dat"));
    command.args(args).env("NO_COLOR", "1").current_dir(cwd);
    for var in CREDENTIAL_VARS {
        command.env_remove(var);
    }
    let output = command
        .output()
        .unwrap_or_else(|_| panic!("Failed to run dat {args:?}"));
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
        output.status.code().unwrap_or(-1),
    )
}

fn workspace(config: &str) -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    fs::write(tmp.path().join("dat.toml"), config).expect("write dat.toml");
    tmp
}

#[test]
fn config_prints_resolved_settings() {
    let tmp = workspace(
        r#"
        [network]
        rpc_url = "http://127.0.0.1:8545"
        chain_id = 31337

        [fees]
        max_gas_price_gwei = 50
        "#,
    );
    let (stdout, stderr, code) = run_dat(&["config"], tmp.path());
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("endpoint:          http://127.0.0.1:8545/"));
    assert!(stdout.contains("chain id:          31337"));
    assert!(stdout.contains("gas price cap:     50 gwei"));
    assert!(stdout.contains("private key:       <unset>"));
    assert!(stdout.contains("mnemonic:          <development default>"));
}

#[test]
fn env_file_next_to_config_supplies_credentials() {
    let tmp = workspace("");
    fs::write(tmp.path().join(".env"), "ALCHEMY_API_KEY=from-dotenv\n").unwrap();
    let (stdout, _, code) = run_dat(&["config"], tmp.path());
    assert_eq!(code, 0);
    assert!(stdout.contains("alchemy api key:   <set>"));
    assert!(!stdout.contains("from-dotenv"));
}

#[test]
fn hardware_deploy_without_signer_reports_missing_deployer() {
    let tmp = workspace(
        r#"
        [network]
        rpc_url = "http://127.0.0.1:1"
        "#,
    );
    let (_, stderr, code) = run_dat(&["deploy", "--hardware"], tmp.path());
    assert_eq!(code, 1);
    assert!(stderr.contains("Error: No deployer"), "stderr: {stderr}");
}

#[test]
fn malformed_mnemonic_reports_missing_deployer() {
    let tmp = workspace(
        r#"
        [network]
        rpc_url = "http://127.0.0.1:1"
        "#,
    );
    fs::write(tmp.path().join(".env"), "MNEMONIC=\"not a phrase\"\n").unwrap();
    let (_, stderr, code) = run_dat(&["deploy"], tmp.path());
    assert_eq!(code, 1);
    assert!(stderr.contains("Error: No deployer"), "stderr: {stderr}");
    assert!(!stderr.contains("not a phrase"));
}

#[test]
fn commands_need_an_endpoint() {
    let tmp = workspace("");
    let (_, stderr, code) = run_dat(&["snapshot"], tmp.path());
    assert_eq!(code, 1);
    assert!(
        stderr.contains("Error: no RPC endpoint configured"),
        "stderr: {stderr}"
    );
}

#[test]
fn invalid_config_lists_every_problem() {
    let tmp = workspace(
        r#"
        [network]
        dialect = "ganache"

        [contracts]
        proxy = "0x1234"

        [extras]
        "#,
    );
    let (_, stderr, code) = run_dat(&["config"], tmp.path());
    assert_eq!(code, 1);
    assert!(stderr.contains("Error: invalid configuration:"), "stderr: {stderr}");
    assert!(stderr.contains("Unknown section [extras]"));
    assert!(stderr.contains("Invalid address \"0x1234\" for \"contracts.proxy\""));
}
