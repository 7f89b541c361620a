//! Configuration layering tests: CLI flags over file values over defaults

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use iotsc_core::Role;
use iotsc_daemon::{Cli, DaemonConfig, DaemonError};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const FILE_CONFIG: &str = r#"
[peripheral]
role = "sender"
adapter = "hci1"
alias = "file-alias"
device_id = "file-id"
advertising_retries = 5

[status]
path = "/status"

[log]
file = "/tmp/iotsc-file.log"
verbosity = 1
"#;

#[test]
fn test_file_values_override_defaults() {
    let file = write_config(FILE_CONFIG);
    let config = DaemonConfig::load_from_file(file.path()).unwrap();

    assert_eq!(config.peripheral.adapter.as_deref(), Some("hci1"));
    assert_eq!(config.peripheral.alias, "file-alias");
    assert_eq!(config.peripheral.advertising_retries, 5);
    assert_eq!(config.peripheral.retry_delay_ms, 2000);
    assert_eq!(config.status.path, "/status");
    assert_eq!(config.status.bind.port(), 6459);
    assert_eq!(config.log.verbosity, 1);
}

#[test]
fn test_cli_overrides_file() {
    let file = write_config(FILE_CONFIG);
    let path = file.path().to_str().unwrap().to_string();
    let cli = Cli::try_parse_from([
        "dtniotsc",
        "--config",
        path.as_str(),
        "-c",
        "1",
        "-b",
        "hci0",
        "start",
        "-a",
        "cli-alias",
        "-vv",
        "--auto-advertise",
        "-l",
        "/tmp/iotsc-cli.log",
    ])
    .unwrap();

    let config = DaemonConfig::load(&cli).unwrap();
    assert_eq!(config.peripheral.role, Role::Collector);
    assert_eq!(config.peripheral.adapter.as_deref(), Some("hci0"));
    assert_eq!(config.peripheral.alias, "cli-alias");
    assert_eq!(config.peripheral.device_id, "file-id");
    assert!(config.peripheral.auto_advertise);
    assert_eq!(config.log.verbosity, 2);
    assert_eq!(config.log.file, PathBuf::from("/tmp/iotsc-cli.log"));
}

#[test]
fn test_collector_value_overrides_file_role() {
    let file = write_config(&FILE_CONFIG.replace("role = \"sender\"", "role = \"collector\""));
    let path = file.path().to_str().unwrap().to_string();

    let cli = Cli::try_parse_from(["dtniotsc", "--config", path.as_str(), "status"]).unwrap();
    assert_eq!(DaemonConfig::load(&cli).unwrap().peripheral.role, Role::Collector);

    let cli = Cli::try_parse_from(["dtniotsc", "--config", path.as_str(), "-c", "0", "status"])
        .unwrap();
    assert_eq!(DaemonConfig::load(&cli).unwrap().peripheral.role, Role::Sender);
}

#[test]
fn test_start_requires_identity() {
    let cli = Cli::try_parse_from(["dtniotsc", "start", "-a", "iotsc"]).unwrap();
    assert!(matches!(
        DaemonConfig::load(&cli),
        Err(DaemonError::Config(_))
    ));
}

#[test]
fn test_status_needs_no_identity() {
    let cli = Cli::try_parse_from(["dtniotsc", "status"]).unwrap();
    let config = DaemonConfig::load(&cli).unwrap();
    assert_eq!(config.status.path, "/RPC2");
}

#[test]
fn test_malformed_file_is_reported() {
    let file = write_config("[peripheral\nalias = ");
    assert!(matches!(
        DaemonConfig::load_from_file(file.path()),
        Err(DaemonError::TomlParsing(_))
    ));
}

#[test]
fn test_missing_file_is_reported() {
    assert!(matches!(
        DaemonConfig::load_from_file("/nonexistent/iotsc.toml"),
        Err(DaemonError::Config(_))
    ));
}
