//! CLI integration tests.
//!
//! These tests verify argument parsing and the configuration priority chain.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use shell_relay::cli::{parse_args_from, Args};
use shell_relay::config::{Config, ConfigError};
use shell_relay::OutputOrdering;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("shell-relay")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.host.is_none());
    assert!(result.port.is_none());
    assert!(!result.no_auth);
    assert!(result.config.is_none());
    assert!(result.api_token.is_none());
    assert!(result.workdir.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "-k",
        "my-token",
        "-w",
        "/srv/repo",
        "-l",
        "debug",
    ]))
    .unwrap();

    assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
    assert_eq!(result.port, Some(8080));
    assert_eq!(result.api_token.as_deref(), Some("my-token"));
    assert_eq!(result.workdir, Some(PathBuf::from("/srv/repo")));
    assert_eq!(result.log_level.as_deref(), Some("debug"));
}

#[test]
fn test_cli_ipv6_host() {
    let result = parse_args_from(args(&["-H", "::1"])).unwrap();
    assert_eq!(result.host.unwrap().to_string(), "::1");
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_load_with_token_from_cli() {
    let parsed = parse_args_from(args(&["-k", "secret", "-p", "4000"])).unwrap();
    let config = Config::load(&parsed).unwrap();

    assert_eq!(config.server.port, 4000);
    assert!(config.security.enabled);
    assert_eq!(config.security.api_token.as_deref(), Some("secret"));

    let server = config.to_server_config().unwrap();
    assert_eq!(server.bind_address(), "127.0.0.1:4000");
}

#[test]
fn test_load_file_then_cli() {
    let file = config_file(
        r#"{
            "server": { "port": 9000 },
            "execution": { "working_dir": "/from/file", "ordering": "interleaved" },
            "security": { "api_token": "file-token" },
            "logging": { "session_log": null }
        }"#,
    );

    let parsed = Args {
        config: Some(file.path().to_path_buf()),
        workdir: Some(PathBuf::from("/from/cli")),
        ..Args::default()
    };
    let config = Config::load(&parsed).unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.execution.working_dir, PathBuf::from("/from/cli"));
    assert_eq!(config.execution.ordering, OutputOrdering::Interleaved);
    assert_eq!(config.security.api_token.as_deref(), Some("file-token"));
    assert!(config.logging.session_log.is_none());
}

#[test]
fn test_load_no_auth_without_token() {
    let parsed = parse_args_from(args(&["--no-auth"])).unwrap();
    let config = Config::load(&parsed).unwrap();
    assert!(!config.security.enabled);
}

#[test]
fn test_load_missing_config_file() {
    let parsed = Args {
        config: Some(PathBuf::from("/nonexistent/shell-relay.json")),
        no_auth: true,
        ..Args::default()
    };
    let err = Config::load(&parsed).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/shell-relay.json"));
}

#[test]
fn test_load_invalid_host_in_file() {
    let file = config_file(r#"{ "server": { "host": "localhost" } }"#);
    let parsed = Args {
        config: Some(file.path().to_path_buf()),
        no_auth: true,
        ..Args::default()
    };
    assert!(matches!(
        Config::load(&parsed),
        Err(ConfigError::InvalidHost(_))
    ));
}
