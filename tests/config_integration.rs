//! Integration tests for configuration resolution
//!
//! These tests check the precedence of configuration sources as the binary
//! sees them: defaults, then the TOML file, then environment variables, then
//! command-line flags.

use clap::Parser;
use credflow::cli::{build_action, resolve_config, Cli};
use credflow::secrets::TenantId;
use credflow::workflow::MountConflictPolicy;
use std::env;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const TOUCHED_VARS: &[&str] = &[
    "VAULT_ADDR",
    "VAULT_TOKEN",
    "VAULT_NAMESPACE",
    "CREDFLOW_CONFIG",
    "CREDFLOW_POLL_INTERVAL_MS",
    "CREDFLOW_TOKEN_TIMEOUT_SECS",
    "CREDFLOW_ROLE_NAME",
    "CREDFLOW_ZONE",
    "CREDFLOW_INSTANCE",
    "CREDFLOW_ON_EXISTING_MOUNT",
];

/// Clears the variables these tests touch and restores them on drop.
struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn clean() -> Self {
        let saved = TOUCHED_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
        for key in TOUCHED_VARS {
            env::remove_var(key);
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn run_cli(config: &std::path::Path, extra: &[&str]) -> Cli {
    let mut args = vec![
        "credflow".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "run".to_string(),
        "--tenant".to_string(),
        "t1".to_string(),
        "--credentials".to_string(),
        "creds.json".to_string(),
        "--role-spec".to_string(),
        "role.json".to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    Cli::try_parse_from(args).unwrap()
}

const FILE: &str = r#"
[broker]
address = "https://vault.from-file:8200"

[token]
timeout_secs = 120
poll_interval_ms = 2000

[workflow]
role_name = "file-role"

[action]
zone = "europe-west1-b"
instance = "vm-file"
"#;

#[test]
fn test_file_values_apply_without_env_or_flags() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    let _env = EnvGuard::clean();
    let file = config_file(FILE);

    let config = resolve_config(&run_cli(file.path(), &[])).unwrap();

    assert_eq!(config.broker.address, "https://vault.from-file:8200");
    assert_eq!(config.token.poll_interval_ms, 2000);
    assert_eq!(config.workflow.role_name, "file-role");
    assert!(config.broker.token.is_none());
}

#[test]
fn test_env_overrides_file() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    let _env = EnvGuard::clean();
    let file = config_file(FILE);

    env::set_var("VAULT_ADDR", "https://vault.from-env:8200");
    env::set_var("VAULT_TOKEN", "hvs.from-env");
    env::set_var("CREDFLOW_POLL_INTERVAL_MS", "500");

    let config = resolve_config(&run_cli(file.path(), &[])).unwrap();

    assert_eq!(config.broker.address, "https://vault.from-env:8200");
    assert_eq!(config.broker.token.as_ref().map(|t| t.expose_secret()), Some("hvs.from-env"));
    assert_eq!(config.token.poll_interval_ms, 500);
    assert_eq!(config.token.timeout_secs, 120);
    assert_eq!(config.workflow.role_name, "file-role");
}

#[test]
fn test_flags_override_env_and_file() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    let _env = EnvGuard::clean();
    let file = config_file(FILE);

    env::set_var("CREDFLOW_POLL_INTERVAL_MS", "500");
    env::set_var("CREDFLOW_ROLE_NAME", "env-role");
    env::set_var("CREDFLOW_ON_EXISTING_MOUNT", "reuse");

    let cli = run_cli(
        file.path(),
        &[
            "--poll-interval-ms",
            "250",
            "--role-name",
            "r1",
            "--instance",
            "vm-flag",
            "--abort-on-existing-mount",
        ],
    );
    let config = resolve_config(&cli).unwrap();

    assert_eq!(config.token.poll_interval_ms, 250);
    assert_eq!(config.workflow.role_name, "r1");
    assert_eq!(config.workflow.on_existing_mount, MountConflictPolicy::Abort);

    let settings = config.workflow_settings().unwrap();
    assert_eq!(settings.schedule.poll_interval, Duration::from_millis(250));
    assert_eq!(settings.schedule.timeout, Duration::from_secs(120));

    let action = build_action(&config, &TenantId::new("t1").unwrap()).unwrap();
    assert!(action.url.as_str().ends_with("/projects/t1/zones/europe-west1-b/instances/vm-flag/stop"));
}

#[test]
fn test_invalid_resolved_config_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    let _env = EnvGuard::clean();
    let file = config_file(FILE);

    // Interval longer than the timeout.
    let cli = run_cli(file.path(), &["--token-timeout", "1", "--poll-interval-ms", "5000"]);
    let err = resolve_config(&cli).unwrap_err();
    assert!(format!("{:#}", err).contains("poll interval"));
}

#[test]
fn test_verbose_flag_raises_log_level() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    let _env = EnvGuard::clean();
    let file = config_file(FILE);

    let config = resolve_config(&run_cli(file.path(), &["-v"])).unwrap();
    assert_eq!(config.logging.level, "debug");
}
