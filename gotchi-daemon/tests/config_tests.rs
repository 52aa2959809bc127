//! Configuration loading tests.
//!
//! Covers the daemon's loading path: TOML file, environment overrides,
//! validation, and the shipped example configuration.

use std::env;
use std::io::Write;

use gotchi_core::config::GotchiConfig;
use serial_test::serial;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_example_config_is_valid() {
    // Given: The example configuration shipped with the repository
    let content = include_str!("../../gotchi.toml.example");

    // When: Parsing and validating it
    let config = GotchiConfig::parse(content).unwrap();

    // Then: It should pass validation as-is
    config.validate().unwrap();
}

#[tokio::test]
#[serial]
async fn test_load_reads_file_and_validates() {
    // Given: A partial config file
    let file = write_config(
        r#"
[general]
log_level = "debug"
log_format = "json"

[threat_intel]
enabled = true
greynoise_enabled = true
"#,
    );

    // When: Loading it
    let config = GotchiConfig::load(file.path()).await.unwrap();

    // Then: File values are applied and the rest defaults
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "json");
    assert!(config.threat_intel.enabled);
    assert!(config.threat_intel.greynoise_enabled);
    assert!(config.monitor.enabled);
    assert_eq!(config.monitor.sample_interval_ms, 2_000);
}

#[tokio::test]
#[serial]
async fn test_load_missing_file_fails() {
    let err = GotchiConfig::load("/nonexistent/gotchi.toml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_load_rejects_invalid_values() {
    // Given: A config with an unknown log format
    let file = write_config(
        r#"
[general]
log_format = "xml"
"#,
    );

    // When / Then: Validation fails during load
    let err = GotchiConfig::load(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("log_format"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_env_overrides_file_values() {
    // Given: A config file and environment overrides
    let file = write_config(
        r#"
[monitor]
sample_interval_ms = 5000
"#,
    );
    unsafe {
        env::set_var("GOTCHI_MONITOR_SAMPLE_INTERVAL_MS", "1000");
        env::set_var("GOTCHI_THREAT_INTEL_ENABLED", "true");
    }

    // When: Loading the config
    let result = GotchiConfig::load(file.path()).await;

    unsafe {
        env::remove_var("GOTCHI_MONITOR_SAMPLE_INTERVAL_MS");
        env::remove_var("GOTCHI_THREAT_INTEL_ENABLED");
    }

    // Then: The environment wins
    let config = result.unwrap();
    assert_eq!(config.monitor.sample_interval_ms, 1000);
    assert!(config.threat_intel.enabled);
}

#[tokio::test]
#[serial]
async fn test_legacy_env_names_are_honored() {
    // Given: Only the legacy variable names
    let file = write_config("");
    unsafe {
        env::set_var("ABUSEIPDB_API_KEY", "legacy-key");
        env::set_var("ENABLE_GREYNOISE", "yes");
    }

    let result = GotchiConfig::load(file.path()).await;

    unsafe {
        env::remove_var("ABUSEIPDB_API_KEY");
        env::remove_var("ENABLE_GREYNOISE");
    }

    // Then: Both settings are picked up
    let config = result.unwrap();
    assert_eq!(
        config.threat_intel.abuseipdb_api_key.as_deref(),
        Some("legacy-key")
    );
    assert!(config.threat_intel.greynoise_enabled);
}

#[tokio::test]
#[serial]
async fn test_invalid_env_value_is_ignored() {
    let file = write_config("");
    unsafe {
        env::set_var("GOTCHI_MONITOR_WATCH_INTERVAL_SECS", "soon");
    }

    let result = GotchiConfig::load(file.path()).await;

    unsafe {
        env::remove_var("GOTCHI_MONITOR_WATCH_INTERVAL_SECS");
    }

    assert_eq!(result.unwrap().monitor.watch_interval_secs, 5);
}
