//! TOML configuration loading (`config-file` feature).

use std::io::Write;

use rxm_runtime::{ConfigError, ExceptionPolicy, Registration, RuntimeConfig, SchedulerKind};

#[test]
fn full_document_parses() {
    let config = RuntimeConfig::from_toml_str(
        r#"
        exception-policy = "ignore"
        scheduler = "queue"
        "#,
    )
    .unwrap();

    assert_eq!(config.exception_policy, ExceptionPolicy::Ignore);
    assert_eq!(config.scheduler, SchedulerKind::Queue);
}

#[test]
fn missing_keys_keep_defaults() {
    let config = RuntimeConfig::from_toml_str("scheduler = \"immediate\"\n").unwrap();
    assert_eq!(config.exception_policy, ExceptionPolicy::Log);
    assert_eq!(config.scheduler, SchedulerKind::Immediate);

    assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
}

#[test]
fn unknown_values_are_rejected() {
    let err = RuntimeConfig::from_toml_str("scheduler = \"threadpool\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_reads_a_file_and_builds_a_registration() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "exception-policy = \"panic\"").unwrap();
    writeln!(file, "scheduler = \"queue\"").unwrap();

    let config = RuntimeConfig::load(file.path()).unwrap();
    assert_eq!(config.exception_policy, ExceptionPolicy::Panic);

    let registration = Registration::from_config(&config);
    assert!(registration.main_queue().is_some());
}

#[test]
fn load_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let err = RuntimeConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert!(err.to_string().starts_with("failed to read config file"));
}
