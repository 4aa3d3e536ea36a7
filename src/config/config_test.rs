use std::time::Duration;

use serial_test::serial;
use temp_env::with_vars;

use super::*;

fn cleanup_all_registrar_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("REGISTRAR__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = RegistrarConfig::default();

    assert_eq!(config.cluster.annotation_prefix, "rossedman.io");
    assert!(config.cluster.kubeconfig.is_none());
    assert_eq!(config.registration.request_timeout_ms, 10_000);
    assert_eq!(config.worker.max_concurrent_reconciles, 4);
    assert_eq!(config.retry.persist.max_retries, 5);
    assert!(!config.monitoring.prometheus_enabled);
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_registrar_env_vars();
    with_vars(
        vec![
            ("REGISTRAR__WORKER__MAX_CONCURRENT_RECONCILES", Some("1")),
            ("REGISTRAR__CLUSTER__ANNOTATION_PREFIX", Some("example.com")),
            ("REGISTRAR__REGISTRATION__ALLOWED_SCHEMES", Some("https")),
        ],
        || {
            let config = RegistrarConfig::new().unwrap();

            assert_eq!(config.worker.max_concurrent_reconciles, 1);
            assert_eq!(config.cluster.annotation_prefix, "example.com");
            assert_eq!(config.registration.allowed_schemes, vec!["https".to_string()]);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_registrar_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");

    std::fs::write(
        &config_path,
        r#"
        [cluster]
        label_selector = "pool=edge"

        [retry.registration]
        max_retries = 0
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = RegistrarConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .expect("override applies");

        assert_eq!(config.cluster.label_selector.as_deref(), Some("pool=edge"));
        assert_eq!(config.retry.registration.max_retries, 0);
        // Untouched fields keep their defaults
        assert_eq!(config.retry.registration.base_delay_ms, 500);
        assert_eq!(config.cluster.annotation_prefix, "rossedman.io");
    });
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_registrar_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("registrar.toml");
    std::fs::write(
        &config_path,
        r#"
        [registration]
        request_timeout_ms = 4000
        connect_timeout_ms = 1000
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            ("CONFIG_PATH", Some(config_path.to_str().unwrap())),
            ("REGISTRAR__REGISTRATION__REQUEST_TIMEOUT_MS", Some("8000")),
        ],
        || {
            let config = RegistrarConfig::new().unwrap().validate().unwrap();

            assert_eq!(config.registration.request_timeout_ms, 8000);
            assert_eq!(config.registration.connect_timeout_ms, 1000);
        },
    );
}

#[test]
#[serial]
fn missing_config_path_file_should_fail() {
    cleanup_all_registrar_env_vars();
    with_vars(vec![("CONFIG_PATH", Some("/nonexistent/registrar.toml"))], || {
        assert!(RegistrarConfig::new().is_err());
    });
}

#[test]
fn validation_should_accept_defaults() {
    assert!(RegistrarConfig::default().validate().is_ok());
}

#[test]
fn validation_should_reject_zero_request_timeout() {
    let mut config = RegistrarConfig::default();
    config.registration.request_timeout_ms = 0;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_connect_timeout_above_request_timeout() {
    let mut config = RegistrarConfig::default();
    config.registration.connect_timeout_ms = config.registration.request_timeout_ms + 1;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_empty_scheme_list() {
    let mut config = RegistrarConfig::default();
    config.registration.allowed_schemes.clear();

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_zero_workers() {
    let mut config = RegistrarConfig::default();
    config.worker.max_concurrent_reconciles = 0;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_prefix_with_slash() {
    let mut config = RegistrarConfig::default();
    config.cluster.annotation_prefix = "rossedman.io/extra".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_inverted_backoff() {
    let mut config = RegistrarConfig::default();
    config.retry.persist.base_delay_ms = 5_000;
    config.retry.persist.max_delay_ms = 100;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_ephemeral_metrics_port() {
    let mut config = RegistrarConfig::default();
    config.monitoring.prometheus_enabled = true;
    config.monitoring.prometheus_port = 0;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_loopback_metrics_listener() {
    let mut config = RegistrarConfig::default();
    config.monitoring.prometheus_enabled = true;
    config.monitoring.listen_address = "127.0.0.1".parse().unwrap();

    assert!(config.validate().is_err());
}

#[test]
fn disabled_monitoring_is_not_validated() {
    let mut config = RegistrarConfig::default();
    config.monitoring.prometheus_port = 0;
    config.monitoring.listen_address = "::1".parse().unwrap();

    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn metrics_listener_should_come_from_env() {
    cleanup_all_registrar_env_vars();
    with_vars(
        vec![
            ("REGISTRAR__MONITORING__PROMETHEUS_ENABLED", Some("true")),
            ("REGISTRAR__MONITORING__PROMETHEUS_PORT", Some("9300")),
            ("REGISTRAR__MONITORING__LISTEN_ADDRESS", Some("10.0.0.7")),
        ],
        || {
            let config = RegistrarConfig::new().unwrap().validate().unwrap();
            assert_eq!(
                config.monitoring.listen_addr(),
                "10.0.0.7:9300".parse::<std::net::SocketAddr>().unwrap()
            );
        },
    );
}

#[test]
fn annotation_keys_should_be_prefixed() {
    let keys = ClusterConfig::default().annotation_keys();
    assert_eq!(keys.register, "rossedman.io/register");
    assert_eq!(keys.registered, "rossedman.io/registered");

    let bare = AnnotationKeys::new("");
    assert_eq!(bare.register, "register");
    assert_eq!(bare.registered, "registered");
}

#[test]
fn backoff_delay_should_double_until_capped() {
    let policy = BackoffPolicy {
        max_retries: 10,
        base_delay_ms: 100,
        max_delay_ms: 1_000,
    };

    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
    assert_eq!(policy.delay_for(60), Duration::from_millis(1_000));
}
