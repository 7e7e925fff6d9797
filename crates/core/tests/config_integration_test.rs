use std::env;
use std::io::Write;
use std::sync::Mutex;

use gateway_core::{BrokerType, GatewayConfig, LogFormat, TransportKind};

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_serialization() {
    let config = GatewayConfig::default();
    let toml_str = config.to_toml().unwrap();
    assert!(!toml_str.is_empty());

    let parsed = GatewayConfig::from_toml(&toml_str).unwrap();
    assert_eq!(config.server.bind_address, parsed.server.bind_address);
    assert_eq!(config.endpoints.len(), parsed.endpoints.len());
    assert_eq!(config.routes, parsed.routes);
}

#[test]
fn test_default_inventory_matches_service_ports() {
    let config = GatewayConfig::default();
    let address = |capability: &str| config.endpoint_for(capability).unwrap().address.clone();

    assert_eq!(address("user.get"), "http://localhost:50054");
    assert_eq!(address("order.create"), "http://localhost:50053");
    assert_eq!(address("inventory.reserve"), "http://localhost:50051");

    let notification = config.endpoint_for("notification.send").unwrap();
    assert_eq!(notification.transport, TransportKind::AsyncPublish);
    assert_eq!(
        notification.event_type.as_deref(),
        Some("notification.requested")
    );
    assert_eq!(config.server.bind_address, "0.0.0.0:8080");
}

#[test]
fn test_config_validation_comprehensive() {
    let mut config = GatewayConfig::default();
    assert!(config.validate().is_ok());

    config.server.bind_address = "invalid".to_string();
    assert!(config.validate().is_err());

    config = GatewayConfig::default();
    config.observability.log_level = "loud".to_string();
    assert!(config.validate().is_err());

    config = GatewayConfig::default();
    config.pool.max_connections = 0;
    assert!(config.validate().is_err());

    config = GatewayConfig::default();
    config.circuit_breaker.failure_threshold = 0;
    assert!(config.validate().is_err());

    config = GatewayConfig::default();
    config.broker.exchange = String::new();
    assert!(config.validate().is_err());

    config = GatewayConfig::default();
    let duplicate = config.endpoints[0].clone();
    config.endpoints.push(duplicate);
    assert!(config.validate().is_err());
}

#[test]
fn test_load_file_with_environment_override() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let file = write_config(
        r#"
[server]
bind_address = "127.0.0.1:9000"

[broker]
type = "in_memory"

[observability]
log_format = "json"
"#,
    );

    env::set_var("GATEWAY_SERVER__BIND_ADDRESS", "127.0.0.1:9100");
    env::set_var("GATEWAY_POOL__MAX_CONNECTIONS", "32");
    let result = GatewayConfig::load(file.path().to_str());
    env::remove_var("GATEWAY_SERVER__BIND_ADDRESS");
    env::remove_var("GATEWAY_POOL__MAX_CONNECTIONS");

    let config = result.unwrap();
    assert_eq!(config.server.bind_address, "127.0.0.1:9100");
    assert_eq!(config.pool.max_connections, 32);
    assert_eq!(config.broker.r#type, BrokerType::InMemory);
    assert_eq!(config.observability.log_format, LogFormat::Json);
    assert_eq!(config.endpoints.len(), GatewayConfig::default().endpoints.len());
}

#[test]
fn test_load_rejects_invalid_file() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let file = write_config(
        r#"
[[routes]]
method = "GET"
path = "/health"
capability = "user.get"
"#,
    );
    assert!(GatewayConfig::load(file.path().to_str()).is_err());
}

#[test]
fn test_shipped_sample_config_is_valid() {
    let config = GatewayConfig::from_toml(include_str!("../../../config/gateway.toml")).unwrap();
    let defaults = GatewayConfig::default();

    assert_eq!(config.routes, defaults.routes);
    assert_eq!(config.endpoints.len(), defaults.endpoints.len());

    let inventory = config.endpoint_for("inventory.get").unwrap();
    assert_eq!(inventory.retry.max_attempts, 4);
    let reserve = config.endpoint_for("inventory.reserve").unwrap();
    assert!(!reserve.idempotent);
    assert_eq!(reserve.max_connections, Some(8));
    assert!(!config.endpoint_for("notification.send").unwrap().required);
}
