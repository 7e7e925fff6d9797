use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    api_observability::{ObservabilityConfig, ServerConfig},
    endpoints::{EndpointConfig, RouteConfig, TransportKind},
    message_queue::BrokerConfig,
    resilience::{PoolConfig, RetryConfig},
};
use crate::circuit_breaker::CircuitBreakerConfig;

/// 路由表不能占用的网关自身路径
const RESERVED_PATHS: [&str; 2] = ["", "/health"];

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub broker: BrokerConfig,
    pub observability: ObservabilityConfig,
    pub endpoints: Vec<EndpointConfig>,
    pub routes: Vec<RouteConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            pool: PoolConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            broker: BrokerConfig::default(),
            observability: ObservabilityConfig::default(),
            endpoints: default_endpoints(),
            routes: default_routes(),
        }
    }
}

fn sync_endpoint(
    name: &str,
    service: &str,
    capability: &str,
    address: &str,
    idempotent: bool,
) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        service: service.to_string(),
        capability: capability.to_string(),
        address: address.to_string(),
        transport: TransportKind::SyncRpc,
        timeout_ms: 2_000,
        idempotent,
        required: true,
        event_type: None,
        max_connections: None,
        retry: RetryConfig::default(),
    }
}

/// 四个下游服务的默认端点，端口与各服务的监听端口一致
fn default_endpoints() -> Vec<EndpointConfig> {
    let user = "http://localhost:50054";
    let order = "http://localhost:50053";
    let inventory = "http://localhost:50051";

    vec![
        sync_endpoint("user-service.get", "user-service", "user.get", user, true),
        sync_endpoint("user-service.list", "user-service", "user.list", user, true),
        sync_endpoint("user-service.create", "user-service", "user.create", user, false),
        sync_endpoint("order-service.get", "order-service", "order.get", order, true),
        sync_endpoint("order-service.create", "order-service", "order.create", order, false),
        sync_endpoint("inventory-service.get", "inventory-service", "inventory.get", inventory, true),
        sync_endpoint(
            "inventory-service.reserve",
            "inventory-service",
            "inventory.reserve",
            inventory,
            false,
        ),
        EndpointConfig {
            name: "notification-service.send".to_string(),
            service: "notification-service".to_string(),
            capability: "notification.send".to_string(),
            address: "notifications.send".to_string(),
            transport: TransportKind::AsyncPublish,
            timeout_ms: 2_000,
            idempotent: false,
            required: false,
            event_type: Some("notification.requested".to_string()),
            max_connections: None,
            retry: RetryConfig::default(),
        },
    ]
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("GET", "/users", "user.list"),
        RouteConfig::new("GET", "/users/:id", "user.get"),
        RouteConfig::new("POST", "/users", "user.create"),
        RouteConfig::new("GET", "/orders/:id", "order.get"),
        RouteConfig::new("POST", "/orders", "order.create"),
        RouteConfig::new("GET", "/inventory/:sku", "inventory.get"),
        RouteConfig::new("POST", "/inventory/reservations", "inventory.reserve"),
        RouteConfig::new("POST", "/notifications", "notification.send"),
    ]
}

impl GatewayConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: GATEWAY_, nesting: __)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/gateway.toml",
                "gateway.toml",
                "/etc/gateway/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: GatewayConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 查找能力对应的端点
    pub fn endpoint_for(&self, capability: &str) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.capability == capability)
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.server.validate().context("服务配置验证失败")?;
        self.pool.validate().context("连接池配置验证失败")?;
        self.circuit_breaker
            .validate()
            .context("熔断器配置验证失败")?;
        self.broker.validate().context("消息代理配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        let mut names = HashSet::new();
        let mut capabilities = HashSet::new();
        for endpoint in &self.endpoints {
            endpoint.validate().context("端点配置验证失败")?;
            if !names.insert(endpoint.name.as_str()) {
                return Err(anyhow::anyhow!("端点名称重复: {}", endpoint.name));
            }
            if !capabilities.insert(endpoint.capability.as_str()) {
                return Err(anyhow::anyhow!(
                    "能力 {} 配置了多个端点",
                    endpoint.capability
                ));
            }
        }

        for route in &self.routes {
            route.validate().context("路由配置验证失败")?;
            if RESERVED_PATHS.contains(&route.path.trim_end_matches('/')) {
                return Err(anyhow::anyhow!("路由路径 {} 为网关保留路径", route.path));
            }
            if !capabilities.contains(route.capability.as_str()) {
                return Err(anyhow::anyhow!(
                    "路由 {} {} 引用的能力 {} 没有对应端点",
                    route.method,
                    route.path,
                    route.capability
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
bind_address = "127.0.0.1:9000"
default_deadline_ms = 2000

[circuit_breaker]
failure_threshold = 5

[broker]
type = "in_memory"

[[endpoints]]
name = "user-service.get"
service = "user-service"
capability = "user.get"
address = "http://user-service:50054"
transport = "sync_rpc"
timeout_ms = 1500
idempotent = true

[endpoints.retry]
max_attempts = 4

[[routes]]
method = "GET"
path = "/users/:id"
capability = "user.get"
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.endpoints.len(), 8);
        assert!(config.endpoint_for("notification.send").is_some());
    }

    #[test]
    fn test_from_toml_overrides_defaults() {
        let config = GatewayConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.server.max_deadline_ms, 30_000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.cooldown_ms, 30_000);
        assert_eq!(config.endpoints.len(), 1);

        let endpoint = config.endpoint_for("user.get").unwrap();
        assert_eq!(endpoint.timeout_ms, 1500);
        assert_eq!(endpoint.retry.max_attempts, 4);
        assert_eq!(endpoint.retry.initial_backoff_ms, 50);
        assert!(endpoint.required);
    }

    #[test]
    fn test_route_without_endpoint_is_rejected() {
        let mut config = GatewayConfig::default();
        config
            .routes
            .push(RouteConfig::new("GET", "/payments/:id", "payment.get"));
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("payment.get"));
    }

    #[test]
    fn test_duplicate_endpoint_names_are_rejected() {
        let mut config = GatewayConfig::default();
        let mut duplicate = config.endpoints[0].clone();
        duplicate.capability = "user.other".to_string();
        config.endpoints.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reserved_paths_are_rejected() {
        let mut config = GatewayConfig::default();
        config
            .routes
            .push(RouteConfig::new("GET", "/health", "user.list"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = GatewayConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = GatewayConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.routes, config.routes);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = GatewayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.routes[0].path, "/users/:id");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(GatewayConfig::load(Some("/nonexistent/gateway.toml")).is_err());
    }
}
