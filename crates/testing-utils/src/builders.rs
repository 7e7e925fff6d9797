//! Builders for gateway configurations used in tests
//!
//! The default test configuration routes the user capabilities to a sync
//! endpoint and `POST /notifications` to an async endpoint, with short
//! timeouts so failure paths finish quickly.

use gateway_core::{
    BrokerType, EndpointConfig, GatewayConfig, RetryConfig, RouteConfig, TransportKind,
};

pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

fn sync_endpoint(name: &str, capability: &str, idempotent: bool) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        service: "user-service".to_string(),
        capability: capability.to_string(),
        address: "http://user-service.test".to_string(),
        transport: TransportKind::SyncRpc,
        timeout_ms: 200,
        idempotent,
        required: true,
        event_type: None,
        max_connections: None,
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 5,
            max_backoff_ms: 20,
            multiplier: 2.0,
            jitter_factor: 0.0,
        },
    }
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        let mut config = GatewayConfig {
            endpoints: vec![
                sync_endpoint("user-service.get", "user.get", true),
                sync_endpoint("user-service.list", "user.list", true),
                sync_endpoint("user-service.create", "user.create", false),
                EndpointConfig {
                    name: "notification-service.send".to_string(),
                    service: "notification-service".to_string(),
                    capability: "notification.send".to_string(),
                    address: "notifications.send".to_string(),
                    transport: TransportKind::AsyncPublish,
                    timeout_ms: 200,
                    idempotent: false,
                    required: false,
                    event_type: Some("notification.requested".to_string()),
                    max_connections: None,
                    retry: RetryConfig::default(),
                },
            ],
            routes: vec![
                RouteConfig::new("GET", "/users/:id", "user.get"),
                RouteConfig::new("GET", "/users", "user.list"),
                RouteConfig::new("POST", "/users", "user.create"),
                RouteConfig::new("POST", "/notifications", "notification.send"),
            ],
            ..GatewayConfig::default()
        };
        config.server.default_deadline_ms = 2_000;
        config.pool.max_connections = 4;
        config.pool.acquire_timeout_ms = 200;
        config.pool.connect_timeout_ms = 200;
        config.circuit_breaker.failure_threshold = 3;
        config.circuit_breaker.cooldown_ms = 60_000;
        config.broker.r#type = BrokerType::InMemory;
        config.broker.ack_timeout_ms = 200;

        Self { config }
    }

    fn endpoint_mut(&mut self, capability: &str) -> &mut EndpointConfig {
        self.config
            .endpoints
            .iter_mut()
            .find(|e| e.capability == capability)
            .unwrap_or_else(|| panic!("no endpoint for capability {capability}"))
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.config.circuit_breaker.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.config.circuit_breaker.cooldown_ms = cooldown_ms;
        self.config.circuit_breaker.max_cooldown_ms = cooldown_ms * 10;
        self
    }

    pub fn with_max_attempts(mut self, capability: &str, max_attempts: u32) -> Self {
        self.endpoint_mut(capability).retry.max_attempts = max_attempts;
        self
    }

    pub fn with_endpoint_timeout_ms(mut self, capability: &str, timeout_ms: u64) -> Self {
        self.endpoint_mut(capability).timeout_ms = timeout_ms;
        self
    }

    pub fn with_pool_size(mut self, max_connections: usize) -> Self {
        self.config.pool.max_connections = max_connections;
        self
    }

    pub fn with_acquire_timeout_ms(mut self, acquire_timeout_ms: u64) -> Self {
        self.config.pool.acquire_timeout_ms = acquire_timeout_ms;
        self
    }

    pub fn with_ack_timeout_ms(mut self, ack_timeout_ms: u64) -> Self {
        self.config.broker.ack_timeout_ms = ack_timeout_ms;
        self
    }

    pub fn with_max_deadline_ms(mut self, max_deadline_ms: u64) -> Self {
        self.config.server.max_deadline_ms = max_deadline_ms;
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

impl Default for GatewayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
