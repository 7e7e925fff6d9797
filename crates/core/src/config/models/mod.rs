pub mod api_observability;
pub mod app_config;
pub mod endpoints;
pub mod message_queue;
pub mod resilience;

pub use api_observability::{LogFormat, ObservabilityConfig, ServerConfig};
pub use app_config::GatewayConfig;
pub use endpoints::{EndpointConfig, RouteConfig, TransportKind};
pub use message_queue::{BrokerConfig, BrokerType};
pub use resilience::{PoolConfig, RetryConfig};
