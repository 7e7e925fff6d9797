pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod errors;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitState};
pub use config::models::*;
pub use context::RequestContext;
pub use errors::*;

/// 统一的Result类型
pub type GatewayResult<T> = std::result::Result<T, DispatchError>;
