pub mod circuit_breaker;
pub mod dispatch_core;
pub mod health;
pub mod metrics;
pub mod pool;
pub mod publisher;
pub mod retry;
pub mod router;
pub mod sync_dispatch;
pub mod timeout;

pub use circuit_breaker::{CircuitPermit, HealthRecord};
pub use dispatch_core::{DispatchCore, DispatchOutcome, InboundRequest};
pub use health::{aggregate_status, HealthAggregator};
pub use pool::{ConnectionPool, PoolError, PooledConnection};
pub use publisher::Publisher;
pub use router::{Router, RouterError};
pub use sync_dispatch::SyncEndpoint;
