pub mod broker_factory;
pub mod http_transport;
pub mod in_memory_broker;
pub mod observability;
pub mod rabbitmq_broker;

pub use broker_factory::*;
pub use http_transport::*;
pub use in_memory_broker::*;
pub use observability::*;
pub use rabbitmq_broker::*;
