pub mod capabilities;
pub mod entities;
pub mod envelope;
pub mod health;
pub mod ports;

pub use capabilities::*;
pub use entities::*;
pub use envelope::*;
pub use gateway_core::{DispatchError, GatewayResult};
pub use health::*;
pub use ports::*;
