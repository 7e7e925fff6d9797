pub mod messaging;
pub mod transport;

pub use messaging::*;
pub use transport::*;
