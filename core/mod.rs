// Core module: endpoint, connection state and error types (NO I/O dependencies)
pub mod types;
pub mod error;

pub use types::*;
pub use error::*;
