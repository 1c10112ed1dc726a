// lib: OS abstraction layer for the WILC network-interface driver.
// Provides the asynchronous TCP client plus thin file and math facades.

// Re-export core types
pub use wilc_core::*;

// Re-export transport abstractions
pub use wilc_transport::*;

pub mod config;
pub mod fileops;
pub mod math;
pub mod receiver;
pub mod socket;

pub use config::ConnectionConfig;
pub use receiver::{ContextReceiver, Receiver, ReceptionCallback};
pub use socket::Connection;
