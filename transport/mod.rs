// Transport module: stream abstraction, TCP backend and in-memory test double
pub mod traits;
pub mod tcp;
pub mod mock;

pub use traits::*;
pub use tcp::*;
