//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod reconnect;
pub mod shutdown;

pub use reconnect::{ConnectionState, ReconnectConfig, ReconnectMachine, RetryDecision};
pub use shutdown::{shutdown_signal, ShutdownController};
