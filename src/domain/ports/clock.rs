//! Clock Port
//!
//! Wall-clock source for cache expiry, injectable for tests.

pub trait Clock: Send + Sync {
    /// Current time as unix milliseconds.
    fn now_ms(&self) -> u64;
}
