//! Reconnect State Machine
//!
//! Single source of truth for the auth backend connection state and the
//! reconnect attempt budget. Pure: no timers, no sockets.

use std::time::Duration;

/// Reconnect policy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Retries allowed before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Delay for a retry scheduled after `attempts` previous retries:
    /// `min(base * 2^attempts, max)`.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket; a retry may be pending
    #[default]
    Disconnected,
    /// Connect in progress
    Connecting,
    /// Socket open, RPCs allowed
    Connected,
    /// Retry budget exhausted; waits for an external trigger
    PermanentlyFailed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::PermanentlyFailed => write!(f, "permanently-failed"),
        }
    }
}

/// What to do after a connection closed or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep `delay`, then run retry number `attempt`
    Retry { attempt: u32, delay: Duration },
    /// Budget exhausted
    GiveUp,
}

/// Reconnect finite state machine.
#[derive(Debug)]
pub struct ReconnectMachine {
    config: ReconnectConfig,
    state: ConnectionState,
    attempts: u32,
}

impl ReconnectMachine {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Disconnected -> Connecting.
    ///
    /// Returns false (and changes nothing) from any other state, so at most
    /// one connect is ever in flight.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Connecting -> Connected. Resets the attempt counter.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
    }

    /// The socket closed, errored or failed to connect.
    ///
    /// Increments the attempt counter before returning a retry.
    pub fn on_disconnected(&mut self) -> RetryDecision {
        if self.attempts >= self.config.max_attempts {
            self.state = ConnectionState::PermanentlyFailed;
            return RetryDecision::GiveUp;
        }

        self.state = ConnectionState::Disconnected;
        let delay = self.config.backoff_delay(self.attempts);
        self.attempts += 1;
        RetryDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// External reconnect trigger: back to Disconnected with a fresh budget.
    ///
    /// Returns false when already connected or connecting.
    pub fn reset(&mut self) -> bool {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => false,
            ConnectionState::Disconnected | ConnectionState::PermanentlyFailed => {
                self.state = ConnectionState::Disconnected;
                self.attempts = 0;
                true
            }
        }
    }

    /// Shutdown: Disconnected, no retries.
    pub fn on_shutdown(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for ReconnectMachine {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
