//! Connection state machine.
//!
//! Transitions are plain methods returning the side effect the driver must
//! carry out, so the whole retry policy can be exercised without a socket
//! or a clock.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Public connection state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Retries exhausted; only an explicit connect leaves this state.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Exponential backoff with a ceiling and a retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect.
    pub base: Duration,

    /// Upper bound on any delay.
    pub max_delay: Duration,

    /// Consecutive failed reconnects before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect number `attempt` (zero-based):
    /// `min(base * 2^attempt, max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

/// What the driver has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Start a connection attempt and arm the connection timeout.
    Open,
    /// Arm the reconnect timer.
    ScheduleReconnect(Duration),
    /// Retries are exhausted; the machine is now in `Error`.
    GiveUp,
}

/// Connection lifecycle and retry bookkeeping.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    shutting_down: bool,
    auto_reconnect: bool,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy, auto_reconnect: bool) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            shutting_down: false,
            auto_reconnect,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnects scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Explicit connect request.
    ///
    /// No-op while a connection is open or being opened. Coming out of
    /// `Error` or a deliberate disconnect starts a fresh retry budget.
    pub fn connect(&mut self) -> Effect {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => Effect::None,
            ConnectionState::Disconnected | ConnectionState::Error => {
                if self.state == ConnectionState::Error || self.shutting_down {
                    self.attempts = 0;
                }
                self.shutting_down = false;
                self.state = ConnectionState::Connecting;
                Effect::Open
            }
        }
    }

    /// The reconnect timer fired.
    pub fn reconnect_due(&mut self) -> Effect {
        if self.shutting_down || self.state != ConnectionState::Disconnected {
            return Effect::None;
        }
        self.state = ConnectionState::Connecting;
        Effect::Open
    }

    /// The connection attempt succeeded.
    pub fn opened(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Connected;
    }

    /// The connection closed, failed to open, or timed out.
    pub fn closed(&mut self) -> Effect {
        self.state = ConnectionState::Disconnected;

        if self.shutting_down || !self.auto_reconnect {
            return Effect::None;
        }

        if self.attempts >= self.policy.max_attempts {
            self.state = ConnectionState::Error;
            return Effect::GiveUp;
        }

        let delay = self.policy.delay(self.attempts);
        self.attempts += 1;
        Effect::ScheduleReconnect(delay)
    }

    /// Deliberate disconnect; suppresses reconnects until the next `connect`.
    pub fn disconnect(&mut self) {
        self.shutting_down = true;
        self.state = ConnectionState::Disconnected;
    }
}
