use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Errored => "errored",
        }
    }

    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Errored, Connecting)
                | (Connecting, Connected)
                | (Connecting, Errored)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Connected, Errored)
                | (Errored, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub reconnect_exhausted: bool,
    pub last_error: Option<String>,
}

impl ChannelStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectBudget {
    attempts_made: u32,
    max_attempts: u32,
    interval: Duration,
}

impl ReconnectBudget {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            interval,
        }
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    // None once the budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts_made += 1;
        Some(self.interval)
    }

    pub fn reset(&mut self) {
        self.attempts_made = 0;
    }
}
