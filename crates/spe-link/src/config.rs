//! Link configuration

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use spe_protocol::CommandCode;

use crate::error::LinkError;

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default number of silent poll ticks before the display is reset
pub const DEFAULT_WATCHDOG_TICKS: u32 = 10;

/// Which request each poll tick sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollPolicy {
    /// Always request the screen image
    ///
    /// The screen carries the LED byte and everything shown on the panel,
    /// which is all a remote front panel needs.
    #[default]
    ScreenOnly,
    /// Always request the status record
    StatusOnly,
    /// Alternate screen and status requests, screen first
    Alternate,
}

impl PollPolicy {
    /// Poll command for the `n`th tick (counting from zero)
    pub fn poll_for(self, n: u64) -> CommandCode {
        match self {
            PollPolicy::ScreenOnly => CommandCode::ScreenDump,
            PollPolicy::StatusOnly => CommandCode::Status,
            PollPolicy::Alternate if n % 2 == 0 => CommandCode::ScreenDump,
            PollPolicy::Alternate => CommandCode::Status,
        }
    }
}

impl FromStr for PollPolicy {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screen-only" | "screen" => Ok(PollPolicy::ScreenOnly),
            "status-only" | "status" => Ok(PollPolicy::StatusOnly),
            "alternate" => Ok(PollPolicy::Alternate),
            other => Err(LinkError::InvalidConfig(format!(
                "unknown poll policy '{other}' (expected screen-only, status-only or alternate)"
            ))),
        }
    }
}

/// Engine-side session configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Interval between poll ticks
    pub poll_interval_ms: u64,
    /// Silent ticks tolerated before the placeholder screen is shown
    pub watchdog_ticks: u32,
    /// Which poll request to send on each tick
    pub poll_policy: PollPolicy,
    /// Capacity of the event channel; events are dropped when it is full
    pub event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            watchdog_ticks: DEFAULT_WATCHDOG_TICKS,
            poll_policy: PollPolicy::default(),
            event_capacity: 64,
        }
    }
}

impl LinkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check values that would make a session unusable
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.poll_interval_ms == 0 {
            return Err(LinkError::InvalidConfig(
                "poll interval must be at least 1 ms".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(LinkError::InvalidConfig(
                "event capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
