use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{PingError, Result};
use crate::packet::{ICMP_HEADER_LEN, IPV4_HEADER_LEN};

/// Upper bound for the reply timeout and the pause between requests.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest payload that still fits a single IPv4 datagram.
pub const MAX_PAYLOAD_SIZE: usize = 65535 - IPV4_HEADER_LEN - ICMP_HEADER_LEN;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Iterations {
    Count(u32),
    UntilStopped,
}

/// How sequence numbers are assigned to outgoing requests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SequencePolicy {
    /// Every request carries sequence number 1.
    Constant,
    /// 1, 2, 3, ... wrapping around and skipping 0.
    Incrementing,
}

impl SequencePolicy {
    pub fn first(self) -> u16 {
        1
    }

    pub fn next(self, current: u16) -> u16 {
        match self {
            SequencePolicy::Constant => 1,
            SequencePolicy::Incrementing => match current.wrapping_add(1) {
                0 => 1,
                n => n,
            },
        }
    }
}

/// Everything a session needs, fixed before the first request goes out.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Host name or address as given on the command line.
    pub target: String,
    pub address: Ipv4Addr,
    pub timeout: Duration,
    pub iterations: Iterations,
    pub payload_size: usize,
    pub max_consecutive_failures: u32,
    /// Pause after each successful reply.
    pub interval: Duration,
    pub sequence_policy: SequencePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            target: String::from("127.0.0.1"),
            address: Ipv4Addr::LOCALHOST,
            timeout: Duration::from_millis(1500),
            iterations: Iterations::Count(4),
            payload_size: 32,
            max_consecutive_failures: 10,
            interval: Duration::from_secs(1),
            sequence_policy: SequencePolicy::Constant,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(PingError::InvalidConfig(format!(
                "payload size {} exceeds {} bytes",
                self.payload_size, MAX_PAYLOAD_SIZE
            )));
        }
        if self.max_consecutive_failures == 0 {
            return Err(PingError::InvalidConfig(
                "consecutive failure limit must be at least 1".to_string(),
            ));
        }
        if self.timeout == Duration::from_secs(0) {
            return Err(PingError::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.timeout > MAX_WAIT {
            return Err(PingError::InvalidConfig(format!(
                "timeout {} exceeds {}",
                humantime::format_duration(self.timeout),
                humantime::format_duration(MAX_WAIT)
            )));
        }
        if self.interval > MAX_WAIT {
            return Err(PingError::InvalidConfig(format!(
                "interval {} exceeds {}",
                humantime::format_duration(self.interval),
                humantime::format_duration(MAX_WAIT)
            )));
        }
        Ok(())
    }
}

/// Parse a duration flag. A bare integer is read in `unit`, anything else
/// goes through humantime (`750ms`, `2s`, `1m 30s`).
pub fn parse_duration(value: &str, unit: Duration) -> Result<Duration> {
    if let Ok(n) = value.trim().parse::<u32>() {
        return Ok(unit * n);
    }
    humantime::parse_duration(value)
        .map_err(|e| PingError::InvalidConfig(format!("bad duration {:?}: {}", value, e)))
}
