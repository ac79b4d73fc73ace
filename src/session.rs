use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use rand::random;

use crate::config::{Iterations, SessionConfig};
use crate::error::{PingError, Result};
use crate::packet;
use crate::ping::{Pong, ReplyType, Transport};
use crate::stats::{SessionStats, Summary};

/// What happened to one attempt, or to the run as a whole.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Reply {
        timestamp: SystemTime,
        from: Ipv4Addr,
        bytes: usize,
        rtt: Duration,
        ttl: u8,
        sequence: u16,
    },
    Timeout {
        attempt: u64,
    },
    ErrorReply {
        attempt: u64,
        from: Ipv4Addr,
        kind: ReplyType,
    },
    ReceiveFailed {
        attempt: u64,
        reason: String,
    },
    GaveUp {
        consecutive_failures: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Flow {
    Replied,
    Failed,
    Abort,
}

/// Drives one synchronous request/reply loop against a single target.
pub struct Session<'a, T> {
    config: &'a SessionConfig,
    transport: T,
    identifier: u16,
    sequence: u16,
    stats: SessionStats,
    sleep: Box<dyn FnMut(Duration) + 'a>,
}

impl<'a, T: Transport> Session<'a, T> {
    pub fn new(config: &'a SessionConfig, transport: T) -> Self {
        Session {
            config,
            transport,
            identifier: random::<u16>(),
            sequence: config.sequence_policy.first(),
            stats: SessionStats::default(),
            sleep: Box::new(thread::sleep),
        }
    }

    /// Replace how the pause after a reply is spent (`thread::sleep` by default).
    pub fn with_pause<P>(mut self, pause: P) -> Self
    where
        P: FnMut(Duration) + 'a,
    {
        self.sleep = Box::new(pause);
        self
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Run until the iteration budget is spent, the consecutive failure limit
    /// is hit, or `stop` is raised. `stop` is only looked at between attempts.
    ///
    /// A failed send ends the run with an error and no summary. The transport
    /// is dropped on return either way.
    pub fn run<F>(mut self, stop: &AtomicBool, mut on_event: F) -> Result<Summary>
    where
        F: FnMut(Event),
    {
        tracing::debug!(
            "session start: target={} identifier={:#06x} iterations={:?}",
            self.config.address,
            self.identifier,
            self.config.iterations
        );

        match self.config.iterations {
            Iterations::Count(count) => {
                let count = u64::from(count);
                for attempt in 1..=count {
                    if stop.load(Ordering::SeqCst) {
                        tracing::debug!("stop requested before attempt {}", attempt);
                        break;
                    }
                    match self.attempt(attempt, &mut on_event)? {
                        Flow::Abort => break,
                        Flow::Replied if attempt < count => self.pause(),
                        _ => {}
                    }
                }
            }
            Iterations::UntilStopped => {
                let mut attempt = 0;
                while !stop.load(Ordering::SeqCst) {
                    attempt += 1;
                    match self.attempt(attempt, &mut on_event)? {
                        Flow::Abort => break,
                        Flow::Replied => self.pause(),
                        Flow::Failed => {}
                    }
                }
            }
        }

        let summary = self.stats.summary();
        tracing::debug!("session end: {:?}", summary);
        Ok(summary)
    }

    fn attempt<F>(&mut self, attempt: u64, on_event: &mut F) -> Result<Flow>
    where
        F: FnMut(Event),
    {
        let sequence = self.sequence;
        self.sequence = self.config.sequence_policy.next(sequence);

        let data = packet::build_echo_request(self.identifier, sequence, self.config.payload_size);

        let sent_at = Instant::now();
        self.transport.send(&data).map_err(PingError::Send)?;
        tracing::trace!("attempt {}: sent seq={}", attempt, sequence);

        let deadline = sent_at + self.config.timeout;
        let received = self.transport.receive(self.identifier, sequence, deadline);
        let rtt = sent_at.elapsed();

        let flow = match received {
            Ok(Some(Pong { kind: ReplyType::EchoReply, from, ttl, size })) => {
                self.stats.record_success(rtt);
                on_event(Event::Reply {
                    timestamp: SystemTime::now(),
                    from,
                    bytes: size,
                    rtt,
                    ttl,
                    sequence,
                });
                Flow::Replied
            }
            Ok(Some(Pong { kind, from, .. })) => {
                on_event(Event::ErrorReply { attempt, from, kind });
                self.fail(on_event)
            }
            Ok(None) => {
                on_event(Event::Timeout { attempt });
                self.fail(on_event)
            }
            Err(e) => {
                tracing::warn!("attempt {}: receive failed: {}", attempt, e);
                on_event(Event::ReceiveFailed { attempt, reason: e.to_string() });
                self.fail(on_event)
            }
        };
        Ok(flow)
    }

    fn fail<F>(&mut self, on_event: &mut F) -> Flow
    where
        F: FnMut(Event),
    {
        let consecutive_failures = self.stats.record_failure();
        if consecutive_failures >= self.config.max_consecutive_failures {
            tracing::debug!("giving up after {} consecutive failures", consecutive_failures);
            on_event(Event::GaveUp { consecutive_failures });
            Flow::Abort
        } else {
            Flow::Failed
        }
    }

    fn pause(&mut self) {
        if self.config.interval > Duration::from_secs(0) {
            (self.sleep)(self.config.interval);
        }
    }
}
