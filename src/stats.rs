use std::convert::TryFrom;
use std::time::Duration;

/// Running totals for one session.
#[derive(Debug, Default)]
pub struct SessionStats {
    successes: u64,
    failures: u64,
    consecutive_failures: u32,
    min_rtt: Option<Duration>,
    max_rtt: Duration,
    sum_rtt: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RttSummary {
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub sent: u64,
    pub received: u64,
    pub lost: u64,
    pub loss_percent: f64,
    /// Absent when no reply came back.
    pub rtt: Option<RttSummary>,
}

impl SessionStats {
    pub fn record_success(&mut self, rtt: Duration) {
        self.successes += 1;
        self.consecutive_failures = 0;
        self.min_rtt = Some(self.min_rtt.map_or(rtt, |min| min.min(rtt)));
        self.max_rtt = self.max_rtt.max(rtt);
        self.sum_rtt += rtt;
    }

    /// Returns the length of the current failure streak.
    pub fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    fn avg_rtt(&self) -> Duration {
        if self.successes == 0 {
            return Duration::from_secs(0);
        }
        let nanos = self.sum_rtt.as_nanos() / u128::from(self.successes);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    pub fn summary(&self) -> Summary {
        let sent = self.successes + self.failures;
        let loss_percent = if sent == 0 {
            0.0
        } else {
            (self.failures * 100) as f64 / sent as f64
        };

        let rtt = self.min_rtt.map(|min| RttSummary {
            min,
            max: self.max_rtt,
            avg: self.avg_rtt(),
        });

        Summary {
            sent,
            received: self.successes,
            lost: self.failures,
            loss_percent,
            rtt,
        }
    }
}
