use super::ProbeResult;
use std::time::Duration;

/// Running totals over a stream of probe results.
#[derive(Clone, Debug, Default)]
pub struct PingStats {
    pub sent: u64,
    pub received: u64,
    pub min_rtt: Option<Duration>,
    pub max_rtt: Option<Duration>,
    rtt_sum: Duration,
}

impl PingStats {
    pub fn new() -> PingStats {
        PingStats::default()
    }

    pub fn record(&mut self, result: &ProbeResult) {
        self.sent += 1;
        if let Some(rtt) = result.rtt() {
            self.received += 1;
            self.rtt_sum += rtt;
            self.min_rtt = Some(self.min_rtt.map_or(rtt, |m| m.min(rtt)));
            self.max_rtt = Some(self.max_rtt.map_or(rtt, |m| m.max(rtt)));
        }
    }

    pub fn lost(&self) -> u64 {
        self.sent - self.received
    }

    /// Share of probes without a reply, in percent.
    pub fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.lost() as f64 * 100.0 / self.sent as f64
    }

    pub fn avg_rtt(&self) -> Option<Duration> {
        u32::try_from(self.received)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.rtt_sum / n)
    }
}
