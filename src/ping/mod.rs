mod cancel;
mod pinger;
mod probe;
mod stats;

pub use cancel::CancelToken;
pub use pinger::*;
pub use probe::{ProbeSession, ProbeSettings};
pub use stats::PingStats;

use crate::error::PingError;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc::SyncSender;
use std::time::Duration;

/// Per-probe receive deadline.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pacing between the starts of consecutive probes.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(1);

/// Which received datagrams complete a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyFilter {
    /// Echo Reply with code 0 carrying this session's identifier and the
    /// probe's sequence number.
    Strict,
    /// Any Echo Reply on the socket. Cheaper, but a stale or unrelated reply
    /// can complete the probe and report a wrong delay.
    AnyEchoReply,
}

/// Outcome of one probe.
#[derive(Debug)]
pub struct ProbeResult {
    /// Resolved address, or the input string if resolution failed
    pub destination: String,
    /// Probe number within the session, starting at 0
    pub sequence: u64,
    /// Round-trip time; zero unless the probe succeeded
    pub delay: Duration,
    /// Why the probe failed; `None` on success
    pub error: Option<PingError>,
    /// Bytes of the echo request handed to the socket
    pub bytes_written: usize,
    /// Size of the datagram that completed the probe
    pub bytes_read: usize,
}

impl ProbeResult {
    /// True if a matching reply arrived.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True if no matching reply arrived before the receive timeout.
    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().map_or(false, PingError::is_timeout)
    }

    /// Round-trip time of a successful probe.
    pub fn rtt(&self) -> Option<Duration> {
        self.is_success().then_some(self.delay)
    }

    pub(crate) fn failure(destination: String, sequence: u64, error: PingError) -> ProbeResult {
        ProbeResult {
            destination,
            sequence,
            delay: Duration::ZERO,
            error: Some(error),
            bytes_written: 0,
            bytes_read: 0,
        }
    }

    fn is_write_failure(&self) -> bool {
        matches!(
            self.error,
            Some(PingError::Write(_)) | Some(PingError::ShortWrite { .. })
        )
    }
}

/// Sends one echo request to `destination` and returns the round-trip time.
///
/// Uses [`Pinger`] defaults: 64-byte request, one second receive timeout and
/// [`ReplyFilter::Strict`] matching.
pub fn ping_once(destination: &str) -> Result<Duration, PingError> {
    Pinger::new(destination).ping_once()
}

/// Pings `destination` `count` times (forever if `count` is 0), sending one
/// [`ProbeResult`] per probe into `sink`. Probes start at least `pacing`
/// apart.
///
/// Returns once all probes are done; `sink` is dropped on return, which
/// closes the stream. An unbounded run only stops when the receiver is
/// dropped; use [`Pinger::ping_until`] with a [`CancelToken`] to stop it
/// explicitly.
pub fn ping_until(destination: &str, count: u64, sink: SyncSender<ProbeResult>, pacing: Duration) {
    let mut pinger = Pinger::new(destination);
    pinger.set_probe_count(count);
    pinger.set_send_interval(pacing);
    pinger.ping_until(sink, &CancelToken::new());
}

pub(crate) fn resolve(destination: &str) -> Result<Ipv4Addr, PingError> {
    if let Ok(ip) = destination.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    let addrs = dns_lookup::lookup_host(destination).map_err(|source| PingError::Resolution {
        destination: destination.to_string(),
        source,
    })?;
    addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| PingError::Resolution {
            destination: destination.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no IPv4 address"),
        })
}
