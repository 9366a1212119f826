use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while pinging a destination.
///
/// `Resolution`, `Connection` and `InvalidConfig` end a session. The others
/// describe a single failed probe; the session goes on with the next one.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("failed to resolve {destination}: {source}")]
    Resolution {
        destination: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to open ICMP socket: {0}")]
    Connection(#[source] io::Error),
    #[error("failed to send echo request: {0}")]
    Write(#[source] io::Error),
    #[error("short write: sent {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to read echo reply: {0}")]
    Read(#[source] io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PingError {
    /// True if no matching reply arrived before the receive deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PingError::Timeout(_))
    }

    /// True if the error ends the whole session rather than one probe.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PingError::Resolution { .. } | PingError::Connection(_) | PingError::InvalidConfig(_)
        )
    }

    /// Maps a socket read failure, treating an expired read timeout as a
    /// timeout rather than an I/O error.
    pub(crate) fn from_read(err: io::Error, timeout: Duration) -> PingError {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => PingError::Timeout(timeout),
            _ => PingError::Read(err),
        }
    }
}
