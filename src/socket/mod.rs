pub mod icmp;

use std::io;
use std::time::Duration;

/// A connected datagram channel to one destination.
///
/// [`icmp::IcmpSocket`] is the real implementation; the probe engine is
/// generic over this trait so it can run against in-memory responders too.
pub trait Transport {
    /// Sends one packet, returning the number of bytes written.
    fn send(&mut self, packet: &[u8]) -> io::Result<usize>;

    /// Waits at most `timeout` for one datagram and copies it into `buf`.
    ///
    /// An expired timeout is reported as `WouldBlock` or `TimedOut`.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// True if the kernel replaces the echo identifier with its own value.
    ///
    /// Linux datagram ICMP sockets do this and only deliver replies that
    /// match, so the identifier cannot be compared on receive.
    fn rewrites_identifier(&self) -> bool {
        false
    }
}
