//! ICMP echo (ping) client.
//!
//! ```no_run
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! // One probe.
//! let rtt = echoping::ping_once("192.0.2.1")?;
//! println!("time={:?}", rtt);
//!
//! // Ten probes, one per second.
//! let (tx, rx) = mpsc::sync_channel(100);
//! std::thread::spawn(move || echoping::ping_until("192.0.2.1", 10, tx, Duration::from_secs(1)));
//! for r in rx {
//!     println!("icmp_seq={} {:?}", r.sequence, r.rtt());
//! }
//! # Ok::<(), echoping::PingError>(())
//! ```
//!
//! Raw ICMP sockets usually need elevated privilege. When they cannot be
//! opened, a datagram ICMP socket is tried instead.

pub mod error;
pub mod packet;
pub mod ping;
pub mod socket;

pub use error::PingError;
pub use ping::{
    ping_once, ping_until, CancelToken, PingStats, PingStream, Pinger, ProbeResult, ProbeSession,
    ProbeSettings, ReplyFilter,
};
pub use socket::Transport;
