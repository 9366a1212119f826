use super::{
    resolve, CancelToken, ProbeResult, ProbeSession, ProbeSettings, ReplyFilter,
    DEFAULT_RECEIVE_TIMEOUT, DEFAULT_SEND_INTERVAL,
};
use crate::error::PingError;
use crate::packet::{DEFAULT_FILLER, DEFAULT_PACKET_LEN};
use crate::socket::icmp::{IcmpConfig, IcmpSocket, IcmpSocketType};
use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration and execution context for pinging one destination.
#[derive(Clone, Debug)]
pub struct Pinger {
    /// Host name or IPv4 address.
    pub destination: String,
    /// Echo identifier. Random per `Pinger` by default.
    pub identifier: u16,
    /// Number of probes for [`Pinger::ping_until`]; 0 means no limit. Default is `4`.
    pub probe_count: u64,
    /// Minimum time between the starts of consecutive probes.
    pub send_interval: Duration,
    /// Timeout for receiving each probe response.
    pub receive_timeout: Duration,
    /// Total echo request length, ICMP header included. Default is `64`.
    pub packet_len: usize,
    /// Payload pattern.
    pub filler: Vec<u8>,
    /// Time to live (TTL). The OS default is used if unset.
    pub ttl: Option<u32>,
    /// Preferred socket type; the other type is tried if it is unavailable.
    pub sock_type: IcmpSocketType,
    /// Which replies complete a probe. Default is [`ReplyFilter::Strict`].
    pub reply_filter: ReplyFilter,
    /// Check the ICMP checksum of replies.
    pub verify_checksum: bool,
}

impl Pinger {
    /// Creates a new `Pinger` for `destination`. Nothing is resolved until a
    /// ping runs.
    pub fn new(destination: impl Into<String>) -> Pinger {
        Pinger {
            destination: destination.into(),
            identifier: rand::random::<u16>(),
            probe_count: 4,
            send_interval: DEFAULT_SEND_INTERVAL,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            packet_len: DEFAULT_PACKET_LEN,
            filler: DEFAULT_FILLER.to_vec(),
            ttl: None,
            sock_type: IcmpSocketType::Raw,
            reply_filter: ReplyFilter::Strict,
            verify_checksum: false,
        }
    }

    /// Sends a single echo request (sequence 0) and returns the round-trip
    /// time.
    ///
    /// With [`ReplyFilter::AnyEchoReply`] the first Echo Reply seen on the
    /// socket is accepted whatever its identifier and sequence.
    pub fn ping_once(&self) -> Result<Duration, PingError> {
        let settings = self.probe_settings();
        settings.validate()?;
        let (destination, socket) = self.connect().map_err(|(_, e)| e)?;
        let mut session = ProbeSession::new(destination, socket, settings)?;
        let result = session.probe();
        match result.error {
            Some(e) => Err(e),
            None => Ok(result.delay),
        }
    }

    /// Runs [`Pinger::probe_count`] probes, sending each result into `sink`.
    ///
    /// Invalid settings, resolution failure and socket failure are reported
    /// as a single result with sequence 0, after which the stream closes
    /// without any probe sent. The stream also closes once `cancel` fires or
    /// the receiver is dropped.
    pub fn ping_until(&self, sink: SyncSender<ProbeResult>, cancel: &CancelToken) {
        let settings = self.probe_settings();
        let started = settings
            .validate()
            .map_err(|e| (self.destination.clone(), e))
            .and_then(|_| self.connect())
            .and_then(|(destination, socket)| {
                ProbeSession::new(destination.clone(), socket, settings)
                    .map_err(|e| (destination, e))
            });
        match started {
            Ok(mut session) => session.run(self.probe_count, self.send_interval, &sink, cancel),
            Err((destination, e)) => {
                log::warn!("{}: {}", destination, e);
                let _ = sink.send(ProbeResult::failure(destination, 0, e));
            }
        }
    }

    /// Runs [`Pinger::ping_until`] on a background thread, buffering up to
    /// `capacity` results. A reader slower than that holds the session back.
    pub fn spawn(self, capacity: usize) -> io::Result<PingStream> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("ping {}", self.destination))
            .spawn(move || self.ping_until(tx, &token))?;
        Ok(PingStream {
            receiver: rx,
            cancel,
            handle: Some(handle),
        })
    }

    /// Settings a session started from this `Pinger` would use.
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            identifier: self.identifier,
            packet_len: self.packet_len,
            filler: self.filler.clone(),
            receive_timeout: self.receive_timeout,
            reply_filter: self.reply_filter,
            verify_checksum: self.verify_checksum,
        }
    }

    /// Resolves the destination and opens a socket to it. On failure, also
    /// returns the name the failure should be reported under.
    fn connect(&self) -> Result<(String, IcmpSocket), (String, PingError)> {
        let ip = resolve(&self.destination).map_err(|e| (self.destination.clone(), e))?;
        let config = IcmpConfig {
            ttl: self.ttl,
            sock_type_hint: self.sock_type,
            ..IcmpConfig::default()
        };
        let socket = IcmpSocket::open(ip, &config)
            .map_err(|e| (ip.to_string(), PingError::Connection(e)))?;
        log::debug!(
            "{}: resolved to {} using {:?} socket",
            self.destination,
            ip,
            socket.sock_type()
        );
        Ok((ip.to_string(), socket))
    }

    /// Sets the destination.
    pub fn set_destination(&mut self, destination: impl Into<String>) {
        self.destination = destination.into();
    }
    /// Returns the destination.
    pub fn get_destination(&self) -> &str {
        &self.destination
    }
    /// Sets the echo identifier.
    pub fn set_identifier(&mut self, identifier: u16) {
        self.identifier = identifier;
    }
    /// Returns the echo identifier.
    pub fn get_identifier(&self) -> u16 {
        self.identifier
    }
    /// Sets the number of probes to send, 0 for no limit.
    pub fn set_probe_count(&mut self, probe_count: u64) {
        self.probe_count = probe_count;
    }
    /// Returns the number of probes to send.
    pub fn get_probe_count(&self) -> u64 {
        self.probe_count
    }
    /// Sets the interval between probe starts.
    pub fn set_send_interval(&mut self, send_interval: Duration) {
        self.send_interval = send_interval;
    }
    /// Returns the interval between probe starts.
    pub fn get_send_interval(&self) -> Duration {
        self.send_interval
    }
    /// Sets the per-probe receive timeout.
    pub fn set_receive_timeout(&mut self, receive_timeout: Duration) {
        self.receive_timeout = receive_timeout;
    }
    /// Returns the per-probe receive timeout.
    pub fn get_receive_timeout(&self) -> Duration {
        self.receive_timeout
    }
    /// Sets the total echo request length.
    pub fn set_packet_len(&mut self, packet_len: usize) {
        self.packet_len = packet_len;
    }
    /// Returns the total echo request length.
    pub fn get_packet_len(&self) -> usize {
        self.packet_len
    }
    /// Sets the payload pattern.
    pub fn set_filler(&mut self, filler: impl Into<Vec<u8>>) {
        self.filler = filler.into();
    }
    /// Returns the payload pattern.
    pub fn get_filler(&self) -> &[u8] {
        &self.filler
    }
    /// Sets the TTL value.
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = Some(ttl);
    }
    /// Returns the TTL value, if set.
    pub fn get_ttl(&self) -> Option<u32> {
        self.ttl
    }
    /// Sets the preferred socket type.
    pub fn set_sock_type(&mut self, sock_type: IcmpSocketType) {
        self.sock_type = sock_type;
    }
    /// Returns the preferred socket type.
    pub fn get_sock_type(&self) -> IcmpSocketType {
        self.sock_type
    }
    /// Sets how replies are matched to probes.
    pub fn set_reply_filter(&mut self, reply_filter: ReplyFilter) {
        self.reply_filter = reply_filter;
    }
    /// Returns how replies are matched to probes.
    pub fn get_reply_filter(&self) -> ReplyFilter {
        self.reply_filter
    }
    /// Sets whether reply checksums are checked.
    pub fn set_verify_checksum(&mut self, verify_checksum: bool) {
        self.verify_checksum = verify_checksum;
    }
    /// Returns whether reply checksums are checked.
    pub fn get_verify_checksum(&self) -> bool {
        self.verify_checksum
    }
}

/// Results of a [`Pinger`] running on its own thread.
///
/// Iterating yields results until the session ends. Dropping the stream
/// cancels the session.
#[derive(Debug)]
pub struct PingStream {
    receiver: Receiver<ProbeResult>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl PingStream {
    /// Asks the session to stop. Results already produced can still be read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this stream, for use from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for the session thread to exit.
    ///
    /// Results not read yet are discarded, which also unblocks a session
    /// waiting on a full buffer.
    pub fn join(mut self) -> thread::Result<()> {
        let handle = self.handle.take();
        drop(self);
        match handle {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl Iterator for PingStream {
    type Item = ProbeResult;

    fn next(&mut self) -> Option<ProbeResult> {
        self.receiver.recv().ok()
    }
}

impl Drop for PingStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
