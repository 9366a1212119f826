use super::{CancelToken, ProbeResult, ReplyFilter};
use crate::error::PingError;
use crate::packet::{self, ICMPV4_HEADER_LEN, MAX_IPV4_HEADER_LEN, RECV_BUF_LEN};
use crate::socket::Transport;
use std::sync::mpsc::SyncSender;
use std::time::{Duration, Instant};

/// Per-probe parameters of a session.
#[derive(Clone, Debug)]
pub struct ProbeSettings {
    /// Echo identifier, fixed for the session
    pub identifier: u16,
    /// Total request length, ICMP header included
    pub packet_len: usize,
    /// Payload pattern, repeated to fill the request
    pub filler: Vec<u8>,
    /// How long to wait for a reply after sending
    pub receive_timeout: Duration,
    /// Which replies complete a probe
    pub reply_filter: ReplyFilter,
    /// Drop replies whose ICMP checksum does not verify
    pub verify_checksum: bool,
}

impl ProbeSettings {
    pub(crate) fn validate(&self) -> Result<(), PingError> {
        if self.packet_len < ICMPV4_HEADER_LEN {
            return Err(PingError::InvalidConfig(format!(
                "packet length {} is shorter than the {}-byte ICMP header",
                self.packet_len, ICMPV4_HEADER_LEN
            )));
        }
        if self.packet_len > usize::from(u16::MAX) - MAX_IPV4_HEADER_LEN {
            return Err(PingError::InvalidConfig(format!(
                "packet length {} does not fit in an IPv4 datagram",
                self.packet_len
            )));
        }
        if self.filler.is_empty() {
            return Err(PingError::InvalidConfig(String::from("filler must not be empty")));
        }
        Ok(())
    }
}

/// Send/receive loop for one destination.
///
/// Owns its transport and sequence counter; nothing else touches them while
/// the session runs. Sequence numbers start at 0 and go up by one per probe,
/// whether the probe succeeds or not. On the wire only the low 16 bits are
/// sent.
pub struct ProbeSession<T: Transport> {
    destination: String,
    transport: T,
    settings: ProbeSettings,
    sequence: u64,
    recv_buf: Vec<u8>,
}

impl<T: Transport> ProbeSession<T> {
    /// Creates a session over an already connected transport.
    ///
    /// Fails with [`PingError::InvalidConfig`] if the settings cannot
    /// produce a valid echo request.
    pub fn new(
        destination: String,
        transport: T,
        settings: ProbeSettings,
    ) -> Result<Self, PingError> {
        settings.validate()?;
        let recv_len = RECV_BUF_LEN.max(MAX_IPV4_HEADER_LEN + settings.packet_len);
        Ok(ProbeSession {
            destination,
            transport,
            settings,
            sequence: 0,
            recv_buf: vec![0u8; recv_len],
        })
    }

    /// Address the session probes.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Sequence number the next probe will carry.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Sends the next echo request and waits for its reply.
    pub fn probe(&mut self) -> ProbeResult {
        let sequence = self.sequence;
        self.sequence += 1;
        let wire_seq = sequence as u16;

        let request = packet::build_echo_request(
            self.settings.identifier,
            wire_seq,
            self.settings.packet_len,
            &self.settings.filler,
        );
        let timeout = self.settings.receive_timeout;
        let mut result =
            ProbeResult::failure(self.destination.clone(), sequence, PingError::Timeout(timeout));

        let start = Instant::now();
        match self.transport.send(&request) {
            Ok(n) if n == request.len() => result.bytes_written = n,
            Ok(n) => {
                result.bytes_written = n;
                result.error = Some(PingError::ShortWrite {
                    written: n,
                    expected: request.len(),
                });
                return result;
            }
            Err(e) => {
                result.error = Some(PingError::Write(e));
                return result;
            }
        }

        let deadline = start + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.transport.recv(&mut self.recv_buf, remaining) {
                Ok(n) => {
                    let elapsed = start.elapsed();
                    if self.matches(n, wire_seq) {
                        result.delay = elapsed;
                        result.bytes_read = n;
                        result.error = None;
                        return result;
                    }
                }
                Err(e) => {
                    result.error = Some(PingError::from_read(e, timeout));
                    return result;
                }
            }
        }
    }

    fn matches(&self, len: usize, wire_seq: u16) -> bool {
        let buf = &self.recv_buf[..len];
        let reply = match packet::parse_echo_reply(buf) {
            Some(reply) => reply,
            None => {
                log::trace!("{}: ignoring undecodable {}-byte datagram", self.destination, len);
                return false;
            }
        };
        if self.settings.verify_checksum && !packet::verify_icmp_checksum(buf) {
            log::trace!("{}: ignoring reply with bad checksum", self.destination);
            return false;
        }
        let accepted = match self.settings.reply_filter {
            ReplyFilter::AnyEchoReply => reply.icmp_type == 0,
            ReplyFilter::Strict => {
                reply.is_echo_reply()
                    && reply.sequence == wire_seq
                    && (reply.identifier == self.settings.identifier
                        || self.transport.rewrites_identifier())
            }
        };
        if !accepted {
            log::trace!(
                "{}: skipping type={} code={} id={:#06x} seq={}",
                self.destination,
                reply.icmp_type,
                reply.code,
                reply.identifier,
                reply.sequence
            );
        }
        accepted
    }

    /// Runs `count` probes (without end if 0) into `sink`, starting each at
    /// least `pacing` after the previous one.
    ///
    /// Emission blocks while `sink` is full. The loop ends early if the token
    /// is cancelled or the receiver is gone. No pause follows the last probe.
    pub fn run(
        &mut self,
        count: u64,
        pacing: Duration,
        sink: &SyncSender<ProbeResult>,
        cancel: &CancelToken,
    ) {
        log::debug!(
            "{}: starting {} probes, identifier {:#06x}",
            self.destination,
            if count == 0 { String::from("unbounded") } else { count.to_string() },
            self.settings.identifier
        );
        let mut sent: u64 = 0;
        while !cancel.is_cancelled() {
            let started = Instant::now();
            let result = self.probe();
            sent += 1;
            let wait = if result.is_write_failure() {
                pacing
            } else {
                pacing.saturating_sub(started.elapsed())
            };
            if sink.send(result).is_err() {
                log::debug!("{}: result receiver dropped", self.destination);
                break;
            }
            if count != 0 && sent >= count {
                break;
            }
            if cancel.wait(wait) {
                break;
            }
        }
        log::debug!("{}: session finished after {} probes", self.destination, sent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::mpsc;
    use std::thread;

    /// Answers every request with a matching reply behind an IPv4 header.
    /// Stray datagrams queued in `noise` are delivered first.
    struct EchoResponder {
        pending: VecDeque<Vec<u8>>,
        noise: VecDeque<Vec<u8>>,
        sent: Vec<(Instant, Vec<u8>)>,
        with_ip_header: bool,
        delay: Duration,
    }

    impl EchoResponder {
        fn new() -> Self {
            EchoResponder {
                pending: VecDeque::new(),
                noise: VecDeque::new(),
                sent: Vec::new(),
                with_ip_header: true,
                delay: Duration::ZERO,
            }
        }
    }

    fn ip_wrap(icmp: &[u8]) -> Vec<u8> {
        let mut buf = vec![0x45, 0, 0, 0, 0, 0, 0, 0, 64, 1, 0, 0, 127, 0, 0, 1, 127, 0, 0, 1];
        let total = (buf.len() + icmp.len()) as u16;
        buf[2..4].copy_from_slice(&total.to_be_bytes());
        buf.extend_from_slice(icmp);
        buf
    }

    fn to_reply(request: &[u8]) -> Vec<u8> {
        let mut reply = request.to_vec();
        reply[0] = 0;
        reply[2] = 0;
        reply[3] = 0;
        let sum = packet::checksum(&reply);
        reply[2] = (sum & 0xff) as u8;
        reply[3] = (sum >> 8) as u8;
        reply
    }

    impl Transport for EchoResponder {
        fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
            self.sent.push((Instant::now(), packet.to_vec()));
            self.pending.push_back(to_reply(packet));
            Ok(packet.len())
        }

        fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            let next = match self.noise.pop_front() {
                Some(stray) => stray,
                None => {
                    if self.delay > timeout {
                        thread::sleep(timeout);
                        return Err(io::ErrorKind::WouldBlock.into());
                    }
                    thread::sleep(self.delay);
                    match self.pending.pop_front() {
                        Some(reply) => reply,
                        None => return Err(io::ErrorKind::WouldBlock.into()),
                    }
                }
            };
            let data = if self.with_ip_header { ip_wrap(&next) } else { next };
            buf[..data.len()].copy_from_slice(&data);
            Ok(data.len())
        }
    }

    /// Accepts requests and never answers.
    struct BlackHole;

    impl Transport for BlackHole {
        fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
            Ok(packet.len())
        }

        fn recv(&mut self, _buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            thread::sleep(timeout);
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    /// Writes only part of each request.
    struct ShortWriter;

    impl Transport for ShortWriter {
        fn send(&mut self, _packet: &[u8]) -> io::Result<usize> {
            Ok(10)
        }

        fn recv(&mut self, _buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
            panic!("no read expected after a short write");
        }
    }

    fn settings(identifier: u16) -> ProbeSettings {
        ProbeSettings {
            identifier,
            packet_len: 64,
            filler: b"AB".to_vec(),
            receive_timeout: Duration::from_millis(50),
            reply_filter: ReplyFilter::Strict,
            verify_checksum: false,
        }
    }

    fn collect<T: Transport>(
        session: &mut ProbeSession<T>,
        count: u64,
        pacing: Duration,
    ) -> Vec<ProbeResult> {
        let (tx, rx) = mpsc::sync_channel(100);
        session.run(count, pacing, &tx, &CancelToken::new());
        drop(tx);
        rx.iter().collect()
    }

    #[test]
    fn test_probe_success() {
        let mut session =
            ProbeSession::new("127.0.0.1".into(), EchoResponder::new(), settings(0x1234)).unwrap();
        let r = session.probe();
        assert!(r.is_success(), "{:?}", r.error);
        assert_eq!(r.sequence, 0);
        assert_eq!(r.bytes_written, 64);
        assert_eq!(r.bytes_read, 84);
        assert_eq!(r.destination, "127.0.0.1");
        assert_eq!(session.next_sequence(), 1);
    }

    #[test]
    fn test_probe_bare_replies() {
        let mut responder = EchoResponder::new();
        responder.with_ip_header = false;
        let mut session = ProbeSession::new("h".into(), responder, settings(7)).unwrap();
        let r = session.probe();
        assert!(r.is_success());
        assert_eq!(r.bytes_read, 64);
    }

    #[test]
    fn test_strict_filter_skips_foreign_replies() {
        let mut responder = EchoResponder::new();
        // Wrong identifier, wrong sequence, our own request echoed back.
        responder.noise.push_back(packet::build_echo_reply(0x9999, 0, 64, b"AB"));
        responder.noise.push_back(packet::build_echo_reply(0x1234, 5, 64, b"AB"));
        responder.noise.push_back(packet::build_echo_request(0x1234, 0, 64, b"AB"));
        responder.noise.push_back(vec![1, 2, 3]);
        let mut session = ProbeSession::new("h".into(), responder, settings(0x1234)).unwrap();
        let r = session.probe();
        assert!(r.is_success());
        assert_eq!(r.sequence, 0);
        assert!(session.transport.noise.is_empty());
        assert!(session.transport.pending.is_empty());
    }

    #[test]
    fn test_any_echo_reply_takes_first_reply() {
        let mut responder = EchoResponder::new();
        responder.noise.push_back(packet::build_echo_reply(0x9999, 40, 64, b"AB"));
        let mut s = settings(0x1234);
        s.reply_filter = ReplyFilter::AnyEchoReply;
        let mut session = ProbeSession::new("h".into(), responder, s).unwrap();
        assert!(session.probe().is_success());
        // The real reply is still queued.
        assert_eq!(session.transport.pending.len(), 1);
    }

    #[test]
    fn test_checksum_verification_drops_corrupt_reply() {
        let mut responder = EchoResponder::new();
        let mut corrupt = packet::build_echo_reply(0x1234, 0, 64, b"AB");
        corrupt[30] ^= 0xff;
        responder.noise.push_back(corrupt);
        let mut s = settings(0x1234);
        s.verify_checksum = true;
        let mut session = ProbeSession::new("h".into(), responder, s).unwrap();
        assert!(session.probe().is_success());
        assert!(session.transport.pending.is_empty());
    }

    #[test]
    fn test_probe_timeout() {
        let mut session = ProbeSession::new("192.0.2.1".into(), BlackHole, settings(1)).unwrap();
        let start = Instant::now();
        let r = session.probe();
        assert!(r.is_timeout());
        assert_eq!(r.bytes_written, 64);
        assert_eq!(r.bytes_read, 0);
        assert_eq!(r.delay, Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(50) + Duration::from_millis(500));
    }

    #[test]
    fn test_slow_reply_times_out() {
        let mut responder = EchoResponder::new();
        responder.delay = Duration::from_millis(200);
        let mut session = ProbeSession::new("h".into(), responder, settings(1)).unwrap();
        assert!(session.probe().is_timeout());
    }

    #[test]
    fn test_short_write() {
        let mut session = ProbeSession::new("h".into(), ShortWriter, settings(1)).unwrap();
        let r = session.probe();
        assert!(matches!(r.error, Some(PingError::ShortWrite { written: 10, expected: 64 })));
        assert_eq!(r.bytes_written, 10);
        assert_eq!(session.next_sequence(), 1);
    }

    #[test]
    fn test_run_sequences_in_order() {
        let mut session = ProbeSession::new("h".into(), EchoResponder::new(), settings(3)).unwrap();
        let results = collect(&mut session, 5, Duration::ZERO);
        let seqs: Vec<u64> = results.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert!(results.iter().all(ProbeResult::is_success));
    }

    #[test]
    fn test_run_failed_probes_count() {
        let mut session = ProbeSession::new("h".into(), ShortWriter, settings(3)).unwrap();
        let results = collect(&mut session, 3, Duration::from_millis(1));
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.error.is_some()));
    }

    #[test]
    fn test_run_pacing_lower_bound() {
        let pacing = Duration::from_millis(40);
        let mut session = ProbeSession::new("h".into(), EchoResponder::new(), settings(3)).unwrap();
        let start = Instant::now();
        let results = collect(&mut session, 3, pacing);
        assert_eq!(results.len(), 3);
        let sends: Vec<Instant> = session.transport.sent.iter().map(|(t, _)| *t).collect();
        for pair in sends.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= pacing - Duration::from_millis(2));
        }
        // No pause after the last probe.
        assert!(start.elapsed() < pacing * 3);
    }

    #[test]
    fn test_run_slow_probe_fires_next_immediately() {
        let pacing = Duration::from_millis(20);
        let mut session = ProbeSession::new("h".into(), BlackHole, settings(3)).unwrap();
        let start = Instant::now();
        let results = collect(&mut session, 2, pacing);
        assert!(results.iter().all(ProbeResult::is_timeout));
        // Two 50ms timeouts, no extra pacing on top.
        assert!(start.elapsed() < Duration::from_millis(100) + pacing + Duration::from_millis(60));
    }

    #[test]
    fn test_wire_sequence_wraps() {
        let mut session = ProbeSession::new("h".into(), EchoResponder::new(), settings(3)).unwrap();
        session.sequence = u64::from(u16::MAX);
        assert!(session.probe().is_success());
        let r = session.probe();
        assert!(r.is_success());
        assert_eq!(r.sequence, 65536);
        let (_, last) = session.transport.sent.last().unwrap();
        assert_eq!(&last[6..8], &[0, 0]);
    }

    #[test]
    fn test_unbounded_run_stops_on_cancel() {
        // Rendezvous channel: the session cannot run ahead of the reader.
        let (tx, rx) = mpsc::sync_channel(0);
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = thread::spawn(move || {
            let mut session =
                ProbeSession::new("h".into(), EchoResponder::new(), settings(3)).unwrap();
            session.run(0, Duration::from_millis(5), &tx, &remote);
        });
        let mut seen = 0u64;
        for r in rx.iter() {
            assert_eq!(r.sequence, seen);
            seen += 1;
            if seen == 20 {
                cancel.cancel();
            }
        }
        handle.join().unwrap();
        // At most one probe in flight when the token fired.
        assert!(seen == 20 || seen == 21);
    }

    #[test]
    fn test_run_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);
        let mut session = ProbeSession::new("h".into(), EchoResponder::new(), settings(3)).unwrap();
        session.run(0, Duration::ZERO, &tx, &CancelToken::new());
        assert_eq!(session.next_sequence(), 1);
    }

    #[test]
    fn test_invalid_settings() {
        let mut s = settings(1);
        s.filler.clear();
        let err = ProbeSession::new("h".into(), BlackHole, s).err();
        assert!(matches!(err, Some(PingError::InvalidConfig(_))));
        let mut s = settings(1);
        s.packet_len = 4;
        assert!(ProbeSession::new("h".into(), BlackHole, s).is_err());
    }
}
