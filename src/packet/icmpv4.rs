use super::checksum::{checksum, write_checksum};
use super::ipv4::{self, ReplyLayout};
use super::ICMPV4_HEADER_LEN;
use pnet_packet::icmp::echo_reply::EchoReplyPacket;
use pnet_packet::icmp::{IcmpPacket, IcmpType, IcmpTypes};
use std::net::Ipv4Addr;

/// Builds an ICMP Echo Request of exactly `total_len` bytes.
///
/// The payload after the 8-byte header is `filler` repeated and truncated.
///
/// # Panics
///
/// Panics if `total_len` is shorter than the ICMP header or `filler` is empty.
pub fn build_echo_request(
    identifier: u16,
    sequence: u16,
    total_len: usize,
    filler: &[u8],
) -> Vec<u8> {
    build_echo(IcmpTypes::EchoRequest, identifier, sequence, total_len, filler)
}

/// Builds an ICMP Echo Reply, as a responder would send it back.
///
/// # Panics
///
/// Same conditions as [`build_echo_request`].
pub fn build_echo_reply(
    identifier: u16,
    sequence: u16,
    total_len: usize,
    filler: &[u8],
) -> Vec<u8> {
    build_echo(IcmpTypes::EchoReply, identifier, sequence, total_len, filler)
}

fn build_echo(
    icmp_type: IcmpType,
    identifier: u16,
    sequence: u16,
    total_len: usize,
    filler: &[u8],
) -> Vec<u8> {
    assert!(total_len >= ICMPV4_HEADER_LEN, "echo packet shorter than its header");
    assert!(!filler.is_empty(), "echo filler must not be empty");

    let mut buf = vec![0u8; total_len];
    buf[0] = icmp_type.0;
    buf[1] = 0;
    buf[4..6].copy_from_slice(&identifier.to_be_bytes());
    buf[6..8].copy_from_slice(&sequence.to_be_bytes());
    for (dst, src) in buf[ICMPV4_HEADER_LEN..].iter_mut().zip(filler.iter().cycle()) {
        *dst = *src;
    }

    let sum = checksum(&buf);
    write_checksum(&mut buf, sum);
    buf
}

/// Header fields of a received echo message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoReply {
    /// ICMP message type
    pub icmp_type: u8,
    /// ICMP code
    pub code: u8,
    /// Echo identifier, as carried on the wire
    pub identifier: u16,
    /// Echo sequence number, as carried on the wire
    pub sequence: u16,
    /// Source address, if the datagram carried an IPv4 header
    pub source: Option<Ipv4Addr>,
    /// Where the ICMP message started in the received buffer
    pub layout: ReplyLayout,
}

impl EchoReply {
    /// True for an Echo Reply (type 0, code 0).
    pub fn is_echo_reply(&self) -> bool {
        self.icmp_type == IcmpTypes::EchoReply.0 && self.code == 0
    }
}

/// Decodes the echo header of a received datagram.
///
/// Raw IPv4 sockets deliver the IP header in front of the ICMP message while
/// datagram ICMP sockets do not; the two are told apart by the version
/// nibble. Returns `None` when the buffer is too short to hold an
/// echo header. The checksum is not checked here, see [`verify_icmp_checksum`].
pub fn parse_echo_reply(buf: &[u8]) -> Option<EchoReply> {
    let (layout, source, icmp) = ipv4::split_icmp(buf)?;
    let header = IcmpPacket::new(icmp)?;
    let echo = EchoReplyPacket::new(icmp)?;
    Some(EchoReply {
        icmp_type: header.get_icmp_type().0,
        code: header.get_icmp_code().0,
        identifier: echo.get_identifier(),
        sequence: echo.get_sequence_number(),
        source,
        layout,
    })
}

/// Verifies the ICMP checksum of a received datagram, IP header or not.
pub fn verify_icmp_checksum(buf: &[u8]) -> bool {
    match ipv4::split_icmp(buf) {
        Some((_, _, icmp)) => super::checksum::verify_checksum(icmp),
        None => false,
    }
}
