use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use std::net::Ipv4Addr;

pub const IPV4_HEADER_LEN: usize = 20;

/// How a received datagram was laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyLayout {
    /// The ICMP message was preceded by an IPv4 header of `header_len` bytes.
    WithIpv4Header { header_len: usize },
    /// The buffer started with the ICMP message.
    Bare,
}

/// Splits a received datagram into its layout, source and ICMP message.
///
/// A buffer whose first nibble is 4 and which is long enough for the header
/// length it announces (and carries ICMP) is treated as IPv4. Anything else
/// is taken as a bare ICMP message: echo types never have 0x4 in their high
/// nibble, so the two cannot be confused.
///
/// The IHL field is used for the offset instead of the total length, which
/// some platforms report in host order on raw sockets.
pub(crate) fn split_icmp(buf: &[u8]) -> Option<(ReplyLayout, Option<Ipv4Addr>, &[u8])> {
    if buf.first().map(|b| b >> 4) == Some(4) {
        if let Some(ip) = Ipv4Packet::new(buf) {
            let header_len = usize::from(ip.get_header_length()) * 4;
            if header_len >= IPV4_HEADER_LEN
                && buf.len() >= header_len
                && ip.get_next_level_protocol() == IpNextHeaderProtocols::Icmp
            {
                return Some((
                    ReplyLayout::WithIpv4Header { header_len },
                    Some(ip.get_source()),
                    &buf[header_len..],
                ));
            }
        }
        return None;
    }
    Some((ReplyLayout::Bare, None, buf))
}
