mod checksum;
mod icmpv4;
mod ipv4;

pub use checksum::{checksum, verify_checksum};
pub use icmpv4::{
    build_echo_reply, build_echo_request, parse_echo_reply, verify_icmp_checksum, EchoReply,
};
pub use ipv4::{ReplyLayout, IPV4_HEADER_LEN};

/// Length of the ICMPv4 echo header.
pub const ICMPV4_HEADER_LEN: usize = 8;

/// Default total length of an echo request, header included.
pub const DEFAULT_PACKET_LEN: usize = 64;

/// Default payload pattern.
pub const DEFAULT_FILLER: &[u8] = b"echoping";

/// Receive buffer size; grown when the request would not fit behind a full
/// IPv4 header.
pub(crate) const RECV_BUF_LEN: usize = 2048;

/// Largest IPv4 header, options included.
pub(crate) const MAX_IPV4_HEADER_LEN: usize = 60;
