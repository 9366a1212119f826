use super::Transport;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Kind of socket used to carry ICMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpSocketType {
    /// `SOCK_DGRAM` ICMP ("unprivileged ping", Linux and macOS).
    Dgram,
    /// `SOCK_RAW`, usually requires elevated privilege.
    Raw,
}

impl IcmpSocketType {
    fn to_sock_type(&self) -> Type {
        match self {
            IcmpSocketType::Dgram => Type::DGRAM,
            IcmpSocketType::Raw => Type::RAW,
        }
    }

    fn fallback(&self) -> IcmpSocketType {
        match self {
            IcmpSocketType::Dgram => IcmpSocketType::Raw,
            IcmpSocketType::Raw => IcmpSocketType::Dgram,
        }
    }
}

/// Options applied when opening an [`IcmpSocket`].
#[derive(Debug, Clone)]
pub struct IcmpConfig {
    /// IP time to live; the OS default if unset
    pub ttl: Option<u32>,
    /// Send timeout; sends block without limit if unset
    pub write_timeout: Option<Duration>,
    /// Socket type to try first
    pub sock_type_hint: IcmpSocketType,
    /// Try the other socket type if the hinted one cannot be created.
    pub allow_fallback: bool,
}

impl Default for IcmpConfig {
    fn default() -> Self {
        Self {
            ttl: None,
            write_timeout: None,
            sock_type_hint: IcmpSocketType::Raw,
            allow_fallback: true,
        }
    }
}

/// ICMPv4 socket connected to a single destination.
#[derive(Debug)]
pub struct IcmpSocket {
    inner: Socket,
    sock_type: IcmpSocketType,
}

impl IcmpSocket {
    /// Opens a socket and connects it to `dst`.
    ///
    /// Connecting makes the kernel drop datagrams from other peers.
    pub fn open(dst: Ipv4Addr, config: &IcmpConfig) -> io::Result<Self> {
        let hint = config.sock_type_hint;
        let (socket, sock_type) = match Self::create(hint) {
            Ok(sock) => (sock, hint),
            Err(e) if config.allow_fallback => {
                let fallback = hint.fallback();
                log::debug!("{:?} ICMP socket unavailable ({}), trying {:?}", hint, e, fallback);
                // Report the first error if the fallback fails as well.
                let sock = Self::create(fallback).map_err(|_| e)?;
                (sock, fallback)
            }
            Err(e) => return Err(e),
        };

        if let Some(ttl) = config.ttl {
            socket.set_ttl(ttl)?;
        }
        if let Some(timeout) = config.write_timeout {
            socket.set_write_timeout(Some(timeout))?;
        }
        socket.connect(&SockAddr::from(SocketAddr::new(dst.into(), 0)))?;

        Ok(Self {
            inner: socket,
            sock_type,
        })
    }

    fn create(sock_type: IcmpSocketType) -> io::Result<Socket> {
        Socket::new(Domain::IPV4, sock_type.to_sock_type(), Some(Protocol::ICMPV4))
    }

    /// Socket type actually in use after any fallback.
    pub fn sock_type(&self) -> IcmpSocketType {
        self.sock_type
    }
}

impl Transport for IcmpSocket {
    fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.inner.send(packet)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let timeout = read_timeout(timeout).ok_or(io::ErrorKind::TimedOut)?;
        self.inner.set_read_timeout(Some(timeout))?;
        self.inner.read(buf)
    }

    fn rewrites_identifier(&self) -> bool {
        self.sock_type == IcmpSocketType::Dgram && cfg!(target_os = "linux")
    }
}

/// Smallest read timeout every platform keeps as non-zero. socket2 truncates
/// to microseconds on Unix and to milliseconds on Windows.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Read timeout to hand to the OS, `None` once the deadline has passed.
///
/// A zero timeout means "block forever" to the OS, so anything that would
/// truncate to zero is rounded up instead.
fn read_timeout(remaining: Duration) -> Option<Duration> {
    if remaining.is_zero() {
        None
    } else {
        Some(remaining.max(MIN_READ_TIMEOUT))
    }
}
