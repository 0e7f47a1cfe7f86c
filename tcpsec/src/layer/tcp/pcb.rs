//! The protocol control block and socket a connection belongs to.
//!
//! A control block is attached to exactly one of an IPv4 or an IPv6 protocol control block. The
//! [`OwningPcb`] enum makes that a structural fact: there is no way to build a connection with
//! both or neither.
//!
//! [`OwningPcb`]: enum.OwningPcb.html
use core::fmt;

use crate::wire::{IpAddress, IpEndpoint, IpVersion, Ipv4Address, Ipv6Address};

enum_with_unknown! {
    /// An error that is visible on the socket.
    ///
    /// The discriminants are the BSD errno values so that codes which arrive from elsewhere, for
    /// example mapped from ICMP, survive unchanged.
    pub doc enum SocketError(u16) {
        /// Message too long.
        MessageSize = 40,
        /// Protocol not available.
        ProtocolOption = 42,
        /// Network is unreachable.
        NetUnreachable = 51,
        /// Connection reset by peer.
        ConnectionReset = 54,
        /// Connection timed out.
        TimedOut = 60,
        /// Connection refused.
        ConnectionRefused = 61,
        /// Host is down.
        HostDown = 64,
        /// No route to host.
        HostUnreachable = 65,
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SocketError::MessageSize => write!(f, "message too long"),
            SocketError::ProtocolOption => write!(f, "protocol not available"),
            SocketError::NetUnreachable => write!(f, "network is unreachable"),
            SocketError::ConnectionReset => write!(f, "connection reset by peer"),
            SocketError::TimedOut => write!(f, "connection timed out"),
            SocketError::ConnectionRefused => write!(f, "connection refused"),
            SocketError::HostDown => write!(f, "host is down"),
            SocketError::HostUnreachable => write!(f, "no route to host"),
            SocketError::Unknown(errno) => write!(f, "error {}", errno),
        }
    }
}

/// The size accounting of one direction of a socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SockBuf {
    /// The buffer limit.
    pub hiwat: u32,
    /// Bytes currently held.
    pub used: u32,
}

impl SockBuf {
    /// A buffer with the given limit and no data.
    pub fn new(hiwat: u32) -> Self {
        SockBuf { hiwat, used: 0 }
    }

    /// The free space.
    pub fn space(&self) -> u32 {
        self.hiwat.saturating_sub(self.used)
    }

    /// Change the limit.
    pub fn reserve(&mut self, hiwat: u32) {
        self.hiwat = hiwat;
    }
}

/// Counters of the wakeups delivered to threads blocked on a socket.
///
/// The host socket layer compares these with what it last saw to know which of its waiters must
/// re-check the socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Wakeups {
    /// Wakeups of readers.
    pub recv: u32,
    /// Wakeups of writers.
    pub send: u32,
    /// Wakeups of threads waiting with a timeout, such as in connect.
    pub timeout: u32,
}

impl Wakeups {
    /// Wake every class of waiter.
    pub fn wake_all(&mut self) {
        self.recv = self.recv.wrapping_add(1);
        self.send = self.send.wrapping_add(1);
        self.timeout = self.timeout.wrapping_add(1);
    }
}

/// The parts of a socket the connection engine reads and writes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Socket {
    /// The send buffer.
    pub snd: SockBuf,
    /// The receive buffer.
    pub rcv: SockBuf,
    /// A pending hard error, reported to the application on its next call.
    pub error: Option<SocketError>,
    /// Whether the socket is still connected.
    pub connected: bool,
    /// Bypass routing for sends, `SO_DONTROUTE`.
    pub dont_route: bool,
    /// Delivered wakeups.
    pub wakeups: Wakeups,
}

impl Socket {
    /// A connected socket with the given buffer sizes.
    pub fn new(snd_hiwat: u32, rcv_hiwat: u32) -> Self {
        Socket {
            snd: SockBuf::new(snd_hiwat),
            rcv: SockBuf::new(rcv_hiwat),
            connected: true,
            ..Socket::default()
        }
    }

    /// Mark the socket as no longer connected and wake everyone.
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.wakeups.wake_all();
    }
}

/// The IPv4 protocol control block of a connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ipv4Pcb {
    /// Local address.
    pub local: Ipv4Address,
    /// Local port.
    pub local_port: u16,
    /// Remote address.
    pub remote: Ipv4Address,
    /// Remote port.
    pub remote_port: u16,
    /// Length of the IP options attached to each datagram.
    pub options_len: u16,
    /// The owning socket.
    pub socket: Socket,
}

/// The IPv6 protocol control block of a connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ipv6Pcb {
    /// Local address.
    pub local: Ipv6Address,
    /// Local port.
    pub local_port: u16,
    /// Remote address.
    pub remote: Ipv6Address,
    /// Remote port.
    pub remote_port: u16,
    /// Length of the extension headers attached to each datagram.
    pub options_len: u16,
    /// The owning socket.
    pub socket: Socket,
}

/// The protocol control block a TCP connection is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OwningPcb {
    /// An IPv4 connection.
    V4(Ipv4Pcb),
    /// An IPv6 connection.
    V6(Ipv6Pcb),
}

/// The addresses and ports identifying a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FourTuple {
    /// The local address.
    pub local: IpAddress,
    /// The remote address.
    pub remote: IpAddress,
    /// The local port.
    pub local_port: u16,
    /// The remote port.
    pub remote_port: u16,
}

impl Ipv4Pcb {
    /// A control block between two endpoints, without IP options.
    pub fn new(local: Ipv4Address, local_port: u16,
               remote: Ipv4Address, remote_port: u16,
               socket: Socket) -> Self {
        Ipv4Pcb {
            local,
            local_port,
            remote,
            remote_port,
            options_len: 0,
            socket,
        }
    }
}

impl Ipv6Pcb {
    /// A control block between two endpoints, without extension headers.
    pub fn new(local: Ipv6Address, local_port: u16,
               remote: Ipv6Address, remote_port: u16,
               socket: Socket) -> Self {
        Ipv6Pcb {
            local,
            local_port,
            remote,
            remote_port,
            options_len: 0,
            socket,
        }
    }
}

impl OwningPcb {
    /// The address family of the connection.
    pub fn family(&self) -> IpVersion {
        match self {
            OwningPcb::V4(_) => IpVersion::Ipv4,
            OwningPcb::V6(_) => IpVersion::Ipv6,
        }
    }

    /// The owning socket.
    pub fn socket(&self) -> &Socket {
        match self {
            OwningPcb::V4(pcb) => &pcb.socket,
            OwningPcb::V6(pcb) => &pcb.socket,
        }
    }

    /// Mutable access to the owning socket.
    pub fn socket_mut(&mut self) -> &mut Socket {
        match self {
            OwningPcb::V4(pcb) => &mut pcb.socket,
            OwningPcb::V6(pcb) => &mut pcb.socket,
        }
    }

    /// The local endpoint.
    pub fn local(&self) -> IpEndpoint {
        match self {
            OwningPcb::V4(pcb) => IpEndpoint::new(pcb.local, pcb.local_port),
            OwningPcb::V6(pcb) => IpEndpoint::new(pcb.local, pcb.local_port),
        }
    }

    /// The remote endpoint.
    pub fn remote(&self) -> IpEndpoint {
        match self {
            OwningPcb::V4(pcb) => IpEndpoint::new(pcb.remote, pcb.remote_port),
            OwningPcb::V6(pcb) => IpEndpoint::new(pcb.remote, pcb.remote_port),
        }
    }

    /// Length of the IP level options of each datagram.
    pub fn options_len(&self) -> u16 {
        match self {
            OwningPcb::V4(pcb) => pcb.options_len,
            OwningPcb::V6(pcb) => pcb.options_len,
        }
    }

    /// The identifying addresses and ports.
    pub fn four_tuple(&self) -> FourTuple {
        let (local, remote) = (self.local(), self.remote());
        FourTuple {
            local: local.addr,
            remote: remote.addr,
            local_port: local.port,
            remote_port: remote.port,
        }
    }
}

impl From<Ipv4Pcb> for OwningPcb {
    fn from(pcb: Ipv4Pcb) -> Self {
        OwningPcb::V4(pcb)
    }
}

impl From<Ipv6Pcb> for OwningPcb {
    fn from(pcb: Ipv6Pcb) -> Self {
        OwningPcb::V6(pcb)
    }
}
