use core::fmt;

use super::{Error, Result};
use super::{Ipv4Address, Ipv6Address};

/// Internet protocol version.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Version {
    /// Version 4, RFC 791.
    Ipv4,
    /// Version 6, RFC 8200.
    Ipv6,
}

impl Version {
    /// Return the version of an IP packet stored in the provided buffer.
    ///
    /// Unknown versions and empty buffers result in `Err(Error::Unrecognized)` and
    /// `Err(Error::Truncated)` respectively.
    pub fn of_packet(data: &[u8]) -> Result<Version> {
        match data.first().map(|byte| byte >> 4) {
            Some(4) => Ok(Version::Ipv4),
            Some(6) => Ok(Version::Ipv6),
            Some(_) => Err(Error::Unrecognized),
            None => Err(Error::Truncated),
        }
    }

    /// The length of the fixed header of this version, without options or extensions.
    pub fn header_len(self) -> usize {
        match self {
            Version::Ipv4 => super::ipv4::HEADER_LEN,
            Version::Ipv6 => super::ipv6::HEADER_LEN,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Version::Ipv4 => write!(f, "IPv4"),
            Version::Ipv6 => write!(f, "IPv6"),
        }
    }
}

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub doc enum Protocol(u8) {
        /// IPv6 hop-by-hop options.
        HopByHop  = 0x00,
        /// Internet control message protocol.
        Icmp      = 0x01,
        /// Internet group management protocol.
        Igmp      = 0x02,
        /// IPv4 encapsulated in IP.
        IpIp      = 0x04,
        /// Transmission control protocol.
        Tcp       = 0x06,
        /// User datagram protocol.
        Udp       = 0x11,
        /// IPv6 encapsulated in IP.
        Ipv6      = 0x29,
        /// IPv6 routing header.
        Ipv6Route = 0x2b,
        /// IPv6 fragment header.
        Ipv6Frag  = 0x2c,
        /// Encapsulating security payload, RFC 4303.
        Esp       = 0x32,
        /// Authentication header, RFC 4302.
        Ah        = 0x33,
        /// ICMP for IPv6.
        Icmpv6    = 0x3a,
        /// No next header.
        Ipv6NoNxt = 0x3b,
        /// IPv6 destination options.
        Ipv6Opts  = 0x3c,
        /// IP payload compression, RFC 3173.
        IpComp    = 0x6c
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::HopByHop    => write!(f, "Hop-by-Hop"),
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Igmp        => write!(f, "IGMP"),
            Protocol::IpIp        => write!(f, "IPIP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Ipv6        => write!(f, "IPv6"),
            Protocol::Ipv6Route   => write!(f, "IPv6-Route"),
            Protocol::Ipv6Frag    => write!(f, "IPv6-Frag"),
            Protocol::Esp         => write!(f, "ESP"),
            Protocol::Ah          => write!(f, "AH"),
            Protocol::Icmpv6      => write!(f, "ICMPv6"),
            Protocol::Ipv6NoNxt   => write!(f, "IPv6-NoNxt"),
            Protocol::Ipv6Opts    => write!(f, "IPv6-Opts"),
            Protocol::IpComp      => write!(f, "IPCOMP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

/// An internetworking address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Address {
    /// An IPv4 address.
    Ipv4(Ipv4Address),
    /// An IPv6 address.
    Ipv6(Ipv6Address),
}

impl Address {
    /// Create an address wrapping an IPv4 address with the given octets.
    pub const fn v4(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address::Ipv4(Ipv4Address([a0, a1, a2, a3]))
    }

    /// Create an address wrapping an IPv6 address with the given 16-bit groups.
    pub fn v6(
        a0: u16, a1: u16, a2: u16, a3: u16,
        a4: u16, a5: u16, a6: u16, a7: u16,
    ) -> Address {
        Address::Ipv6(Ipv6Address::new(a0, a1, a2, a3, a4, a5, a6, a7))
    }

    /// The protocol version of this address.
    pub fn version(&self) -> Version {
        match self {
            Address::Ipv4(_) => Version::Ipv4,
            Address::Ipv6(_) => Version::Ipv6,
        }
    }

    /// Return an address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Ipv4(addr) => addr.as_bytes(),
            Address::Ipv6(addr) => addr.as_bytes(),
        }
    }

    /// Query whether the address is the unspecified address of its family.
    pub fn is_unspecified(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    /// Whether the first `prefix` bits of both addresses agree.
    ///
    /// Addresses of different families never share a prefix.
    pub fn shares_prefix(&self, other: &Address, prefix: u8) -> bool {
        if self.version() != other.version() {
            return false;
        }

        let (a, b) = (self.as_bytes(), other.as_bytes());
        let full = usize::from(prefix / 8).min(a.len());
        if a[..full] != b[..full] {
            return false;
        }

        let rest = prefix % 8;
        if rest == 0 || full == a.len() {
            return true;
        }

        let mask = !0u8 << (8 - rest);
        a[full] & mask == b[full] & mask
    }
}

impl From<Ipv4Address> for Address {
    fn from(addr: Ipv4Address) -> Self {
        Address::Ipv4(addr)
    }
}

impl From<Ipv6Address> for Address {
    fn from(addr: Ipv6Address) -> Self {
        Address::Ipv6(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Ipv4(addr) => write!(f, "{}", addr),
            Address::Ipv6(addr) => write!(f, "{}", addr),
        }
    }
}

/// An address and port pair, one side of a transport connection.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Endpoint {
    /// The network address.
    pub addr: Address,
    /// The transport port.
    pub port: u16,
}

impl Endpoint {
    /// Pair an address with a port.
    pub fn new<A: Into<Address>>(addr: A, port: u16) -> Self {
        Endpoint { addr: addr.into(), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.addr {
            Address::Ipv4(addr) => write!(f, "{}:{}", addr, self.port),
            Address::Ipv6(addr) => write!(f, "[{}]:{}", addr, self.port),
        }
    }
}

pub(crate) mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::*;

    fn propagate_carries(word: u32) -> u16 {
        let sum = (word >> 16) + (word & 0xffff);
        ((sum >> 16) as u16) + (sum as u16)
    }

    /// Compute an RFC 1071 compliant checksum (without the final complement).
    pub(crate) fn data(mut data: &[u8]) -> u16 {
        let mut accum = 0;

        // For each 32-byte chunk...
        const CHUNK_SIZE: usize = 32;
        while data.len() >= CHUNK_SIZE {
            let mut d = &data[..CHUNK_SIZE];
            // ... take by 2 bytes and sum them.
            while d.len() >= 2 {
                accum += NetworkEndian::read_u16(d) as u32;
                d = &d[2..];
            }

            data = &data[CHUNK_SIZE..];
        }

        // Sum the rest that does not fit the last 32-byte chunk,
        // taking by 2 bytes.
        while data.len() >= 2 {
            accum += NetworkEndian::read_u16(data) as u32;
            data = &data[2..];
        }

        // Add the last remaining odd byte, if any.
        if let Some(&value) = data.first() {
            accum += (value as u32) << 8;
        }

        propagate_carries(accum)
    }

    /// Combine several RFC 1071 compliant checksums.
    pub(crate) fn combine(checksums: &[u16]) -> u16 {
        let mut accum: u32 = 0;
        for &word in checksums {
            accum += word as u32;
        }
        propagate_carries(accum)
    }

    /// Compute the IPv4 pseudo header checksum.
    pub(crate) fn pseudo_header_v4(src_addr: Ipv4Address, dst_addr: Ipv4Address,
                                   protocol: Protocol, length: u16) -> u16 {
        let mut proto_len = [0u8; 4];
        proto_len[1] = protocol.into();
        NetworkEndian::write_u16(&mut proto_len[2..4], length);

        combine(&[
            data(src_addr.as_bytes()),
            data(dst_addr.as_bytes()),
            data(&proto_len[..])
        ])
    }

    /// Compute the IPv6 pseudo header checksum.
    pub(crate) fn pseudo_header_v6(src_addr: Ipv6Address, dst_addr: Ipv6Address,
                                   protocol: Protocol, length: u32) -> u16 {
        let mut proto_len = [0u8; 8];
        proto_len[7] = protocol.into();
        NetworkEndian::write_u32(&mut proto_len[0..4], length);
        combine(&[
            data(src_addr.as_bytes()),
            data(dst_addr.as_bytes()),
            data(&proto_len[..])
        ])
    }

    /// Pseudo header checksum for a pair of addresses of the same family.
    ///
    /// Returns `None` when the families differ.
    pub(crate) fn pseudo_header(src_addr: Address, dst_addr: Address,
                                protocol: Protocol, length: u32) -> Option<u16> {
        match (src_addr, dst_addr) {
            (Address::Ipv4(src), Address::Ipv4(dst)) =>
                Some(pseudo_header_v4(src, dst, protocol, length as u16)),
            (Address::Ipv6(src), Address::Ipv6(dst)) =>
                Some(pseudo_header_v6(src, dst, protocol, length)),
            _ => None,
        }
    }
}
