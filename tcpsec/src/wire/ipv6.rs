use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::Protocol;

/// Length of the fixed IPv6 header.
pub const HEADER_LEN: usize = 40;

/// Minimum MTU required of all links supporting IPv6. See [RFC 8200 § 5].
///
/// [RFC 8200 § 5]: https://tools.ietf.org/html/rfc8200#section-5
pub const MIN_MTU: usize = 1280;

/// A sixteen-octet IPv6 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 16]);

impl Address {
    /// The [unspecified address].
    ///
    /// [unspecified address]: https://tools.ietf.org/html/rfc4291#section-2.5.2
    pub const UNSPECIFIED: Address = Address([0x00; 16]);

    /// The [loopback address].
    ///
    /// [loopback address]: https://tools.ietf.org/html/rfc4291#section-2.5.3
    pub const LOOPBACK: Address =
        Address([0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

    /// Construct an IPv6 address from parts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(a0: u16, a1: u16, a2: u16, a3: u16,
               a4: u16, a5: u16, a6: u16, a7: u16) -> Address {
        let mut addr = [0u8; 16];
        let parts = [a0, a1, a2, a3, a4, a5, a6, a7];
        for (chunk, part) in addr.chunks_mut(2).zip(parts.iter()) {
            NetworkEndian::write_u16(chunk, *part);
        }
        Address(addr)
    }

    /// Construct an IPv6 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not sixteen octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv6 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the IPv6 address is a multicast address.
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }

    /// Query whether the IPv6 address is a link-local unicast address, `fe80::/10`.
    pub fn is_link_local(&self) -> bool {
        self.0[0] == 0xfe && self.0[1] & 0xc0 == 0x80
    }

    /// Query whether the address is an interface- or link-local multicast address.
    pub fn is_multicast_link_scope(&self) -> bool {
        self.is_multicast() && matches!(self.0[1] & 0x0f, 0x1 | 0x2)
    }

    /// Whether the address needs a zone to be meaningful.
    pub fn is_scoped(&self) -> bool {
        self.is_link_local() || self.is_multicast_link_scope()
    }

    /// Query whether the IPv6 address is the unspecified address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0x00; 16]
    }

    /// Query whether the IPv6 address is the loopback address.
    pub fn is_loopback(&self) -> bool {
        *self == Self::LOOPBACK
    }

    /// The zone identifier a kernel-style stack embeds in the second group of scoped addresses.
    pub fn embedded_zone(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[2..4])
    }

    /// The address with the embedded zone identifier cleared.
    pub fn without_embedded_zone(&self) -> Address {
        let mut addr = *self;
        addr.0[2] = 0;
        addr.0[3] = 0;
        addr
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut words = [0u16; 8];
        for (word, chunk) in words.iter_mut().zip(self.0.chunks(2)) {
            *word = NetworkEndian::read_u16(chunk);
        }

        // Find the longest run of zero groups, at least two long.
        let (mut best_start, mut best_len) = (8, 0);
        let mut idx = 0;
        while idx < 8 {
            let run = words[idx..].iter().take_while(|&&w| w == 0).count();
            if run > best_len {
                best_start = idx;
                best_len = run;
            }
            idx += run.max(1);
        }

        if best_len < 2 {
            best_start = 8;
        }

        let mut idx = 0;
        while idx < 8 {
            if idx == best_start {
                write!(f, "::")?;
                idx += best_len;
                continue;
            }
            if idx != 0 && idx != best_start + best_len {
                write!(f, ":")?;
            }
            write!(f, "{:x}", words[idx])?;
            idx += 1;
        }

        Ok(())
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv6 header and its payload.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv6([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_TC_FLOW: Field = 0..4;
    pub(crate) const LENGTH:      Field = 4..6;
    pub(crate) const NXT_HDR:     usize = 6;
    pub(crate) const HOP_LIMIT:   usize = 7;
    pub(crate) const SRC_ADDR:    Field = 8..24;
    pub(crate) const DST_ADDR:    Field = 24..40;
}

/// Offset of the next header field in the fixed header.
pub const NEXT_HEADER_OFFSET: usize = field::NXT_HDR;

/// Offset of the destination address.
pub const DST_ADDR_OFFSET: usize = field::DST_ADDR.start;

impl ipv6 {
    /// Imbue a raw octet buffer with IPv6 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv6 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: &[u8]) -> Result<&Self> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Mutable variant of [new_checked].
    ///
    /// [new_checked]: #method.new_checked
    pub fn new_checked_mut(buffer: &mut [u8]) -> Result<&mut Self> {
        Self::new_checked(&buffer[..])?;
        Ok(Self::new_unchecked_mut(buffer))
    }

    /// Ensure that the fixed header is present.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the version field.
    pub fn version(&self) -> u8 {
        self.0[field::VER_TC_FLOW.start] >> 4
    }

    /// Return the flow label field.
    pub fn flow_label(&self) -> u32 {
        NetworkEndian::read_u24(&self.0[1..4]) & 0x000f_ffff
    }

    /// Return the payload length field.
    pub fn payload_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the next header field.
    pub fn next_header(&self) -> Protocol {
        Protocol::from(self.0[field::NXT_HDR])
    }

    /// Return the hop limit field.
    pub fn hop_limit(&self) -> u8 {
        self.0[field::HOP_LIMIT]
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Write a fresh header with version 6 and zero traffic class and flow label.
    pub fn init(&mut self) {
        self.0[..HEADER_LEN].iter_mut().for_each(|b| *b = 0);
        self.0[field::VER_TC_FLOW.start] = 0x60;
    }

    /// Clear the traffic class and flow label, keeping the version.
    pub fn clear_flow_info(&mut self) {
        let version = self.0[0] & 0xf0;
        self.0[field::VER_TC_FLOW].iter_mut().for_each(|b| *b = 0);
        self.0[0] = version;
    }

    /// Set the payload length field.
    pub fn set_payload_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value);
    }

    /// Set the next header field.
    pub fn set_next_header(&mut self, value: Protocol) {
        self.0[field::NXT_HDR] = value.into();
    }

    /// Set the hop limit field.
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::HOP_LIMIT] = value;
    }

    /// Set the source address field.
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes());
    }

    /// Set the destination address field.
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes());
    }

    /// The bytes after the fixed header.
    pub fn payload_slice(&self) -> &[u8] {
        &self.0[HEADER_LEN..]
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
