use core::{cmp, fmt, ops};

use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::{checksum, Address, Protocol};

/// Length of a TCP header without options.
pub const HEADER_LEN: usize = 20;

/// The largest window representable in the 16-bit header field.
pub const MAX_WINDOW: u32 = 65_535;

/// The largest window shift permitted by RFC 7323.
pub const MAX_WINDOW_SHIFT: u8 = 14;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
/// Sequence numbers do not have a discontiguity when compared pairwise across an overflow, two
/// numbers are ordered by the sign of their wrapping difference.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub u32);

impl SeqNumber {
    /// The signed distance from `other` to `self`.
    pub fn since(self, other: SeqNumber) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ops::Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs))
    }
}

impl ops::Sub<u32> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_sub(rhs))
    }
}

impl ops::AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.since(*other).partial_cmp(&0)
    }
}

/// A set of tcp flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

impl Flags {
    /// No flag set.
    pub const NONE: Flags = Flags(0);
    /// Finish, no more data from sender.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// Synchronize sequence numbers.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// Reset the connection.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// Push function.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// Acknowledgment field significant.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// Urgent pointer field significant.
    pub const URG: Flags = Flags(field::FLG_URG);

    /// Check if all flags of `other` are set.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the syn flag is set.
    pub fn syn(self) -> bool {
        self.contains(Flags::SYN)
    }

    /// Whether the rst flag is set.
    pub fn rst(self) -> bool {
        self.contains(Flags::RST)
    }

    /// Whether the fin flag is set.
    pub fn fin(self) -> bool {
        self.contains(Flags::FIN)
    }

    /// Whether the ack flag is set.
    pub fn ack(self) -> bool {
        self.contains(Flags::ACK)
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (Flags::SYN, "SYN"), (Flags::ACK, "ACK"), (Flags::FIN, "FIN"),
            (Flags::RST, "RST"), (Flags::PSH, "PSH"), (Flags::URG, "URG"),
        ];
        let mut first = true;
        for &(flag, name) in names.iter() {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const FLAGS:    Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u16 = 0x001;
    pub(crate) const FLG_SYN: u16 = 0x002;
    pub(crate) const FLG_RST: u16 = 0x004;
    pub(crate) const FLG_PSH: u16 = 0x008;
    pub(crate) const FLG_ACK: u16 = 0x010;
    pub(crate) const FLG_URG: u16 = 0x020;
}

byte_wrapper! {
    /// A byte sequence representing a TCP header, options and payload.
    #[derive(Debug, PartialEq, Eq)]
    pub struct tcp([u8]);
}

impl tcp {
    /// Imbue a raw octet buffer with TCP segment structure.
    pub fn new_unchecked(buffer: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with TCP segment structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: &[u8]) -> Result<&Self> {
        let segment = Self::new_unchecked(buffer);
        segment.check_len()?;
        Ok(segment)
    }

    /// Ensure the header, including options, is within the buffer.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        let header_len = self.header_len();
        if header_len < HEADER_LEN {
            Err(Error::Malformed)
        } else if header_len > self.0.len() {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the source port field.
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the sequence number field.
    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    pub fn ack_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::ACK_NUM]))
    }

    /// Return the flags, without the data offset.
    pub fn flags(&self) -> Flags {
        Flags(NetworkEndian::read_u16(&self.0[field::FLAGS]) & 0x0fff)
    }

    /// Return the header length, in octets.
    pub fn header_len(&self) -> usize {
        usize::from(self.0[field::FLAGS.start] >> 4) * 4
    }

    /// Return the window size field.
    pub fn window_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::WIN_SIZE])
    }

    /// Return the checksum field.
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    pub fn urgent_at(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::URGENT])
    }

    /// Validate the checksum over the whole buffer.
    pub fn verify_checksum(&self, src: Address, dst: Address) -> bool {
        let pseudo = match checksum::pseudo_header(src, dst, Protocol::Tcp, self.0.len() as u32) {
            Some(pseudo) => pseudo,
            None => return false,
        };
        checksum::combine(&[pseudo, checksum::data(&self.0)]) == !0
    }

    /// Set the source port field.
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::DST_PORT], value)
    }

    /// Set the sequence number field.
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_u32(&mut self.0[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_u32(&mut self.0[field::ACK_NUM], value.0)
    }

    /// Set the flags, keeping the data offset. Reserved bits are cleared.
    pub fn set_flags(&mut self, flags: Flags) {
        let offset = NetworkEndian::read_u16(&self.0[field::FLAGS]) & 0xf000;
        NetworkEndian::write_u16(&mut self.0[field::FLAGS], offset | (flags.0 & 0x01ff))
    }

    /// Set the header length, in octets. Reserved bits are cleared.
    pub fn set_header_len(&mut self, len: usize) {
        let flags = self.flags().0 & 0x01ff;
        let offset = ((len / 4) as u16) << 12;
        NetworkEndian::write_u16(&mut self.0[field::FLAGS], offset | flags)
    }

    /// Set the window size field.
    pub fn set_window_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    pub fn set_urgent_at(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::URGENT], value)
    }

    /// Compute and fill the checksum over the whole buffer.
    ///
    /// Returns `Error::Unsupported` when the addresses are not of the same family.
    pub fn fill_checksum(&mut self, src: Address, dst: Address) -> Result<()> {
        let pseudo = checksum::pseudo_header(src, dst, Protocol::Tcp, self.0.len() as u32)
            .ok_or(Error::Unsupported)?;
        self.set_checksum(0);
        let sum = checksum::combine(&[pseudo, checksum::data(&self.0)]);
        self.set_checksum(!sum);
        Ok(())
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::Ipv4Address;

    const SRC_ADDR: Ipv4Address = Ipv4Address([192, 168, 1, 1]);
    const DST_ADDR: Ipv4Address = Ipv4Address([192, 168, 1, 2]);

    static SEGMENT_BYTES: [u8; 24] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x50, 0x35, 0x01, 0x23,
         0x00, 0x00, 0x02, 0x01,
         0xaa, 0x00, 0x00, 0xff];

    #[test]
    fn seq_number_wraps() {
        let high = SeqNumber(u32::max_value() - 1);
        let low = high + 4;
        assert_eq!(low, SeqNumber(2));
        assert!(high < low);
        assert!(low > high);
        assert_eq!(low.since(high), 4);
        assert_eq!(high.since(low), -4);
    }

    #[test]
    fn deconstruct() {
        let segment = tcp::new_checked(&SEGMENT_BYTES[..]).unwrap();
        assert_eq!(segment.src_port(), 48896);
        assert_eq!(segment.dst_port(), 80);
        assert_eq!(segment.seq_number(), SeqNumber(0x01234567));
        assert_eq!(segment.ack_number(), SeqNumber(0x89abcdef));
        assert_eq!(segment.header_len(), 20);
        assert_eq!(segment.flags(), Flags::FIN | Flags::RST | Flags::ACK | Flags::URG);
        assert_eq!(segment.window_len(), 0x0123);
        assert_eq!(segment.urgent_at(), 0x0201);
    }

    #[test]
    fn checksum_roundtrip() {
        let mut bytes = SEGMENT_BYTES;
        let segment = tcp::new_unchecked_mut(&mut bytes[..]);
        segment.fill_checksum(SRC_ADDR.into(), DST_ADDR.into()).unwrap();
        assert!(segment.verify_checksum(SRC_ADDR.into(), DST_ADDR.into()));
        assert!(!segment.verify_checksum(DST_ADDR.into(), DST_ADDR.into()));
    }

    #[test]
    fn header_len_keeps_flags() {
        let mut bytes = SEGMENT_BYTES;
        let segment = tcp::new_unchecked_mut(&mut bytes[..]);
        segment.set_header_len(24);
        assert_eq!(segment.header_len(), 24);
        assert_eq!(segment.flags(), Flags::FIN | Flags::RST | Flags::ACK | Flags::URG);
        segment.set_flags(Flags::RST);
        assert_eq!(segment.header_len(), 24);
        assert_eq!(segment.flags(), Flags::RST);
    }
}
