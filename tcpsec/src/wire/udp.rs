use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::{checksum, Address, Protocol};

/// Length of the UDP header.
pub const HEADER_LEN: usize = 8;

byte_wrapper! {
    /// A byte sequence representing a UDP datagram.
    #[derive(Debug, PartialEq, Eq)]
    pub struct udp([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const LENGTH:   Field = 4..6;
    pub(crate) const CHECKSUM: Field = 6..8;
}

impl udp {
    /// Imbue a raw octet buffer with UDP packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with UDP packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Checked constructor for a mutable buffer.
    pub fn new_checked_mut(buffer: &mut [u8]) -> Result<&mut Self> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        Ok(Self::new_unchecked_mut(buffer))
    }

    /// Return the source port field.
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the length field.
    pub fn len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the checksum field.
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Set the length field.
    pub fn set_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the checksum field.
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Validate the checksum over the whole buffer.
    ///
    /// A zero checksum means none was computed, which only IPv4 permits.
    pub fn verify_checksum(&self, src: Address, dst: Address) -> bool {
        if self.checksum() == 0 {
            return matches!(src, Address::Ipv4(_));
        }

        match checksum::pseudo_header(src, dst, Protocol::Udp, self.0.len() as u32) {
            Some(pseudo) => checksum::combine(&[pseudo, checksum::data(&self.0)]) == !0,
            None => false,
        }
    }

    /// Compute and fill the checksum over the whole buffer.
    pub fn fill_checksum(&mut self, src: Address, dst: Address) -> Result<()> {
        let pseudo = checksum::pseudo_header(src, dst, Protocol::Udp, self.0.len() as u32)
            .ok_or(Error::Unsupported)?;
        self.set_checksum(0);
        let sum = !checksum::combine(&[pseudo, checksum::data(&self.0)]);
        // RFC 768: an all zero checksum is transmitted as all ones.
        self.set_checksum(if sum == 0 { 0xffff } else { sum });
        Ok(())
    }
}
