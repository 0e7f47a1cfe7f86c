//! The first octets of the three IPsec security headers.
//!
//! Only what is needed to find the security association is decoded here: the Security Parameter
//! Index of ESP ([RFC 4303 § 2]) and AH ([RFC 4302 § 2]) and the Compression Parameter Index of
//! IPCOMP ([RFC 3173 § 2.2]).
//!
//! ```text
//!  ESP     | SPI (32)                                  | Sequence Number (32)          |
//!  AH      | Next | Len | Reserved (16)               | SPI (32)                      |
//!  IPCOMP  | Next | Flags | CPI (16)                  |
//! ```
//!
//! [RFC 4303 § 2]: https://tools.ietf.org/html/rfc4303#section-2
//! [RFC 4302 § 2]: https://tools.ietf.org/html/rfc4302#section-2
//! [RFC 3173 § 2.2]: https://tools.ietf.org/html/rfc3173#section-2.2
use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::Protocol;

/// The smallest amount of header any of the security protocols carries.
///
/// Two 32-bit words: SPI and sequence number for ESP, the fixed part for AH.
pub const MIN_HEADER_LEN: usize = 8;

mod field {
    use crate::wire::field::Field;

    pub(crate) const ESP_SPI: Field = 0..4;
    pub(crate) const AH_SPI: Field = 4..8;
    pub(crate) const IPCOMP_CPI: Field = 2..4;
}

/// One of the protocols handled by IPsec input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityProtocol {
    /// Encapsulating security payload.
    Esp,
    /// Authentication header.
    Ah,
    /// IP payload compression.
    IpComp,
}

impl SecurityProtocol {
    /// All protocols, in protocol number order.
    pub const ALL: [SecurityProtocol; 3] = [
        SecurityProtocol::Esp,
        SecurityProtocol::Ah,
        SecurityProtocol::IpComp,
    ];

    /// Map an IP protocol number to a security protocol.
    pub fn from_protocol(protocol: Protocol) -> Option<Self> {
        match protocol {
            Protocol::Esp => Some(SecurityProtocol::Esp),
            Protocol::Ah => Some(SecurityProtocol::Ah),
            Protocol::IpComp => Some(SecurityProtocol::IpComp),
            _ => None,
        }
    }

    /// The IP protocol number of this security protocol.
    pub fn protocol(self) -> Protocol {
        match self {
            SecurityProtocol::Esp => Protocol::Esp,
            SecurityProtocol::Ah => Protocol::Ah,
            SecurityProtocol::IpComp => Protocol::IpComp,
        }
    }

    /// Extract the parameter index from the start of this protocol's header.
    ///
    /// For IPCOMP the 16-bit compression parameter index is widened to 32 bits, compression
    /// associations live in the same index space as the others.
    pub fn spi(self, header: &[u8]) -> Result<u32> {
        let field = match self {
            SecurityProtocol::Esp => field::ESP_SPI,
            SecurityProtocol::Ah => field::AH_SPI,
            SecurityProtocol::IpComp => field::IPCOMP_CPI,
        };

        let bytes = header.get(field).ok_or(Error::Truncated)?;
        Ok(match self {
            SecurityProtocol::IpComp => u32::from(NetworkEndian::read_u16(bytes)),
            _ => NetworkEndian::read_u32(bytes),
        })
    }
}

impl From<SecurityProtocol> for Protocol {
    fn from(proto: SecurityProtocol) -> Protocol {
        proto.protocol()
    }
}

impl fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.protocol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esp_spi_leads() {
        let header = [0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 1];
        assert_eq!(SecurityProtocol::Esp.spi(&header), Ok(0xdeadbeef));
    }

    #[test]
    fn ah_spi_after_length() {
        let header = [0x06, 0x04, 0x00, 0x00, 0x00, 0x00, 0x10, 0x01, 0, 0, 0, 7];
        assert_eq!(SecurityProtocol::Ah.spi(&header), Ok(0x1001));
    }

    #[test]
    fn ipcomp_cpi_widened() {
        let header = [0x06, 0x00, 0xff, 0xfe];
        assert_eq!(SecurityProtocol::IpComp.spi(&header), Ok(0x0000fffe));
    }

    #[test]
    fn truncated_header() {
        assert_eq!(SecurityProtocol::Ah.spi(&[0; 7]), Err(Error::Truncated));
        assert_eq!(SecurityProtocol::IpComp.spi(&[0; 3]), Err(Error::Truncated));
    }

    #[test]
    fn protocol_mapping() {
        for &proto in SecurityProtocol::ALL.iter() {
            assert_eq!(SecurityProtocol::from_protocol(proto.protocol()), Some(proto));
        }
        assert_eq!(SecurityProtocol::from_protocol(Protocol::Tcp), None);
    }
}
