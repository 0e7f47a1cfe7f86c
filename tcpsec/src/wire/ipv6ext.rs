//! Walking the IPv6 extension header chain.
//!
//! Every extension header starts with the same two octets, the next header type and a length,
//! but the unit of the length differs between header types ([RFC 8200 § 4], [RFC 4302 § 2.2]):
//!
//! * Hop-by-Hop, Routing and Destination Options count 8-octet units, not including the first.
//! * The Authentication Header counts 4-octet units, minus two.
//! * The Fragment header has no length field and is always 8 octets.
//!
//! [`next_header`] decodes a single header given its own type; [`Chain`] iterates a sequence of
//! them. [`protocol_offset`] uses both to find the next header field which precedes a given
//! payload offset, as needed by IPsec input which is told where the security header starts but
//! must also know which octet named it.
//!
//! [RFC 8200 § 4]: https://tools.ietf.org/html/rfc8200#section-4
//! [RFC 4302 § 2.2]: https://tools.ietf.org/html/rfc4302#section-2.2
//! [`next_header`]: fn.next_header.html
//! [`Chain`]: struct.Chain.html
//! [`protocol_offset`]: fn.protocol_offset.html
use super::{Error, Result};
use super::ip::Protocol;
use super::ipv6 as ipv6_mod;
use super::ipv6::ipv6 as ipv6_hdr;

/// The fixed length of a fragment header.
pub const FRAGMENT_LEN: usize = 8;

/// One decoded extension header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    /// The type of this header, as named by its predecessor.
    pub kind: Protocol,
    /// Offset of the header within the packet.
    pub offset: usize,
    /// Total length of the header in octets.
    pub len: usize,
    /// The type of the header that follows.
    pub next: Protocol,
}

/// Whether the protocol number is an extension header that can be walked over.
pub fn is_extension(kind: Protocol) -> bool {
    match kind {
        Protocol::HopByHop
        | Protocol::Ipv6Route
        | Protocol::Ipv6Frag
        | Protocol::Ipv6Opts
        | Protocol::Ah => true,
        _ => false,
    }
}

/// Decode the extension header of type `kind` at the start of `bytes`.
///
/// Returns the type of the following header and the length of this one. Only the first two
/// octets need to be present. A `kind` which is not a walkable extension header is an
/// `Error::Unrecognized`.
pub fn next_header(kind: Protocol, bytes: &[u8]) -> Result<(Protocol, usize)> {
    if bytes.len() < 2 {
        return Err(Error::Truncated);
    }

    let next = Protocol::from(bytes[0]);
    let len = match kind {
        Protocol::Ah => (usize::from(bytes[1]) + 2) * 4,
        Protocol::Ipv6Frag => FRAGMENT_LEN,
        Protocol::HopByHop
        | Protocol::Ipv6Route
        | Protocol::Ipv6Opts => (usize::from(bytes[1]) + 1) * 8,
        _ => return Err(Error::Unrecognized),
    };

    Ok((next, len))
}

/// Iterator over consecutive extension headers.
///
/// Ends at the first header type that is not an extension header, or after yielding an error.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    bytes: &'a [u8],
    offset: usize,
    kind: Protocol,
    done: bool,
}

impl<'a> Chain<'a> {
    /// Start walking at `offset`, where a header of type `kind` is located.
    pub fn new(bytes: &'a [u8], offset: usize, kind: Protocol) -> Self {
        Chain { bytes, offset, kind, done: false }
    }

    /// Walk all extension headers after a fixed IPv6 header.
    pub fn after_header(packet: &'a [u8]) -> Result<Self> {
        let header = ipv6_hdr::new_checked(packet)?;
        Ok(Chain::new(packet, ipv6_mod::HEADER_LEN, header.next_header()))
    }

    /// The offset of the header that would be decoded next.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The type of the header that would be decoded next.
    pub fn kind(&self) -> Protocol {
        self.kind
    }
}

impl Iterator for Chain<'_> {
    type Item = Result<Extension>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !is_extension(self.kind) {
            return None;
        }

        let rest = self.bytes.get(self.offset..).unwrap_or(&[]);
        match next_header(self.kind, rest) {
            Ok((next, len)) => {
                let ext = Extension { kind: self.kind, offset: self.offset, len, next };
                self.offset += len;
                self.kind = next;
                Some(Ok(ext))
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

/// Find the offset of the next header field that names the header at `skip`.
///
/// When `skip` is the end of the fixed header this is the field in the fixed header itself.
/// Otherwise the extension headers are walked and their lengths must add up exactly to `skip`,
/// any other outcome is reported as `Error::Malformed`.
pub fn protocol_offset(packet: &[u8], skip: usize) -> Result<usize> {
    if skip < ipv6_mod::HEADER_LEN {
        return Err(Error::Malformed);
    }

    ipv6_hdr::new_checked(packet)?;
    if skip == ipv6_mod::HEADER_LEN {
        return Ok(ipv6_mod::NEXT_HEADER_OFFSET);
    }

    for ext in Chain::after_header(packet)? {
        let ext = ext?;
        let end = ext.offset + ext.len;
        if end == skip {
            // The next header octet is the first of every extension header.
            return Ok(ext.offset);
        }
        if end > skip {
            return Err(Error::Malformed);
        }
    }

    Err(Error::Malformed)
}
