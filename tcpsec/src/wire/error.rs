use core::fmt;

/// The error type for parsing of packet bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// A packet could not be parsed because it was shorter than assumed.
    ///
    /// The packet may be shorter than the minimum length specified, a size longer than the actual
    /// payload. For variable length packets, this may be because some of its fields were out of
    /// bounds of the received data. Buffer operations report this as well when asked for more
    /// bytes than the chain holds.
    Truncated,

    /// A packet had an incorrect checksum.
    WrongChecksum,

    /// A packet could not be recognized.
    ///
    /// E.g. an extension header chain containing a header type that is not an extension header
    /// at a point where one was required, or an IP version other than 4 or 6.
    Unrecognized,

    /// A packet was recognized but was self-contradictory.
    ///
    /// Examples: an IPv4 header length below 20 bytes; an extension header chain whose lengths
    /// do not add up to the offset the caller was promised.
    Malformed,

    /// Parsing depends on information derived from a non-implemented features.
    Unsupported,
}

/// The result type for byte level operations.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated packet"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Unrecognized  => write!(f, "unrecognized packet"),
            Error::Unsupported   => write!(f, "unsupported option"),
            Error::Malformed     => write!(f, "malformed packet"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
