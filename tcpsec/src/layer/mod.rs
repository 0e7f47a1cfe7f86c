//! The process logic of the protocol engines.
//!
//! ## Layering
//!
//! Each protocol is split into two parts; the packet logic contained in `wire` and the processing
//! part in this module. The engines here own protocol *state*, a TCP control block or the
//! statistics and configuration of IPsec input, and transform packets on behalf of that state.
//!
//! ## Collaborators
//!
//! Neither engine is a complete stack. Whatever lies outside of them is reached through traits:
//! IP output, protocol dispatch and the route cache in [`ip`], segment output in [`tcp`], the key
//! database, transforms and input policy in [`ipsec`]. A host provides its implementations while
//! the tests of each layer provide small recording fakes.
//!
//! ## Errors
//!
//! All engines report through the [`Error`] of this module. It distinguishes the cases a caller
//! must treat differently: resource exhaustion, protocol violations, security failures and
//! missing routes.
//!
//! [`ip`]: ip/index.html
//! [`tcp`]: tcp/index.html
//! [`ipsec`]: ipsec/index.html
//! [`Error`]: enum.Error.html
use core::fmt;

pub mod ip;
pub mod ipsec;
pub mod tcp;

/// The result type of layer operations.
pub type Result<T> = core::result::Result<T, Error>;

/// An error of one of the protocol engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when a packet contradicts the state it is processed against, for example an
    /// inbound policy rejecting a decapsulated packet.
    Illegal,

    /// Not enough space for the requested packet.
    ///
    /// May also be returned when trying to resize a packet but the requested length can not be
    /// fulfilled. In contrast to `Illegal` this would signal that a smaller size may be possible.
    BadSize,

    /// Unable to find a route towards the destination address.
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that implies that it would have been legal with
    /// more resources.
    Exhausted,

    /// No buffer could be obtained or made contiguous.
    NoBufs,

    /// The packet to be built exceeds the space available for it.
    MessageSize,

    /// The address family is not supported by the operation.
    AddressFamily,

    /// No security association matched.
    NotFound,

    /// The protocol is administratively disabled.
    Disabled,

    /// A security association without transform.
    NoTransform,

    /// A header or header chain is malformed.
    Malformed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Illegal => write!(f, "operation not permitted"),
            Error::BadSize => write!(f, "bad packet size"),
            Error::Unreachable => write!(f, "no route to destination"),
            Error::Exhausted => write!(f, "resources exhausted"),
            Error::NoBufs => write!(f, "no buffer space available"),
            Error::MessageSize => write!(f, "message too long"),
            Error::AddressFamily => write!(f, "address family not supported"),
            Error::NotFound => write!(f, "no matching security association"),
            Error::Disabled => write!(f, "protocol disabled"),
            Error::NoTransform => write!(f, "security association without transform"),
            Error::Malformed => write!(f, "malformed header"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Can convert from a wire error.
///
/// This indicates some layer tried to operate on a packet but failed. Only a packet that ended too
/// early is reported differently, as that is what a failed pullup looks like.
impl From<crate::wire::Error> for Error {
    fn from(err: crate::wire::Error) -> Self {
        use crate::wire::Error as WireError;
        match err {
            WireError::Truncated => Error::BadSize,
            WireError::Malformed | WireError::Unrecognized => Error::Malformed,
            WireError::WrongChecksum | WireError::Unsupported => Error::Illegal,
        }
    }
}
