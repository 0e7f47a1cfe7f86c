//! The IPsec input pipeline.
//!
//! A datagram whose protocol number says ESP, AH or IPCOMP is handed to [`Receiver::input_v4`] or
//! [`Receiver::input_v6`]. The pipeline reads the parameter index from the security header, finds
//! the [`SecurityAssociation`] in the host's [`SaStore`] and passes the packet to that
//! association's [`Transform`]. The pipeline does not decrypt, verify or decompress anything
//! itself.
//!
//! When the transform is done, possibly much later, it calls back through [`Completion`]. The
//! callback repairs the outer header, records the transfer on the association, checks the inbound
//! [`Policy`] and finally re-injects the plaintext into protocol dispatch.
//!
//! ```text
//! received -> spi extracted -> lookup -+-> transform -+-> callback -> dispatch
//!                                      |              '-> dropped (transform failed)
//!                                      '-> dropped (no association)
//! ```
//!
//! Every drop is counted in [`Stats`] against the protocol the packet claimed to be, and the
//! buffer goes back to the host's [`Release`].
//!
//! [`Receiver::input_v4`]: struct.Receiver.html#method.input_v4
//! [`Receiver::input_v6`]: struct.Receiver.html#method.input_v6
//! [`SecurityAssociation`]: struct.SecurityAssociation.html
//! [`SaStore`]: trait.SaStore.html
//! [`Transform`]: trait.Transform.html
//! [`Completion`]: trait.Completion.html
//! [`Policy`]: trait.Policy.html
//! [`Stats`]: struct.Stats.html
//! [`Release`]: ../../storage/trait.Release.html
use alloc::sync::Arc;

use crate::layer::Result;
use crate::storage::PacketBuf;
use crate::wire::IpVersion;

mod callback;
mod config;
mod input;
mod sa;
mod stats;


pub use self::config::Config;
pub use self::input::{Host, Pipeline, Receiver};
pub use self::sa::{Lifetime, Mode, SaDestination, SaStore, SaTable, SecurityAssociation};
pub use self::stats::{Ip6Stats, ProtocolStats, Stats};

enum_with_unknown! {
    /// The address family a packet is processed in.
    ///
    /// Uses the BSD socket address family numbers.
    pub doc enum AddressFamily(u8) {
        /// IPv4.
        Inet = 2,
        /// IPv6.
        Inet6 = 24,
    }
}

impl AddressFamily {
    /// The IP version of the family, if it is one.
    pub fn version(self) -> Option<IpVersion> {
        match self {
            AddressFamily::Inet => Some(IpVersion::Ipv4),
            AddressFamily::Inet6 => Some(IpVersion::Ipv6),
            AddressFamily::Unknown(_) => None,
        }
    }
}

impl From<IpVersion> for AddressFamily {
    fn from(version: IpVersion) -> Self {
        match version {
            IpVersion::Ipv4 => AddressFamily::Inet,
            IpVersion::Ipv6 => AddressFamily::Inet6,
        }
    }
}

/// The cryptographic part of a security protocol.
///
/// Decrypts, verifies or decompresses the packet of one association. The pipeline keeps its
/// reference to the association only for the duration of `input`. A transform that finishes
/// asynchronously has to clone the `Arc` itself and later resume through a fresh [`Receiver`].
///
/// A transform that did its work on a crypto offload engine attaches an `IpsecCryptoDone` tag.
///
/// [`Receiver`]: struct.Receiver.html
pub trait Transform: Send + Sync {
    /// Start processing a packet whose security header starts at `skip`.
    ///
    /// `protoff` is the offset of the octet naming the security header. The transform strips its
    /// header, rewrites that octet to the protocol it uncovered and calls `done` with the result.
    /// On failure the transform disposes of the packet and returns the error.
    fn input(
        &self,
        packet: PacketBuf,
        sa: &Arc<SecurityAssociation>,
        skip: usize,
        protoff: usize,
        done: &mut dyn Completion,
    ) -> Result<()>;
}

/// Continuation of the pipeline after a transform has finished.
pub trait Completion {
    /// Hand back a processed packet.
    fn complete(
        &mut self,
        packet: PacketBuf,
        sa: &SecurityAssociation,
        skip: usize,
        protoff: usize,
    ) -> Result<()>;
}

/// The inbound security policy.
pub trait Policy {
    /// Whether the decapsulated packet violates the policy and must be dropped.
    fn reject(&self, packet: &PacketBuf, version: IpVersion) -> bool;
}

/// A policy that accepts every packet.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Policy for AcceptAll {
    fn reject(&self, _: &PacketBuf, _: IpVersion) -> bool {
        false
    }
}
