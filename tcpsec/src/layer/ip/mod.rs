//! The ip layer, as far as the engines need it.
//!
//! Neither engine implements IP. They sit on top of an existing stack and reach it through the
//! traits of this module: [`Output`] hands a finished datagram to IP output, [`Dispatch`] is the
//! protocol switch that IPsec re-injects decapsulated datagrams into, and [`RouteMetrics`] is the
//! per-destination cache of path characteristics that TCP reads when a connection starts and
//! feeds back when it closes.
//!
//! For hosts without a routing table of their own the module offers [`Routes`], a small longest
//! prefix table implementing `RouteMetrics`, and [`Interfaces`] to compute the system wide
//! maximum MTU.
//!
//! [`Output`]: trait.Output.html
//! [`Dispatch`]: trait.Dispatch.html
//! [`RouteMetrics`]: trait.RouteMetrics.html
//! [`Routes`]: struct.Routes.html
//! [`Interfaces`]: struct.Interfaces.html
use crate::layer::Result;
use crate::storage::PacketBuf;
use crate::wire::IpProtocol;

mod iface;
mod route;


pub use self::iface::{Interface, Interfaces};
pub use self::route::{Locks, Metrics, RouteEntry, RouteMetrics, Routes};

/// Options for a single call to IP output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OutputFlags {
    /// Set the don't fragment bit and let path MTU discovery do its work.
    pub mtu_discovery: bool,
    /// Bypass the routing table, the destination is on a directly attached network.
    pub dont_route: bool,
}

/// The IP output functions of the host stack.
///
/// Both take a complete datagram, IP header included, with all checksums filled in.
pub trait Output {
    /// Send an IPv4 datagram.
    fn ipv4(&mut self, packet: PacketBuf, flags: OutputFlags) -> Result<()>;

    /// Send an IPv6 datagram.
    fn ipv6(&mut self, packet: PacketBuf, flags: OutputFlags) -> Result<()>;
}

/// The outcome of delivering a datagram to an IPv6 upper layer.
#[derive(Debug)]
pub enum Chain {
    /// The packet was consumed.
    Done,

    /// The handler processed an extension header and another one follows.
    ///
    /// The caller continues dispatching with the returned packet.
    Continue {
        /// The packet, possibly modified by the handler.
        packet: PacketBuf,
        /// Offset of the header that follows.
        offset: usize,
        /// Type of the header that follows.
        next: IpProtocol,
    },
}

/// The protocol switch of the host stack.
///
/// Decapsulated datagrams re-enter ordinary input processing through this trait.
pub trait Dispatch {
    /// Whether the protocol handler is a final consumer of the packet.
    ///
    /// Input policy is enforced before a packet reaches such a handler, since no later layer would
    /// see it.
    fn is_last_header(&self, proto: IpProtocol) -> bool;

    /// Deliver an IPv4 datagram whose payload of type `proto` starts at `hlen`.
    fn input_v4(&mut self, packet: PacketBuf, hlen: usize, proto: IpProtocol);

    /// Deliver an IPv6 datagram whose header of type `proto` starts at `offset`.
    fn input_v6(&mut self, packet: PacketBuf, offset: usize, proto: IpProtocol) -> Chain;
}
