//! The TCP control block engine.
//!
//! This is everything about a connection that happens outside of the segment processing path.
//! Segment input, output, retransmission and the timer handlers belong to the host stack, which
//! calls into this module at the points where connection state is created, sized, informed about
//! the network or torn down.
//!
//! ## Structure
//!
//! A connection is a [`TcpControlBlock`]. It owns the protocol control block of its address
//! family, an [`OwningPcb`], which in turn holds the socket state that the engine reads (buffer
//! sizes) and writes (errors, wakeups). The engine touches no global state: configuration is a
//! [`Config`] snapshot taken when the control block is created, the route cache is passed in as a
//! [`RouteMetrics`], and IP output as an [`Output`] or [`SegmentOutput`].
//!
//! [`TcpControlBlock`]: struct.TcpControlBlock.html
//! [`OwningPcb`]: enum.OwningPcb.html
//! [`Config`]: struct.Config.html
//! [`RouteMetrics`]: ../ip/trait.RouteMetrics.html
//! [`Output`]: ../ip/trait.Output.html
//! [`SegmentOutput`]: trait.SegmentOutput.html
//!
//! Each control block is meant to be owned by exactly one caller at a time. [`Connections`] is a
//! table that provides this ownership with stable keys, a lookup by addresses and ports and the
//! iterate-and-match needed for ICMP notifications.
//!
//! [`Connections`]: struct.Connections.html
//!
//! ## Life of a connection
//!
//! 1. [`TcpControlBlock::new`] with the configured option policy and segment size defaults.
//! 2. [`advertise_mss`] for the SYN, [`apply_peer_mss`] once the peer's SYN arrived and
//!    [`seed_rtt_from_route`] before the first round trip measurement.
//! 3. [`enter_established`] when the handshake completes.
//! 4. Measurements through [`update_rtt`], ICMP through [`control_input`] or the individual
//!    handlers, bare acknowledgements and keepalives through [`build_response`].
//! 5. [`close_connection`] or [`drop_connection`], which consume the control block, hand back the
//!    protocol control block and feed measurements back to the route.
//!
//! [`TcpControlBlock::new`]: struct.TcpControlBlock.html#method.new
//! [`advertise_mss`]: struct.TcpControlBlock.html#method.advertise_mss
//! [`apply_peer_mss`]: struct.TcpControlBlock.html#method.apply_peer_mss
//! [`seed_rtt_from_route`]: struct.TcpControlBlock.html#method.seed_rtt_from_route
//! [`enter_established`]: struct.TcpControlBlock.html#method.enter_established
//! [`update_rtt`]: struct.TcpControlBlock.html#method.update_rtt
//! [`control_input`]: struct.TcpControlBlock.html#method.control_input
//! [`build_response`]: fn.build_response.html
//! [`close_connection`]: struct.TcpControlBlock.html#method.close_connection
//! [`drop_connection`]: struct.TcpControlBlock.html#method.drop_connection
//!
//! ## Deviations
//!
//! The route cache is updated without any transaction. Two connections to the same destination
//! closing at the same time may race on the average, the values are heuristics only.
//!
//! Initial sequence numbers follow rfc6528 with SipHash-2-4 as the keyed function.
use crate::layer::Result;

mod close;
mod config;
mod control;
mod iss;
mod mss;
mod notify;
mod pcb;
mod respond;
mod rtt;
mod stats;
mod table;
mod timer;

#[cfg(test)]
mod tests;

pub use self::config::{Config, InitialWindow};
pub use self::control::{Options, Receive, Send, State, TcpControlBlock};
pub use self::iss::IsnGenerator;
pub use self::mss::{negotiate_mss_outgoing, MIN_PEER_MSS};
pub use self::notify::{Action, ControlCommand};
pub use self::pcb::{
    FourTuple,
    Ipv4Pcb,
    Ipv6Pcb,
    OwningPcb,
    SockBuf,
    Socket,
    SocketError,
    Wakeups};
pub use self::respond::{build_response, reverse_endpoints, Endpoints, ResponseSource, MAX_RESPONSE_LEN};
pub use self::rtt::{Rtt, ROUTE_RTT_UNIT, RTTVAR_SHIFT, RTT_BASE_SHIFT, RTT_SHIFT};
pub use self::stats::Stats;
pub use self::table::{ConnectionKey, Connections};
pub use self::timer::{TimerHandle, TimerKind, Timers};

/// The segment output of the host stack.
///
/// Called when the engine wants whatever the connection has outstanding to be sent right away:
/// the retransmission after a path MTU change and the reset of a dropped connection. The
/// implementation inspects the state of the control block to decide what to send.
pub trait SegmentOutput {
    /// Try to send segments for the connection.
    fn output(&mut self, tcb: &mut TcpControlBlock) -> Result<()>;
}
