//! Reactions to asynchronous network events, usually delivered by ICMP.
use crate::layer::{Error, Result};
use crate::layer::ip::RouteMetrics;

use super::config::Config;
use super::control::{State, TcpControlBlock};
use super::pcb::{OwningPcb, SocketError};
use super::stats::Stats;
use super::SegmentOutput;

/// A control message about a destination, as decoded by ICMP input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// The interface went down.
    IfDown,
    /// The route became unusable.
    RouteDead,
    /// The datagram was too large for the path.
    MsgSize,
    /// The destination host is dead.
    HostDead,
    /// The destination host is unreachable.
    HostUnreach,
    /// The destination network is unreachable.
    UnreachNet,
    /// The destination host is unreachable.
    UnreachHost,
    /// The destination does not speak the protocol.
    UnreachProtocol,
    /// The destination port is closed.
    UnreachPort,
    /// Fragmentation was needed but forbidden.
    UnreachNeedFrag,
    /// Source routing failed.
    UnreachSrcFail,
    /// Source quench, the path is congested.
    Quench,
    /// Use a different gateway for the network.
    RedirectNet,
    /// Use a different gateway for the host.
    RedirectHost,
    /// The time to live expired in transit.
    TimeExceedTransit,
    /// Fragment reassembly timed out.
    TimeExceedReassembly,
    /// A header field was wrong.
    ParamProblem,
}

/// What a connection should do about a control message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Record the error as a soft error.
    Notify(SocketError),
    /// Shrink the congestion window.
    Quench,
    /// The path MTU shrank, retransmit with smaller segments.
    PathMtu,
    /// Nothing to do.
    Ignore,
}

impl ControlCommand {
    /// The error a socket would see for this message, if any.
    pub fn socket_error(self) -> Option<SocketError> {
        match self {
            ControlCommand::MsgSize
            | ControlCommand::UnreachNeedFrag => Some(SocketError::MessageSize),
            ControlCommand::HostDead => Some(SocketError::HostDown),
            ControlCommand::HostUnreach
            | ControlCommand::UnreachNet
            | ControlCommand::UnreachHost
            | ControlCommand::UnreachSrcFail => Some(SocketError::HostUnreachable),
            ControlCommand::UnreachProtocol
            | ControlCommand::UnreachPort => Some(SocketError::ConnectionRefused),
            ControlCommand::ParamProblem => Some(SocketError::ProtocolOption),
            _ => None,
        }
    }

    /// Decide how a connection reacts to this message.
    pub fn action(self, config: &Config) -> Action {
        match self {
            ControlCommand::Quench => Action::Quench,
            ControlCommand::MsgSize if config.mtu_discovery => Action::PathMtu,
            other => match other.socket_error() {
                Some(err) => Action::Notify(err),
                None => Action::Ignore,
            },
        }
    }
}

impl TcpControlBlock {
    /// Record an asynchronous error of the connection.
    ///
    /// An established connection ignores errors saying that the destination can not be reached,
    /// such conditions are often transient and the connection evidently worked. A connection that
    /// never got established and keeps retransmitting turns a repeated error into a hard error on
    /// the socket. In every other case the error is remembered as the soft error, reported only if
    /// the connection eventually times out.
    ///
    /// Threads blocked on the socket are woken in any case so they get a chance to look at it.
    pub fn notify_soft_error(&mut self, err: SocketError) {
        let transient = match err {
            SocketError::HostUnreachable
            | SocketError::NetUnreachable
            | SocketError::HostDown => true,
            _ => false,
        };

        if self.state == State::Established && transient {
            net_trace!("tcp {}: suppressed {} while established", self.pcb.remote(), err);
        } else if !self.state.have_established()
            && self.rtt.rxtshift > u32::from(self.config.soft_error_retransmit_threshold)
            && self.soft_error.is_some()
        {
            net_trace!("tcp {}: hard error {}", self.pcb.remote(), err);
            self.socket_mut().error = Some(err);
        } else {
            net_trace!("tcp {}: soft error {}", self.pcb.remote(), err);
            self.soft_error = Some(err);
        }

        self.socket_mut().wakeups.wake_all();
    }

    /// Record an asynchronous error of an IPv6 connection.
    ///
    /// The same rules as for [`notify_soft_error`] apply. Fails with `AddressFamily` when the
    /// connection is not attached to an IPv6 control block.
    ///
    /// [`notify_soft_error`]: #method.notify_soft_error
    pub fn notify_soft_error_v6(&mut self, err: SocketError) -> Result<()> {
        match self.pcb {
            OwningPcb::V6(_) => {
                self.notify_soft_error(err);
                Ok(())
            },
            _ => Err(Error::AddressFamily),
        }
    }

    /// React to a path MTU notification for the route of this connection.
    ///
    /// A route to a network is re-resolved first, so that a host route carrying the new MTU can
    /// be found. If the route knows its MTU, or the notification came with one, the congestion
    /// window restarts from the initial window for it. Then everything not yet acknowledged is
    /// sent again.
    pub fn handle_path_mtu_notification(
        &mut self,
        routes: &mut dyn RouteMetrics,
        mtu_hint: Option<u32>,
        output: &mut dyn SegmentOutput,
        stats: &mut Stats,
    ) {
        let dst = self.pcb.remote().addr;
        let mut route = routes.get(&dst);

        if let Some(entry) = route {
            if !entry.host {
                route = routes.refresh(&dst);
                if route.is_none() {
                    net_debug!("tcp {}: no route after path MTU change", self.pcb.remote());
                    return;
                }
            }
        }

        if let Some(entry) = route {
            let mtu = match entry.mtu {
                0 => mtu_hint.unwrap_or(0),
                mtu => mtu,
            };
            if mtu != 0 {
                self.snd.cwnd = self.config.initial_window.bytes(mtu);
            }
        }

        net_trace!("tcp {}: path MTU changed, resend from {}", self.pcb.remote(), self.snd.una);
        self.snd.nxt = self.snd.una;
        stats.mturesent += 1;
        if let Err(err) = output.output(self) {
            net_debug!("tcp {}: output after path MTU change failed: {}", self.pcb.remote(), err);
        }
    }

    /// Apply a control message addressed to this connection.
    ///
    /// Returns the action that was taken.
    pub fn control_input(
        &mut self,
        cmd: ControlCommand,
        routes: &mut dyn RouteMetrics,
        mtu_hint: Option<u32>,
        output: &mut dyn SegmentOutput,
        stats: &mut Stats,
    ) -> Action {
        let action = cmd.action(&self.config);
        match action {
            Action::Notify(err) => match self.pcb {
                OwningPcb::V4(_) => self.notify_soft_error(err),
                OwningPcb::V6(_) => {
                    // Cannot fail, the family was just matched.
                    let _ = self.notify_soft_error_v6(err);
                },
            },
            Action::Quench => self.quench(),
            Action::PathMtu => self.handle_path_mtu_notification(routes, mtu_hint, output, stats),
            Action::Ignore => (),
        }
        action
    }
}
