//! Segment size negotiation and socket buffer sizing.
use crate::layer::ip::{Interface, Interfaces, RouteMetrics};
use crate::time::Instant;
use crate::wire::{IpVersion, IPV4_HEADER_LEN, IPV6_HEADER_LEN, TCP_HEADER_LEN};

use super::config::Config;
use super::control::{State, TcpControlBlock};
use super::timer::TimerKind;

/// Peers may not offer a segment size smaller than this.
pub const MIN_PEER_MSS: u32 = 32;

/// The segment size to advertise in our SYN.
///
/// Starts from the MTU of the outgoing interface. Unless `mss_ifmtu` is configured the largest MTU
/// of any non-loopback interface is used if it is larger, since the path could lead through it.
/// The IP and TCP header sizes of the family are subtracted and the result is never smaller than
/// the configured default segment size of the family.
pub fn negotiate_mss_outgoing(
    iface: Option<&Interface>,
    family: IpVersion,
    interfaces: &Interfaces,
    config: &Config,
) -> u32 {
    let mut mss = iface.map(|iface| iface.mtu).unwrap_or(0);

    if !config.mss_ifmtu {
        mss = mss.max(interfaces.max_mtu());
    }

    let hdrsiz = match family {
        IpVersion::Ipv4 => IPV4_HEADER_LEN,
        IpVersion::Ipv6 => IPV6_HEADER_LEN,
    } + TCP_HEADER_LEN;
    let hdrsiz = hdrsiz as u32;

    if mss > hdrsiz {
        mss -= hdrsiz;
    }

    mss.max(u32::from(config.mss_default_for(family)))
}

/// Round `bufsize` up to a multiple of `mss`, capped at the largest multiple below `max`.
///
/// If not even one segment fits below `max` the result is `max` itself.
pub(crate) fn round_to_segments(bufsize: u32, mss: u32, max: u32) -> u32 {
    debug_assert!(mss > 0);
    let segments = (u64::from(bufsize) + u64::from(mss) - 1) / u64::from(mss);
    let rounded = segments * u64::from(mss);
    if rounded <= u64::from(max) {
        rounded as u32
    } else {
        match (max / mss) * mss {
            0 => max,
            capped => capped,
        }
    }
}

impl TcpControlBlock {
    /// Compute our segment size for the SYN we are about to send, and remember it.
    pub fn advertise_mss(&mut self, iface: Option<&Interface>, interfaces: &Interfaces) -> u32 {
        self.our_mss = negotiate_mss_outgoing(iface, self.family(), interfaces, &self.config);
        self.our_mss
    }

    /// Process the segment size option of the peer's SYN, `None` if it sent none.
    ///
    /// The effective send segment size excludes the per-segment option overhead. The send buffer
    /// is then made an integral number of segments, or the segment size is reduced to the buffer
    /// if the buffer is smaller. A cached slow start threshold on the route seeds ours, but never
    /// below two segments.
    pub fn apply_peer_mss(&mut self, offer: Option<u16>, routes: &dyn RouteMetrics) {
        let default = u32::from(self.config.mss_default_for(self.family()));
        let peer = offer.map(u32::from).unwrap_or(default).max(MIN_PEER_MSS);
        self.peer_mss = peer;

        let overhead = self.tcp_optlen() + u32::from(self.pcb.options_len());
        let mut mss = peer.saturating_sub(overhead).max(1);

        let route = routes.get(&self.pcb.remote().addr);
        let bufsize = match route {
            Some(route) if route.metrics.sendpipe != 0 => route.metrics.sendpipe,
            _ => self.socket().snd.hiwat,
        };

        if bufsize < mss {
            mss = bufsize;
        } else {
            let sb_max = self.config.sb_max;
            self.socket_mut().snd.reserve(round_to_segments(bufsize, mss, sb_max));
        }
        self.segsz = mss;

        if let Some(route) = route {
            if route.metrics.ssthresh != 0 {
                self.snd.ssthresh = route.metrics.ssthresh.max(2 * mss);
            }
        }

        net_trace!("tcp {}: peer mss {} segsz {} sndbuf {}",
            self.pcb.remote(), peer, mss, self.socket().snd.hiwat);
    }

    /// Move to the established state.
    ///
    /// Arms the keepalive timer and sizes the receive buffer to a whole number of our segments.
    pub fn enter_established(&mut self, routes: &dyn RouteMetrics, now: Instant) {
        self.state = State::Established;
        self.timers.arm(TimerKind::Keepalive, now + self.config.keepalive_idle);

        let bufsize = match routes.get(&self.pcb.remote().addr) {
            Some(route) if route.metrics.recvpipe != 0 => route.metrics.recvpipe,
            _ => self.socket().rcv.hiwat,
        };

        if bufsize > self.our_mss && self.our_mss > 0 {
            let rounded = round_to_segments(bufsize, self.our_mss, self.config.sb_max);
            self.socket_mut().rcv.reserve(rounded);
        }

        net_trace!("tcp {}: established, rcvbuf {}", self.pcb.remote(), self.socket().rcv.hiwat);
    }
}
