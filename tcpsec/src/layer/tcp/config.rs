use crate::time::Duration;

/// Process wide TCP configuration.
///
/// The defaults reproduce the classic BSD values. A control block takes a copy when it is
/// created, the engine itself never changes configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Use the RFC 1323 extensions at all.
    pub rfc1323: bool,

    /// Request window scaling, if `rfc1323` is set.
    pub window_scale: bool,

    /// Request timestamps, if `rfc1323` is set.
    pub timestamps: bool,

    /// Offer selective acknowledgements.
    pub sack: bool,

    /// Offer SACK but ignore the SACK blocks the peer sends.
    pub sack_ignore_received: bool,

    /// Acknowledge pushed data immediately instead of delaying the ACK.
    pub ack_on_push: bool,

    /// The initial congestion window after a path MTU change.
    pub initial_window: InitialWindow,

    /// Retransmit timer basis while no round trip time has been measured.
    pub rtt_default: Duration,

    /// Lower bound of the retransmit timer.
    pub rexmt_min: Duration,

    /// Upper bound of the retransmit timer.
    pub rexmt_max: Duration,

    /// Idle time before the first keepalive probe.
    pub keepalive_idle: Duration,

    /// Default segment size for IPv4 connections.
    pub mss_default: u16,

    /// Default segment size for IPv6 connections.
    pub mss_default_v6: u16,

    /// Advertise an MSS based on the interface MTU only, ignoring larger interfaces.
    pub mss_ifmtu: bool,

    /// Interoperate with 4.2BSD peers, whose keepalives need a byte of data.
    pub compat_42: bool,

    /// The largest socket buffer, in bytes.
    pub sb_max: u32,

    /// Time to live of IPv4 control segments.
    pub ttl: u8,

    /// Hop limit of IPv6 control segments.
    pub hop_limit: u8,

    /// Perform path MTU discovery.
    pub mtu_discovery: bool,

    /// Retransmissions after which a repeated soft error of a connection that is not yet
    /// established becomes a hard error.
    pub soft_error_retransmit_threshold: u8,

    /// How many send buffers worth of data a connection must have sent before its measurements
    /// are written back to the route.
    pub metrics_sample_factor: u32,
}

/// Choice of the initial congestion window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitialWindow {
    /// `min(4 * seg, max(2 * seg, 4380))` bytes, from RFC 3390.
    Rfc3390,

    /// A fixed number of segments.
    Segments(u32),
}

impl InitialWindow {
    /// The initial window in bytes for the segment size.
    pub fn bytes(self, segment: u32) -> u32 {
        match self {
            InitialWindow::Rfc3390 => (4 * segment).min((2 * segment).max(4380)),
            InitialWindow::Segments(count) => count.saturating_mul(segment),
        }
    }
}

impl Config {
    /// The default segment size of the address family.
    pub fn mss_default_for(&self, family: crate::wire::IpVersion) -> u16 {
        match family {
            crate::wire::IpVersion::Ipv4 => self.mss_default,
            crate::wire::IpVersion::Ipv6 => self.mss_default_v6,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rfc1323: true,
            window_scale: true,
            timestamps: true,
            sack: true,
            sack_ignore_received: true,
            ack_on_push: false,
            initial_window: InitialWindow::Segments(4),
            rtt_default: Duration::from_secs(3),
            rexmt_min: Duration::from_secs(1),
            rexmt_max: Duration::from_secs(64),
            keepalive_idle: Duration::from_secs(7200),
            mss_default: 536,
            mss_default_v6: 1024,
            mss_ifmtu: false,
            compat_42: false,
            sb_max: 256 * 1024,
            ttl: 64,
            hop_limit: 64,
            mtu_discovery: true,
            soft_error_retransmit_threshold: 3,
            metrics_sample_factor: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3390_window() {
        assert_eq!(InitialWindow::Rfc3390.bytes(536), 2144);
        assert_eq!(InitialWindow::Rfc3390.bytes(1460), 4380);
        assert_eq!(InitialWindow::Rfc3390.bytes(9000), 18000);
        assert_eq!(InitialWindow::Segments(4).bytes(1500), 6000);
    }
}
