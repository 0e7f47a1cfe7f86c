//! Round trip time estimation.
//!
//! The estimator counts in slow ticks and keeps its state in fixed point: the smoothed round trip
//! time is scaled by 32 and its variance by 16. A sample is blended with gain 1/8 into the mean
//! and 1/4 into the variance, as in Jacobson and Karels, "Congestion Avoidance and Control".
//!
//! The route cache stores the same values in microseconds, conversions between both happen here.
use crate::layer::ip::RouteMetrics;
use crate::time::{ticks, SLOW_HZ};

use super::control::TcpControlBlock;
use super::stats::Stats;

/// Shift of the fixed point smoothed round trip time, in addition to [`RTT_BASE_SHIFT`].
///
/// [`RTT_BASE_SHIFT`]: constant.RTT_BASE_SHIFT.html
pub const RTT_SHIFT: u32 = 3;

/// Shift of the fixed point round trip variance, in addition to [`RTT_BASE_SHIFT`].
///
/// [`RTT_BASE_SHIFT`]: constant.RTT_BASE_SHIFT.html
pub const RTTVAR_SHIFT: u32 = 2;

/// Additional shift applied to both estimator values for sub-tick resolution.
pub const RTT_BASE_SHIFT: u32 = 2;

/// Units of the round trip values in the route cache, per second.
pub const ROUTE_RTT_UNIT: u32 = 1_000_000;

/// Route microseconds per scaled srtt unit.
const SRTT_UNIT: u32 = (ROUTE_RTT_UNIT / SLOW_HZ) >> (RTT_SHIFT + RTT_BASE_SHIFT);

/// Route microseconds per scaled rttvar unit.
const RTTVAR_UNIT: u32 = (ROUTE_RTT_UNIT / SLOW_HZ) >> (RTTVAR_SHIFT + RTT_BASE_SHIFT);

/// The round trip estimator of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rtt {
    /// Smoothed round trip time in ticks, scaled by 32.
    ///
    /// `None` until the first sample or a seed from the route cache.
    pub srtt: Option<u32>,
    /// Round trip variance in ticks, scaled by 16.
    pub rttvar: u32,
    /// Lower bound of the retransmit timeout, in ticks.
    pub rttmin: u32,
    /// The current retransmit timeout, in ticks.
    pub rxtcur: u32,
    /// Number of consecutive retransmissions.
    pub rxtshift: u32,
}

/// The retransmit timeout of the estimator, in ticks: `srtt + 4 * rttvar`.
pub(crate) fn rexmtval(srtt: Option<u32>, rttvar: u32) -> u32 {
    ((srtt.unwrap_or(0) >> RTT_SHIFT) + rttvar) >> RTT_BASE_SHIFT
}

impl Rtt {
    /// The smoothed round trip time in microseconds, as stored in the route cache.
    pub fn srtt_micros(&self) -> u32 {
        self.srtt.unwrap_or(0).saturating_mul(SRTT_UNIT)
    }

    /// The round trip variance in microseconds, as stored in the route cache.
    pub fn rttvar_micros(&self) -> u32 {
        self.rttvar.saturating_mul(RTTVAR_UNIT)
    }
}

impl TcpControlBlock {
    /// Seed the estimator from the metrics cached on the route to the peer.
    ///
    /// Does nothing once an estimate exists, be it from an earlier seed or from a measurement,
    /// so calling it again is harmless. If the cached round trip time is locked the retransmit
    /// floor is raised to it. A cached time too small to show in the estimator leaves it without
    /// an estimate.
    pub fn seed_rtt_from_route(&mut self, routes: &dyn RouteMetrics) {
        if self.rtt.srtt.is_some() {
            return;
        }

        let route = match routes.get(&self.pcb.remote().addr) {
            Some(route) => route,
            None => return,
        };

        let rtt = route.metrics.rtt;
        if rtt == 0 {
            return;
        }

        if route.locks.rtt {
            self.rtt.rttmin = rtt / (ROUTE_RTT_UNIT / SLOW_HZ);
        }

        let srtt = rtt / SRTT_UNIT;
        if srtt == 0 {
            // Below the estimator's resolution, wait for a measurement instead.
            return;
        }

        self.rtt.srtt = Some(srtt);
        self.rtt.rttvar = match route.metrics.rttvar {
            0 => srtt >> (RTT_SHIFT - RTTVAR_SHIFT),
            rttvar => rttvar / RTTVAR_UNIT,
        };

        let rexmt = ((srtt >> RTT_BASE_SHIFT) + self.rtt.rttvar) >> (1 + RTT_BASE_SHIFT);
        self.rtt.rxtcur = self.clamp_rexmt(rexmt, self.rtt.rttmin);
        net_trace!("tcp {}: seeded srtt {} rttvar {} from route", self.pcb.remote(), srtt, self.rtt.rttvar);
    }

    /// Feed a round trip measurement of `rtt` ticks into the estimator.
    ///
    /// The first sample is taken as is. A sample also proves the path works, so the soft error and
    /// the retransmission count are reset.
    pub fn update_rtt(&mut self, rtt: u32, stats: &mut Stats) {
        stats.rttupdated += 1;
        let sample = rtt as i32;

        match self.rtt.srtt {
            Some(srtt) => {
                // The difference in the srtt scale divided by 8.
                let mut delta = (sample << RTT_BASE_SHIFT) - (srtt >> RTT_SHIFT) as i32;
                let mut srtt = srtt as i32 + delta;
                if srtt <= 0 {
                    srtt = 1 << RTT_BASE_SHIFT;
                }

                delta = delta.abs() - (self.rtt.rttvar >> RTTVAR_SHIFT) as i32;
                let mut rttvar = self.rtt.rttvar as i32 + delta;
                if rttvar <= 0 {
                    rttvar = 1 << RTT_BASE_SHIFT;
                }

                self.rtt.srtt = Some(srtt as u32);
                self.rtt.rttvar = rttvar as u32;
            },
            None => {
                self.rtt.srtt = Some(rtt << (RTT_SHIFT + RTT_BASE_SHIFT));
                self.rtt.rttvar = rtt << (RTTVAR_SHIFT + RTT_BASE_SHIFT - 1);
            },
        }

        self.rtt.rxtshift = 0;
        let floor = self.rtt.rttmin.max(rtt + 2);
        self.rtt.rxtcur = self.clamp_rexmt(rexmtval(self.rtt.srtt, self.rtt.rttvar), floor);
        self.soft_error = None;
    }

    fn clamp_rexmt(&self, value: u32, floor: u32) -> u32 {
        let ceiling = ticks(self.config.rexmt_max);
        value.max(floor).min(ceiling)
    }
}
