use crate::layer::ip::{Metrics, RouteEntry, RouteMetrics};
use crate::storage::Release;
use crate::wire::{IPV4_HEADER_LEN, TCP_HEADER_LEN};

use super::control::{State, TcpControlBlock};
use super::pcb::{OwningPcb, SocketError};
use super::stats::Stats;
use super::SegmentOutput;

impl TcpControlBlock {
    /// Abort the connection with an error.
    ///
    /// If the peer already knows about the connection a reset is sent through `output`. A timeout
    /// is reported with the last soft error instead, if there was one, since that is the better
    /// explanation. The connection is then closed, see [`close_connection`].
    ///
    /// [`close_connection`]: #method.close_connection
    pub fn drop_connection(
        mut self,
        err: SocketError,
        output: &mut dyn SegmentOutput,
        routes: &mut dyn RouteMetrics,
        release: &mut dyn Release,
        stats: &mut Stats,
    ) -> OwningPcb {
        if self.state.have_received_syn() {
            self.state = State::Closed;
            if let Err(err) = output.output(&mut self) {
                net_debug!("tcp {}: reset not sent: {}", self.pcb.remote(), err);
            }
            stats.drops += 1;
        } else {
            stats.conndrops += 1;
        }

        let err = match (err, self.soft_error) {
            (SocketError::TimedOut, Some(soft)) => soft,
            (err, _) => err,
        };

        net_trace!("tcp {}: dropped with {}", self.pcb.remote(), err);
        self.socket_mut().error = Some(err);
        self.close_connection(routes, release, stats)
    }

    /// Close the connection and free its resources.
    ///
    /// Consumes the control block and returns the protocol control block it was attached to, with
    /// the socket marked disconnected. Queued out-of-order segments go to `release`. All timers
    /// are cancelled so that no handle given out earlier fires again.
    ///
    /// When the connection sent enough data for its measurements to mean something, they are
    /// written back to the route so that the next connection to the destination starts from
    /// them.
    pub fn close_connection(
        mut self,
        routes: &mut dyn RouteMetrics,
        release: &mut dyn Release,
        stats: &mut Stats,
    ) -> OwningPcb {
        let sample = self.socket().snd.hiwat.saturating_mul(self.config.metrics_sample_factor);
        if self.snd.iss + sample < self.snd.max {
            let dst = self.pcb.remote().addr;
            match routes.get(&dst) {
                Some(route) if !route.is_default() => {
                    let metrics = self.feedback_metrics(&route);
                    net_trace!("tcp {}: route metrics {:?}", self.pcb.remote(), metrics);
                    routes.blend(&dst, metrics);
                },
                _ => (),
            }
        }

        let freed = self.reassembly.drain(release);
        self.timers.cancel_all();
        self.syn_cache.clear();
        self.template = None;
        self.socket_mut().disconnect();
        stats.closed += 1;

        net_trace!("tcp {}: closed, {} queued segments freed", self.pcb.remote(), freed);
        self.pcb
    }

    /// The route metrics after blending in our measurements.
    ///
    /// Locked metrics keep their value. Each learned value is averaged with the cached one.
    fn feedback_metrics(&self, route: &RouteEntry) -> Metrics {
        let mut metrics = route.metrics;

        if !route.locks.rtt {
            metrics.rtt = average(metrics.rtt, self.rtt.srtt_micros());
        }

        if !route.locks.rttvar {
            metrics.rttvar = average(metrics.rttvar, self.rtt.rttvar_micros());
        }

        // Only start learning a threshold once there is bad news: either one is cached already,
        // or ours fell below half the pipe.
        let ssthresh = self.snd.ssthresh;
        let learn = ssthresh != 0
            && (metrics.ssthresh != 0 || ssthresh < metrics.sendpipe / 2);
        if !route.locks.ssthresh && learn && self.segsz != 0 {
            // Convert from payload bytes to whole segments with headers.
            let segsz = u64::from(self.segsz);
            let segments = ((u64::from(ssthresh) + segsz / 2) / segsz).max(2);
            let bytes = segments * (segsz + (IPV4_HEADER_LEN + TCP_HEADER_LEN) as u64);
            let bytes = bytes.min(u64::from(u32::max_value())) as u32;
            metrics.ssthresh = average(metrics.ssthresh, bytes);
        }

        metrics
    }
}

fn average(cached: u32, measured: u32) -> u32 {
    if cached != 0 && measured != 0 {
        ((u64::from(cached) + u64::from(measured)) / 2) as u32
    } else {
        measured
    }
}
