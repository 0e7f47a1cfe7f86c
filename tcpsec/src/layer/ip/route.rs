//! Route entries with their cached path metrics.
//!
//! CIDR matching follows rfc1519 and rfc4632, the metrics mirror the `rmx` block of BSD routes.
use alloc::vec::Vec;

use crate::layer::{Error, Result};
use crate::wire::IpAddress;

/// Cached characteristics of the path to a destination.
///
/// Every value is `0` while unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Metrics {
    /// Smoothed round trip time, in microseconds.
    pub rtt: u32,
    /// Round trip time variance, in microseconds.
    pub rttvar: u32,
    /// Slow start threshold, in bytes.
    pub ssthresh: u32,
    /// Preferred send buffer size, in bytes.
    pub sendpipe: u32,
    /// Preferred receive buffer size, in bytes.
    pub recvpipe: u32,
}

/// Metrics which were set administratively and must not be learned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Locks {
    /// The round trip time is fixed.
    pub rtt: bool,
    /// The round trip variance is fixed.
    pub rttvar: bool,
    /// The slow start threshold is fixed.
    pub ssthresh: bool,
    /// The MTU is fixed.
    pub mtu: bool,
}

/// A prefix of addresses and what is known about the path to them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RouteEntry {
    /// The network targetted by the route.
    pub dst: IpAddress,
    /// The length of the network prefix.
    pub prefix_len: u8,
    /// The route leads to a single host.
    pub host: bool,
    /// The path MTU, `0` if unknown.
    pub mtu: u32,
    /// Cached path metrics.
    pub metrics: Metrics,
    /// Which metrics are locked.
    pub locks: Locks,
}

/// Access to the cached metrics of the routing table.
///
/// TCP reads these when sizing a new connection and writes back what it measured when the
/// connection closes. Writes are best effort, concurrent closes towards the same destination may
/// race and the last writer wins.
pub trait RouteMetrics {
    /// Find the route towards `dst`.
    fn get(&self, dst: &IpAddress) -> Option<RouteEntry>;

    /// Store metrics for the route towards `dst`.
    ///
    /// The caller has already blended the new values with the cached ones.
    fn blend(&mut self, dst: &IpAddress, metrics: Metrics);

    /// Invalidate the cached route towards `dst` and resolve it again.
    fn refresh(&mut self, dst: &IpAddress) -> Option<RouteEntry>;
}

/// A routing table with a fixed capacity.
///
/// # Examples
///
/// ```rust
/// use tcpsec::layer::ip::{RouteEntry, RouteMetrics, Routes};
/// use tcpsec::wire::IpAddress;
///
/// let mut routes = Routes::new(4);
/// routes.add_route(RouteEntry::network(IpAddress::v4(10, 0, 0, 0), 8).with_mtu(1500))
///     .expect("Room for a route");
///
/// let entry = routes.get(&IpAddress::v4(10, 1, 2, 3)).expect("Route exists");
/// assert_eq!(entry.mtu, 1500);
/// ```
#[derive(Debug, Clone)]
pub struct Routes {
    storage: Vec<RouteEntry>,
    capacity: usize,
}

impl RouteEntry {
    /// A route towards a network.
    pub fn network(dst: IpAddress, prefix_len: u8) -> Self {
        RouteEntry {
            dst,
            prefix_len,
            host: false,
            mtu: 0,
            metrics: Metrics::default(),
            locks: Locks::default(),
        }
    }

    /// A route towards a single host.
    pub fn host(dst: IpAddress) -> Self {
        let prefix_len = (dst.as_bytes().len() * 8) as u8;
        RouteEntry {
            host: true,
            ..RouteEntry::network(dst, prefix_len)
        }
    }

    /// Set the path MTU.
    pub fn with_mtu(self, mtu: u32) -> Self {
        RouteEntry { mtu, ..self }
    }

    /// Set the cached metrics.
    pub fn with_metrics(self, metrics: Metrics) -> Self {
        RouteEntry { metrics, ..self }
    }

    /// Set the locked metrics.
    pub fn with_locks(self, locks: Locks) -> Self {
        RouteEntry { locks, ..self }
    }

    /// Whether this is a wildcard route, matching any destination.
    pub fn is_default(&self) -> bool {
        self.dst.is_unspecified()
    }

    /// Whether `addr` is within the network of this route.
    pub fn contains_addr(&self, addr: &IpAddress) -> bool {
        self.dst.shares_prefix(addr, self.prefix_len)
    }
}

impl Routes {
    /// Creates an empty routing table that holds at most `capacity` routes.
    pub fn new(capacity: usize) -> Self {
        Routes {
            storage: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Update the routes of this node.
    pub fn update<F: FnOnce(&mut [RouteEntry])>(&mut self, f: F) {
        f(&mut self.storage);
    }

    /// Add a route.
    pub fn add_route(&mut self, route: RouteEntry) -> Result<()> {
        if self.storage.len() >= self.capacity {
            return Err(Error::Exhausted);
        }
        self.storage.push(route);
        Ok(())
    }

    /// The number of routes in the table.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the table holds no routes.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn lookup(&self, addr: &IpAddress) -> Option<usize> {
        // The rules say to find the subnet with longest prefix.
        let mut best_match: Option<usize> = None;
        for (idx, route) in self.storage.iter().enumerate() {
            if !route.contains_addr(addr) {
                continue;
            }

            let best = best_match.get_or_insert(idx);
            if self.storage[*best].prefix_len < route.prefix_len {
                *best = idx;
            }
        }
        best_match
    }
}

impl RouteMetrics for Routes {
    fn get(&self, dst: &IpAddress) -> Option<RouteEntry> {
        self.lookup(dst).map(|idx| self.storage[idx])
    }

    fn blend(&mut self, dst: &IpAddress, metrics: Metrics) {
        if let Some(idx) = self.lookup(dst) {
            self.storage[idx].metrics = metrics;
        }
    }

    /// Clone a host route from the network route towards `dst`.
    ///
    /// Subsequent lookups find the host route. If the table is full the network route is
    /// returned unchanged.
    fn refresh(&mut self, dst: &IpAddress) -> Option<RouteEntry> {
        let route = self.get(dst)?;
        if route.host {
            return Some(route);
        }

        let cloned = RouteEntry::host(*dst)
            .with_mtu(route.mtu)
            .with_metrics(route.metrics)
            .with_locks(route.locks);

        match self.add_route(cloned) {
            Ok(()) => Some(cloned),
            Err(_) => Some(route),
        }
    }
}
