/// Counters of the connection engine.
///
/// Passed by mutable reference into the operations that count something. A host that runs
/// several engines merges them as it sees fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stats {
    /// Connections closed, including dropped ones.
    pub closed: u64,
    /// Connections dropped after a SYN was received.
    pub drops: u64,
    /// Embryonic connections dropped before a SYN was received.
    pub conndrops: u64,
    /// Round trip time estimator updates.
    pub rttupdated: u64,
    /// Segments whose round trip was timed.
    pub segstimed: u64,
    /// Retransmissions forced by a path MTU change.
    pub mturesent: u64,
}
