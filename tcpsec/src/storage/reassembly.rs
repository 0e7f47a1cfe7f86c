use alloc::collections::VecDeque;

use crate::wire::{TcpFlags, TcpSeqNumber};
use super::{PacketBuf, Release};

/// An out-of-order segment waiting for the data in front of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Sequence number of the first octet.
    pub seq: TcpSeqNumber,
    /// Length of the segment data, counting SYN and FIN.
    pub len: u32,
    /// Flags echoed from the segment header.
    pub flags: TcpFlags,
    /// The buffer holding the data.
    pub packet: PacketBuf,
}

/// The out-of-order segments of one connection, ordered by sequence number.
///
/// The queue exclusively owns the buffers. Segments leave it either in order, through
/// [`pop_in_order`], or all at once through [`drain`] when the connection closes or memory runs
/// short.
///
/// [`pop_in_order`]: #method.pop_in_order
/// [`drain`]: #method.drain
#[derive(Clone, Debug, Default)]
pub struct ReassemblyQueue {
    segments: VecDeque<Segment>,
}

impl ReassemblyQueue {
    /// An empty queue.
    pub fn new() -> Self {
        ReassemblyQueue::default()
    }

    /// The number of queued segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether no segment is queued.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Queue a segment, keeping the order by sequence number.
    ///
    /// Segments with equal start stay in arrival order.
    pub fn insert(&mut self, segment: Segment) {
        let idx = self.segments
            .iter()
            .position(|queued| segment.seq < queued.seq)
            .unwrap_or(self.segments.len());
        self.segments.insert(idx, segment);
    }

    /// Iterate the queued segments in sequence order.
    pub fn iter(&self) -> impl Iterator<Item=&Segment> {
        self.segments.iter()
    }

    /// Take the first segment if it starts at or before `rcv_nxt`.
    pub fn pop_in_order(&mut self, rcv_nxt: TcpSeqNumber) -> Option<Segment> {
        match self.segments.front() {
            Some(front) if front.seq <= rcv_nxt => self.segments.pop_front(),
            _ => None,
        }
    }

    /// Hand every queued buffer back, returning how many were released.
    pub fn drain<R: Release + ?Sized>(&mut self, release: &mut R) -> usize {
        let count = self.segments.len();
        for segment in self.segments.drain(..) {
            release.release(segment.packet);
        }
        count
    }
}
