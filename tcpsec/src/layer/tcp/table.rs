use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::layer::{Error, Result};
use crate::layer::ip::RouteMetrics;
use crate::storage::Release;
use crate::time::Instant;
use crate::wire::IpAddress;

use super::control::TcpControlBlock;
use super::notify::ControlCommand;
use super::pcb::FourTuple;
use super::stats::Stats;
use super::timer::{TimerHandle, TimerKind};
use super::SegmentOutput;

/// The control blocks of all connections, each owned by its slot.
///
/// Connections are referred to by a [`ConnectionKey`]. A key stays valid until its connection is
/// removed. Using it afterwards fails, even if the slot is occupied by a newer connection by then.
///
/// [`ConnectionKey`]: struct.ConnectionKey.html
#[derive(Debug, Default)]
pub struct Connections {
    slots: Vec<Slot>,
    /// Indices of unoccupied slots.
    free: Vec<usize>,
    by_tuple: BTreeMap<FourTuple, ConnectionKey>,
}

/// Refers to a connection in [`Connections`].
///
/// [`Connections`]: struct.Connections.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionKey {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    tcb: Option<TcpControlBlock>,
}

impl Connections {
    /// An empty table.
    pub fn new() -> Self {
        Connections::default()
    }

    /// Add a connection.
    ///
    /// Fails with `Illegal` if a connection with the same addresses and ports exists.
    pub fn insert(&mut self, tcb: TcpControlBlock) -> Result<ConnectionKey> {
        let tuple = tcb.pcb().four_tuple();
        if self.by_tuple.contains_key(&tuple) {
            return Err(Error::Illegal);
        }

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.tcb = Some(tcb);
                ConnectionKey { index, generation: slot.generation }
            },
            None => {
                self.slots.push(Slot { generation: 0, tcb: Some(tcb) });
                ConnectionKey { index: self.slots.len() - 1, generation: 0 }
            },
        };

        self.by_tuple.insert(tuple, key);
        Ok(key)
    }

    /// Retrieve a connection.
    pub fn get(&self, key: ConnectionKey) -> Option<&TcpControlBlock> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.tcb.as_ref()
    }

    /// Retrieve a connection for modification.
    pub fn get_mut(&mut self, key: ConnectionKey) -> Option<&mut TcpControlBlock> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.tcb.as_mut()
    }

    /// Take a connection out of the table, usually to close it.
    ///
    /// The key and all copies of it become invalid.
    pub fn remove(&mut self, key: ConnectionKey) -> Option<TcpControlBlock> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }

        let tcb = slot.tcb.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.by_tuple.remove(&tcb.pcb().four_tuple());
        Some(tcb)
    }

    /// Find a connection by its addresses and ports.
    pub fn lookup(&self, tuple: &FourTuple) -> Option<ConnectionKey> {
        self.by_tuple.get(tuple).copied()
    }

    /// The number of connections.
    pub fn len(&self) -> usize {
        self.by_tuple.len()
    }

    /// Whether there are no connections.
    pub fn is_empty(&self) -> bool {
        self.by_tuple.is_empty()
    }

    /// Iterate over all connections.
    pub fn iter(&self) -> impl Iterator<Item=(ConnectionKey, &TcpControlBlock)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let key = ConnectionKey { index, generation: slot.generation };
            slot.tcb.as_ref().map(|tcb| (key, tcb))
        })
    }

    /// Deliver a control message to every connection towards `dst`.
    ///
    /// Returns the number of connections that were notified.
    pub fn notify_matching(
        &mut self,
        dst: &IpAddress,
        cmd: ControlCommand,
        routes: &mut dyn RouteMetrics,
        mtu_hint: Option<u32>,
        output: &mut dyn SegmentOutput,
        stats: &mut Stats,
    ) -> usize {
        let mut notified = 0;
        for tcb in self.slots.iter_mut().filter_map(|slot| slot.tcb.as_mut()) {
            if tcb.pcb().remote().addr != *dst {
                continue;
            }
            tcb.control_input(cmd, routes, mtu_hint, output, stats);
            notified += 1;
        }
        net_trace!("tcp: {:?} for {} reached {} connections", cmd, dst, notified);
        notified
    }

    /// Free the reassembly queues of all connections.
    ///
    /// Called when buffers run out. Returns the number of segments freed, the peers will send
    /// them again.
    pub fn drain(&mut self, release: &mut dyn Release) -> usize {
        let freed = self.slots.iter_mut()
            .filter_map(|slot| slot.tcb.as_mut())
            .map(|tcb| tcb.reassembly.drain(release))
            .sum();
        net_debug!("tcp: drained {} queued segments", freed);
        freed
    }

    /// Route a fired timer to its connection.
    ///
    /// Returns the expired kind, or `None` if the connection is gone or the handle is stale.
    pub fn fire_timer(&mut self, key: ConnectionKey, handle: TimerHandle, now: Instant)
        -> Option<TimerKind>
    {
        self.get_mut(key)?.timers.fire(handle, now)
    }
}
