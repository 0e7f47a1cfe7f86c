use crate::time::{Expiration, Instant};

/// The timers of one connection.
///
/// Each slot is an [`Expiration`]. Arming a slot returns a [`TimerHandle`] which the host keeps in
/// its timer wheel. When the wheel fires the handle it must go through [`fire`], which rejects
/// handles of a slot that has since been re-armed or of a cancellation epoch that is over. After
/// [`cancel_all`] no earlier handle is accepted again.
///
/// [`Expiration`]: ../../time/enum.Expiration.html
/// [`TimerHandle`]: struct.TimerHandle.html
/// [`fire`]: #method.fire
/// [`cancel_all`]: #method.cancel_all
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timers {
    slots: [Expiration; TimerKind::COUNT],
    generation: u32,
}

/// The timer slots of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Retransmission of unacknowledged data.
    Retransmit = 0,
    /// Window probes while the peer advertises a zero window.
    Persist = 1,
    /// Keepalive probes, and the connection establishment timeout.
    Keepalive = 2,
    /// The 2MSL wait in TIME_WAIT and the FIN_WAIT_2 timeout.
    TwoMsl = 3,
    /// The delayed acknowledgement.
    DelayedAck = 4,
}

/// Refers to an armed timer slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    kind: TimerKind,
    generation: u32,
    deadline: Instant,
}

impl TimerKind {
    const COUNT: usize = 5;

    /// All kinds, in slot order.
    pub const ALL: [TimerKind; 5] = [
        TimerKind::Retransmit,
        TimerKind::Persist,
        TimerKind::Keepalive,
        TimerKind::TwoMsl,
        TimerKind::DelayedAck,
    ];
}

impl TimerHandle {
    /// The slot this handle refers to.
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// The instant the slot was armed for.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Timers {
    /// All slots disarmed.
    pub fn new() -> Self {
        Timers {
            slots: [Expiration::Never; TimerKind::COUNT],
            generation: 0,
        }
    }

    /// Arm a slot, replacing its previous deadline.
    pub fn arm(&mut self, kind: TimerKind, deadline: Instant) -> TimerHandle {
        self.slots[kind as usize] = Expiration::When(deadline);
        TimerHandle { kind, generation: self.generation, deadline }
    }

    /// Disarm a single slot.
    pub fn disarm(&mut self, kind: TimerKind) {
        self.slots[kind as usize] = Expiration::Never;
    }

    /// The deadline of a slot.
    pub fn deadline(&self, kind: TimerKind) -> Expiration {
        self.slots[kind as usize]
    }

    /// Whether a slot is armed.
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadline(kind) != Expiration::Never
    }

    /// The earliest deadline of all slots.
    pub fn next(&self) -> Expiration {
        self.slots.iter().copied().min().unwrap_or(Expiration::Never)
    }

    /// Disarm all slots and invalidate every handle given out so far.
    pub fn cancel_all(&mut self) {
        self.slots = [Expiration::Never; TimerKind::COUNT];
        self.generation = self.generation.wrapping_add(1);
    }

    /// The number of times all timers were cancelled.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Consume a fired handle.
    ///
    /// Returns the kind of timer that expired, after disarming it. A handle from an earlier
    /// generation, for a slot that was re-armed or disarmed since, or one which is fired before
    /// its deadline is ignored.
    pub fn fire(&mut self, handle: TimerHandle, now: Instant) -> Option<TimerKind> {
        if handle.generation != self.generation {
            return None;
        }

        match self.slots[handle.kind as usize] {
            Expiration::When(at) if at == handle.deadline && at <= now => {
                self.disarm(handle.kind);
                Some(handle.kind)
            },
            _ => None,
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Timers::new()
    }
}
