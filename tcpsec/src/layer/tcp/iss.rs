//! Initial sequence number generation, as recommended by rfc6528.
//!
//! `ISN = M + F(localip, localport, remoteip, remoteport, secretkey)` where `M` is a clock ticking
//! every 4 microseconds and `F` is a keyed cryptographic hash. The hash here is SipHash-2-4 from:
//!
//! > SipHash: a fast short-input PRF, Jean-Philippe Aumasson and Daniel J. Bernstein
use super::pcb::FourTuple;
use crate::time::Instant;
use crate::wire::TcpSeqNumber;

/// Generates initial sequence numbers from a secret key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IsnGenerator {
    keys: (u64, u64),
}

// Yes, that's the initial values.
const IV: [&[u8; 8]; 4] = [
    b"somepseu",
    b"dorandom",
    b"lygenera",
    b"tedbytes"];

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl IsnGenerator {
    /// A generator with the given secret key.
    ///
    /// The key should come from a cryptographically secure source and be replaced from time to
    /// time.
    pub fn new(k0: u64, k1: u64) -> Self {
        IsnGenerator { keys: (k0, k1) }
    }

    /// Get the initial sequence number for a connection.
    ///
    /// The same connection identity yields numbers which advance with the clock, different
    /// identities yield unrelated numbers.
    pub fn isn(&self, connection: &FourTuple, time: Instant) -> TcpSeqNumber {
        let mut message = [0u8; 16 + 16 + 2 + 2];
        let mut len = 0;
        for part in &[
            connection.local.as_bytes(),
            connection.remote.as_bytes(),
            &connection.local_port.to_be_bytes()[..],
            &connection.remote_port.to_be_bytes()[..],
        ] {
            message[len..len + part.len()].copy_from_slice(part);
            len += part.len();
        }

        let hash = State::init(self.keys.0, self.keys.1).hash(&message[..len]);
        // 250 ticks of 4 microseconds per millisecond.
        let clock = (time.total_millis() as u32).wrapping_mul(250);
        TcpSeqNumber(hash as u32) + clock
    }
}

impl State {
    const SIP_C: usize = 2;
    const SIP_D: usize = 4;

    fn init(k0: u64, k1: u64) -> Self {
        State {
            v0: u64::from_be_bytes(*IV[0]) ^ k0,
            v1: u64::from_be_bytes(*IV[1]) ^ k1,
            v2: u64::from_be_bytes(*IV[2]) ^ k0,
            v3: u64::from_be_bytes(*IV[3]) ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Process a single portion of the message.
    fn absorb(&mut self, m: u64) {
        self.v3 ^= m;
        (0..Self::SIP_C).for_each(|_| self.round());
        self.v0 ^= m;
    }

    /// Absorb a complete message, including the final length block, and finalize.
    fn hash(mut self, message: &[u8]) -> u64 {
        let mut chunks = message.chunks_exact(8);
        for chunk in &mut chunks {
            let mut word = [0; 8];
            word.copy_from_slice(chunk);
            self.absorb(u64::from_le_bytes(word));
        }

        let mut last = [0; 8];
        let rest = chunks.remainder();
        last[..rest.len()].copy_from_slice(rest);
        last[7] = message.len() as u8;
        self.absorb(u64::from_le_bytes(last));
        self.finalize()
    }

    fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        (0..Self::SIP_D).for_each(|_| self.round());
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}
