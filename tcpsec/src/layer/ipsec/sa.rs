//! Security associations and an in-memory association database.
use core::fmt;
use core::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::layer::{Error, Result};
use crate::time::Instant;
use crate::wire::{IpAddress, IpVersion, Ipv6Address, SecurityProtocol};

use super::Transform;

/// The destination an association is keyed by.
///
/// Scoped IPv6 addresses are only unique together with their zone. A kernel-style stack carries
/// the zone inside the second group of the address while it is processed, the key stores it
/// separately with the address itself cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SaDestination {
    /// The destination address.
    pub addr: IpAddress,
    /// The zone of a scoped IPv6 address, `0` otherwise.
    pub zone: u16,
}

/// How the association encapsulates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Only the payload is protected, the IP header is the original one.
    Transport,
    /// A complete inner datagram is carried.
    Tunnel,
}

/// Usage accounting of an association, for lifetime enforcement by the key manager.
///
/// Shared between all users of the association, the counters are atomics.
pub struct Lifetime {
    bytes: AtomicU64,
    packets: AtomicU64,
    /// Milliseconds of the first use, `NEVER` until then.
    first_use: AtomicI64,
}

/// One direction of a negotiated IPsec session.
pub struct SecurityAssociation {
    /// Where protected packets are sent.
    pub destination: SaDestination,
    /// The security protocol.
    pub proto: SecurityProtocol,
    /// The parameter index, a widened CPI for IPCOMP.
    pub spi: u32,
    /// The encapsulation mode.
    pub mode: Mode,
    /// Source and destination port of the UDP encapsulation, `(0, 0)` without NAT traversal.
    pub nat_ports: (u16, u16),
    /// Usage accounting.
    pub lifetime: Lifetime,
    transform: Option<Arc<dyn Transform>>,
}

/// The security association database.
pub trait SaStore {
    /// Find the association for an inbound packet.
    ///
    /// The ports are those of a NAT traversal encapsulation, both `0` when there is none.
    fn lookup(
        &self,
        dst: &SaDestination,
        proto: SecurityProtocol,
        spi: u32,
        sport: u16,
        dport: u16,
    ) -> Option<Arc<SecurityAssociation>>;
}

/// A database in a vector.
///
/// # Examples
///
/// ```rust
/// use tcpsec::layer::ipsec::{SaDestination, SaStore, SaTable, SecurityAssociation};
/// use tcpsec::wire::{IpAddress, SecurityProtocol};
///
/// let dst = SaDestination::new(IpAddress::v4(192, 0, 2, 1));
/// let mut table = SaTable::new();
/// table.insert(SecurityAssociation::new(dst, SecurityProtocol::Esp, 0x1000))
///     .expect("First association");
///
/// assert!(table.lookup(&dst, SecurityProtocol::Esp, 0x1000, 0, 0).is_some());
/// assert!(table.lookup(&dst, SecurityProtocol::Ah, 0x1000, 0, 0).is_none());
/// ```
#[derive(Debug, Default)]
pub struct SaTable {
    entries: Vec<Arc<SecurityAssociation>>,
}

impl SaDestination {
    /// An unscoped destination.
    pub fn new<A: Into<IpAddress>>(addr: A) -> Self {
        SaDestination { addr: addr.into(), zone: 0 }
    }

    /// Key an IPv6 destination, moving an embedded zone out of the address.
    pub fn from_ipv6(addr: Ipv6Address) -> Self {
        if addr.is_scoped() {
            SaDestination {
                addr: addr.without_embedded_zone().into(),
                zone: addr.embedded_zone(),
            }
        } else {
            SaDestination::new(addr)
        }
    }

    /// The IP version of the destination.
    pub fn version(&self) -> IpVersion {
        self.addr.version()
    }
}

impl fmt::Display for SaDestination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.zone {
            0 => write!(f, "{}", self.addr),
            zone => write!(f, "{}%{}", self.addr, zone),
        }
    }
}

impl Lifetime {
    const NEVER: i64 = i64::min_value();

    /// An unused association.
    pub fn new() -> Self {
        Lifetime {
            bytes: AtomicU64::new(0),
            packets: AtomicU64::new(0),
            first_use: AtomicI64::new(Self::NEVER),
        }
    }

    /// Account one packet of `bytes` length.
    pub fn record(&self, bytes: usize, now: Instant) {
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets.fetch_add(1, Ordering::Relaxed);
        // Only the first packet succeeds.
        let _ = self.first_use.compare_exchange(
            Self::NEVER, now.total_millis(), Ordering::Relaxed, Ordering::Relaxed);
    }

    /// Bytes processed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Packets processed so far.
    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// When the first packet was processed.
    pub fn first_use(&self) -> Option<Instant> {
        match self.first_use.load(Ordering::Relaxed) {
            Self::NEVER => None,
            millis => Some(Instant::from_millis(millis)),
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::new()
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("bytes", &self.bytes())
            .field("packets", &self.packets())
            .field("first_use", &self.first_use())
            .finish()
    }
}

impl SecurityAssociation {
    /// A transport mode association without transform.
    pub fn new(destination: SaDestination, proto: SecurityProtocol, spi: u32) -> Self {
        SecurityAssociation {
            destination,
            proto,
            spi,
            mode: Mode::Transport,
            nat_ports: (0, 0),
            lifetime: Lifetime::new(),
            transform: None,
        }
    }

    /// Set the encapsulation mode.
    pub fn with_mode(self, mode: Mode) -> Self {
        SecurityAssociation { mode, ..self }
    }

    /// Set the ports of a NAT traversal encapsulation.
    pub fn with_nat_traversal(self, sport: u16, dport: u16) -> Self {
        SecurityAssociation { nat_ports: (sport, dport), ..self }
    }

    /// Attach the transform that processes packets of this association.
    pub fn with_transform(self, transform: Arc<dyn Transform>) -> Self {
        SecurityAssociation { transform: Some(transform), ..self }
    }

    /// The attached transform.
    pub fn transform(&self) -> Option<&Arc<dyn Transform>> {
        self.transform.as_ref()
    }

    /// Whether packets arrive in a UDP encapsulation.
    pub fn nat_traversal(&self) -> bool {
        self.nat_ports != (0, 0)
    }

    /// Whether the association is the one for an inbound packet.
    ///
    /// Ports of the packet are only compared when it arrived with NAT traversal.
    pub fn matches(
        &self,
        dst: &SaDestination,
        proto: SecurityProtocol,
        spi: u32,
        sport: u16,
        dport: u16,
    ) -> bool {
        if self.destination != *dst || self.proto != proto || self.spi != spi {
            return false;
        }

        sport == 0 || dport == 0 || self.nat_ports == (sport, dport)
    }
}

impl fmt::Debug for SecurityAssociation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SecurityAssociation")
            .field("destination", &self.destination)
            .field("proto", &self.proto)
            .field("spi", &format_args!("{:#010x}", self.spi))
            .field("mode", &self.mode)
            .field("nat_ports", &self.nat_ports)
            .field("lifetime", &self.lifetime)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl SaTable {
    /// An empty table.
    pub fn new() -> Self {
        SaTable::default()
    }

    /// Add an association.
    ///
    /// Fails with `Illegal` if one with the same destination, protocol and index exists.
    pub fn insert(&mut self, sa: SecurityAssociation) -> Result<Arc<SecurityAssociation>> {
        if self.find(&sa.destination, sa.proto, sa.spi).is_some() {
            return Err(Error::Illegal);
        }

        let sa = Arc::new(sa);
        self.entries.push(sa.clone());
        Ok(sa)
    }

    /// Remove an association.
    ///
    /// Packets already handed to its transform keep it alive until they are done.
    pub fn remove(&mut self, dst: &SaDestination, proto: SecurityProtocol, spi: u32)
        -> Option<Arc<SecurityAssociation>>
    {
        let idx = self.find(dst, proto, spi)?;
        Some(self.entries.swap_remove(idx))
    }

    /// The number of associations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all associations.
    pub fn iter(&self) -> impl Iterator<Item=&Arc<SecurityAssociation>> {
        self.entries.iter()
    }

    fn find(&self, dst: &SaDestination, proto: SecurityProtocol, spi: u32) -> Option<usize> {
        self.entries.iter().position(|sa| {
            sa.destination == *dst && sa.proto == proto && sa.spi == spi
        })
    }
}

impl SaStore for SaTable {
    fn lookup(
        &self,
        dst: &SaDestination,
        proto: SecurityProtocol,
        spi: u32,
        sport: u16,
        dport: u16,
    ) -> Option<Arc<SecurityAssociation>> {
        self.entries.iter()
            .find(|sa| sa.matches(dst, proto, spi, sport, dport))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dst() -> SaDestination {
        SaDestination::new(IpAddress::v4(192, 0, 2, 1))
    }

    #[test]
    fn scoped_destination() {
        let embedded = Ipv6Address::new(0xfe80, 3, 0, 0, 0, 0, 0, 1);
        let key = SaDestination::from_ipv6(embedded);
        assert_eq!(key.zone, 3);
        assert_eq!(key.addr, IpAddress::v6(0xfe80, 0, 0, 0, 0, 0, 0, 1));

        let global = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
        assert_eq!(SaDestination::from_ipv6(global), SaDestination::new(global));
    }

    #[test]
    fn nat_ports_compared_when_present() {
        let mut table = SaTable::new();
        table.insert(SecurityAssociation::new(dst(), SecurityProtocol::Esp, 7)
            .with_nat_traversal(4500, 4500))
            .expect("Inserted");

        assert!(table.lookup(&dst(), SecurityProtocol::Esp, 7, 4500, 4500).is_some());
        assert!(table.lookup(&dst(), SecurityProtocol::Esp, 7, 0, 0).is_some());
        assert!(table.lookup(&dst(), SecurityProtocol::Esp, 7, 4501, 4500).is_none());
        assert!(table.lookup(&dst(), SecurityProtocol::Esp, 8, 4500, 4500).is_none());
    }

    #[test]
    fn duplicate_rejected() {
        let mut table = SaTable::new();
        table.insert(SecurityAssociation::new(dst(), SecurityProtocol::Ah, 1)).expect("Inserted");
        assert_eq!(table.insert(SecurityAssociation::new(dst(), SecurityProtocol::Ah, 1)).err(),
            Some(Error::Illegal));
        table.insert(SecurityAssociation::new(dst(), SecurityProtocol::IpComp, 1)).expect("Inserted");
        assert_eq!(table.len(), 2);

        let removed = table.remove(&dst(), SecurityProtocol::Ah, 1).expect("Present");
        assert_eq!(removed.spi, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lifetime_first_use_sticks() {
        let lifetime = Lifetime::new();
        assert_eq!(lifetime.first_use(), None);
        lifetime.record(100, Instant::from_secs(5));
        lifetime.record(50, Instant::from_secs(9));
        assert_eq!(lifetime.bytes(), 150);
        assert_eq!(lifetime.packets(), 2);
        assert_eq!(lifetime.first_use(), Some(Instant::from_secs(5)));
    }
}
