use crate::wire::SecurityProtocol;

/// Counters of one security protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProtocolStats {
    /// Packets handed to a transform.
    pub input: u64,
    /// Dropped while the protocol is disabled.
    pub pdrops: u64,
    /// Dropped for a short or malformed header.
    pub hdrops: u64,
    /// Dropped without a matching association.
    pub notdb: u64,
    /// Dropped because the association has no transform.
    pub noxform: u64,
    /// Dropped for an unsupported address family.
    pub nopf: u64,
    /// Dropped by the inbound policy after decapsulation.
    pub policy: u64,
}

/// IPv6 specific drop counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Ip6Stats {
    /// Dispatched through more headers than allowed.
    pub toomanyhdr: u64,
    /// Shorter than the offset of the next header.
    pub tooshort: u64,
}

/// All IPsec input counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stats {
    /// ESP counters.
    pub esp: ProtocolStats,
    /// AH counters.
    pub ah: ProtocolStats,
    /// IPCOMP counters.
    pub ipcomp: ProtocolStats,
    /// IPv6 counters.
    pub ip6: Ip6Stats,
}

impl Stats {
    /// The counters of a protocol.
    pub fn protocol(&self, proto: SecurityProtocol) -> &ProtocolStats {
        match proto {
            SecurityProtocol::Esp => &self.esp,
            SecurityProtocol::Ah => &self.ah,
            SecurityProtocol::IpComp => &self.ipcomp,
        }
    }

    /// Mutable access to the counters of a protocol.
    pub fn protocol_mut(&mut self, proto: SecurityProtocol) -> &mut ProtocolStats {
        match proto {
            SecurityProtocol::Esp => &mut self.esp,
            SecurityProtocol::Ah => &mut self.ah,
            SecurityProtocol::IpComp => &mut self.ipcomp,
        }
    }
}
