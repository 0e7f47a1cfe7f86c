use crate::layer::{Error, Result};
use crate::layer::ip::Dispatch;
use crate::storage::{PacketBuf, Release};
use crate::time::Instant;
use crate::wire::{
    ipsec, ipv6ext,
    Ipv4Address, Ipv6Address, SecurityProtocol,
    IPV4_DST_ADDR_OFFSET, IPV4_PROTOCOL_OFFSET, IPV6_DST_ADDR_OFFSET, IPV6_HEADER_LEN};

use super::{AddressFamily, Config, Policy, SaDestination, SaStore, Stats};

/// The IPsec input state.
///
/// Holds nothing but configuration and counters, associations live in the host's store. Packets
/// are processed through a [`Receiver`] that borrows the pipeline together with the host's
/// collaborators.
///
/// [`Receiver`]: struct.Receiver.html
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    pub(super) config: Config,
    pub(super) stats: Stats,
}

/// The collaborators of the host stack that IPsec input uses.
pub struct Host<'a> {
    /// The association database.
    pub store: &'a dyn SaStore,
    /// Protocol dispatch, where decapsulated packets continue.
    pub dispatch: &'a mut dyn Dispatch,
    /// The inbound policy.
    pub policy: &'a dyn Policy,
    /// Takes dropped packets.
    pub release: &'a mut dyn Release,
    /// The current time, for association lifetimes.
    pub now: Instant,
}

/// A pipeline borrowed for receiving.
pub struct Receiver<'p, 'a> {
    pub(super) pipeline: &'p mut Pipeline,
    pub(super) host: Host<'a>,
}

impl Pipeline {
    /// A pipeline with the given configuration.
    pub fn new(config: Config) -> Self {
        Pipeline {
            config,
            stats: Stats::default(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Change the configuration.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// The counters.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Receive packets with the collaborators of the host.
    pub fn recv<'a>(&mut self, host: Host<'a>) -> Receiver<'_, 'a> {
        Receiver { pipeline: self, host }
    }
}

impl Receiver<'_, '_> {
    /// IPv4 input of a security protocol whose header starts at `off`.
    pub fn input_v4(&mut self, packet: PacketBuf, off: usize, proto: SecurityProtocol)
        -> Result<()>
    {
        self.common_input(packet, off, IPV4_PROTOCOL_OFFSET, AddressFamily::Inet, proto)
    }

    /// IPv6 input of a security protocol whose header starts at `off`.
    ///
    /// The extension headers in front of `off` are walked to find the octet that named the
    /// security header. They must end exactly at `off`.
    pub fn input_v6(&mut self, mut packet: PacketBuf, off: usize, proto: SecurityProtocol)
        -> Result<()>
    {
        let protoff = if off < IPV6_HEADER_LEN {
            Err(crate::wire::Error::Malformed)
        } else {
            packet.pullup(off).and_then(|head| ipv6ext::protocol_offset(head, off))
        };

        match protoff {
            Ok(protoff) => self.common_input(packet, off, protoff, AddressFamily::Inet6, proto),
            Err(err) => {
                net_debug!("ipsec: bad {} header chain before {}: {}", proto, off, err);
                self.pipeline.stats.protocol_mut(proto).hdrops += 1;
                self.drop_packet(packet, Error::Malformed)
            },
        }
    }

    /// Find the association of a packet and hand it to the transform.
    ///
    /// The security header of `proto` starts at `skip`, `protoff` is the offset of the octet that
    /// named it. Returns the result of the transform, or the reason the packet was dropped.
    pub fn common_input(
        &mut self,
        packet: PacketBuf,
        skip: usize,
        protoff: usize,
        af: AddressFamily,
        proto: SecurityProtocol,
    ) -> Result<()> {
        if !self.pipeline.config.enabled(proto) {
            net_debug!("ipsec: {} disabled, packet dropped", proto);
            self.pipeline.stats.protocol_mut(proto).pdrops += 1;
            return self.drop_packet(packet, Error::Disabled);
        }

        let mut header = [0; ipsec::MIN_HEADER_LEN];
        if packet.copy_data(skip, &mut header).is_err() {
            net_debug!("ipsec: {} packet too short, {} bytes after {}",
                proto, packet.len().saturating_sub(skip), skip);
            self.pipeline.stats.protocol_mut(proto).hdrops += 1;
            return self.drop_packet(packet, Error::Malformed);
        }

        let spi = match proto.spi(&header) {
            Ok(spi) => spi,
            Err(_) => {
                self.pipeline.stats.protocol_mut(proto).hdrops += 1;
                return self.drop_packet(packet, Error::Malformed);
            },
        };

        let (sport, dport) = packet.tags().nat_traversal_ports();

        let dst = match destination(&packet, af) {
            Ok(dst) => dst,
            Err(Error::AddressFamily) => {
                net_debug!("ipsec: unsupported address family {:?}", af);
                self.pipeline.stats.protocol_mut(proto).nopf += 1;
                return self.drop_packet(packet, Error::AddressFamily);
            },
            Err(err) => {
                self.pipeline.stats.protocol_mut(proto).hdrops += 1;
                return self.drop_packet(packet, err);
            },
        };

        let sa = match self.host.store.lookup(&dst, proto, spi, sport, dport) {
            Some(sa) => sa,
            None => {
                net_debug!("ipsec: no association for {} spi {:#010x} {}", dst, spi, proto);
                self.pipeline.stats.protocol_mut(proto).notdb += 1;
                return self.drop_packet(packet, Error::NotFound);
            },
        };

        let transform = match sa.transform() {
            Some(transform) => transform.clone(),
            None => {
                net_debug!("ipsec: association {} spi {:#010x} has no transform", dst, spi);
                self.pipeline.stats.protocol_mut(proto).noxform += 1;
                return self.drop_packet(packet, Error::NoTransform);
            },
        };

        self.pipeline.stats.protocol_mut(proto).input += 1;
        net_trace!("ipsec: {} spi {:#010x} to {}, skip {} protoff {}", proto, spi, dst, skip, protoff);
        transform.input(packet, &sa, skip, protoff, self)
        // Our reference to the association ends here.
    }

    pub(super) fn drop_packet(&mut self, packet: PacketBuf, err: Error) -> Result<()> {
        self.host.release.release(packet);
        Err(err)
    }
}

/// The association key of the packet's destination.
fn destination(packet: &PacketBuf, af: AddressFamily) -> Result<SaDestination> {
    match af {
        AddressFamily::Inet => {
            let mut addr = [0; 4];
            packet.copy_data(IPV4_DST_ADDR_OFFSET, &mut addr)?;
            Ok(SaDestination::new(Ipv4Address(addr)))
        },
        AddressFamily::Inet6 => {
            let mut addr = [0; 16];
            packet.copy_data(IPV6_DST_ADDR_OFFSET, &mut addr)?;
            Ok(SaDestination::from_ipv6(Ipv6Address(addr)))
        },
        AddressFamily::Unknown(_) => Err(Error::AddressFamily),
    }
}
