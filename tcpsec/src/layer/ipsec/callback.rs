use core::convert::TryFrom;

use crate::layer::{Error, Result};
use crate::layer::ip::Chain;
use crate::storage::{IpsecRecord, PacketBuf, Tag, TagKey};
use crate::wire::{
    self, ipv4_packet, ipv6_packet, ipv6ext, tcp_packet, udp_packet,
    IpAddress, IpProtocol, IpVersion, SecurityProtocol,
    IPV4_HEADER_LEN, IPV6_HEADER_LEN, TCP_HEADER_LEN};

use super::{Completion, Mode, Receiver, SecurityAssociation};

impl Completion for Receiver<'_, '_> {
    fn complete(
        &mut self,
        packet: PacketBuf,
        sa: &SecurityAssociation,
        skip: usize,
        protoff: usize,
    ) -> Result<()> {
        match sa.destination.version() {
            IpVersion::Ipv4 => self.callback_v4(packet, sa, skip, protoff),
            IpVersion::Ipv6 => self.callback_v6(packet, sa, skip, protoff),
        }
    }
}

impl Receiver<'_, '_> {
    /// Finish an IPv4 packet after its transform.
    ///
    /// The outer header is repaired for the new length, a NAT traversal association also gets
    /// the transport checksum recomputed since the addresses it covered were rewritten on the way.
    fn callback_v4(
        &mut self,
        mut packet: PacketBuf,
        sa: &SecurityAssociation,
        skip: usize,
        protoff: usize,
    ) -> Result<()> {
        let proto = sa.proto;

        if let Err(err) = repair_v4(&mut packet, skip) {
            net_debug!("ipsec: {} packet lost its IPv4 header: {}", proto, err);
            self.pipeline.stats.protocol_mut(proto).hdrops += 1;
            return self.drop_packet(packet, Error::NoBufs);
        }

        let prot = match packet.byte_at(protoff) {
            Ok(prot) => IpProtocol::from(prot),
            Err(_) => {
                self.pipeline.stats.protocol_mut(proto).hdrops += 1;
                return self.drop_packet(packet, Error::Malformed);
            },
        };

        if sa.nat_traversal() && !fix_transport_checksum(&mut packet, skip, prot) {
            net_debug!("ipsec: {} payload too short for its {} checksum", proto, prot);
            self.pipeline.stats.protocol_mut(proto).hdrops += 1;
            return self.drop_packet(packet, Error::Malformed);
        }

        sa.lifetime.record(packet.len(), self.host.now);
        mark_done(&mut packet, sa);

        if self.host.dispatch.is_last_header(prot)
            && self.host.policy.reject(&packet, IpVersion::Ipv4)
        {
            net_debug!("ipsec: {} packet for {} rejected by policy", proto, prot);
            self.pipeline.stats.protocol_mut(proto).policy += 1;
            return self.drop_packet(packet, Error::Illegal);
        }

        if sa.mode == Mode::Tunnel {
            packet.tags_mut().set(Tag::SkipInterfaceFilter);
        }

        self.host.dispatch.input_v4(packet, skip, prot);
        Ok(())
    }

    /// Finish an IPv6 packet after its transform.
    ///
    /// The extension headers in front of `skip` must still account for exactly `protoff`. The
    /// uncovered headers are dispatched one after another until a handler consumes the packet.
    fn callback_v6(
        &mut self,
        mut packet: PacketBuf,
        sa: &SecurityAssociation,
        skip: usize,
        protoff: usize,
    ) -> Result<()> {
        let proto = sa.proto;

        if let Err(err) = repair_v6(&mut packet) {
            net_debug!("ipsec: {} packet lost its IPv6 header: {}", proto, err);
            self.pipeline.stats.protocol_mut(proto).hdrops += 1;
            return self.drop_packet(packet, Error::NoBufs);
        }

        let walked = packet.pullup(skip)
            .and_then(|head| ipv6ext::protocol_offset(head, skip));
        match walked {
            Ok(off) if off == protoff => (),
            _ => {
                net_debug!("ipsec: {} header chain does not end at {}", proto, skip);
                self.pipeline.stats.protocol_mut(proto).hdrops += 1;
                return self.drop_packet(packet, Error::Malformed);
            },
        }

        let mut next = match packet.byte_at(protoff) {
            Ok(prot) => IpProtocol::from(prot),
            Err(_) => {
                self.pipeline.stats.protocol_mut(proto).hdrops += 1;
                return self.drop_packet(packet, Error::Malformed);
            },
        };

        sa.lifetime.record(packet.len(), self.host.now);
        mark_done(&mut packet, sa);

        let limit = usize::from(self.pipeline.config.ip6_nesting_limit);
        let mut offset = skip;
        let mut nest = 0;

        loop {
            nest += 1;
            if limit != 0 && nest > limit {
                net_debug!("ipsec: more than {} headers after {}", limit, proto);
                self.pipeline.stats.ip6.toomanyhdr += 1;
                return self.drop_packet(packet, Error::Malformed);
            }

            if packet.len() < offset {
                self.pipeline.stats.ip6.tooshort += 1;
                return self.drop_packet(packet, Error::Malformed);
            }

            if self.host.dispatch.is_last_header(next)
                && self.host.policy.reject(&packet, IpVersion::Ipv6)
            {
                net_debug!("ipsec: {} packet for {} rejected by policy", proto, next);
                self.pipeline.stats.protocol_mut(proto).policy += 1;
                return self.drop_packet(packet, Error::Illegal);
            }

            if sa.mode == Mode::Tunnel {
                packet.tags_mut().set(Tag::SkipInterfaceFilter);
            }

            match self.host.dispatch.input_v6(packet, offset, next) {
                Chain::Done => return Ok(()),
                Chain::Continue { packet: rest, offset: at, next: kind } => {
                    packet = rest;
                    offset = at;
                    next = kind;
                },
            }
        }
    }
}

/// Make the IPv4 header contiguous and fit it to the shortened packet.
fn repair_v4(packet: &mut PacketBuf, skip: usize) -> wire::Result<()> {
    let total_len = u16::try_from(packet.len()).map_err(|_| wire::Error::Malformed)?;
    let head = packet.pullup(IPV4_HEADER_LEN)?;
    let hlen = usize::from(ipv4_packet::new_unchecked(head).header_len());
    if hlen < IPV4_HEADER_LEN {
        return Err(wire::Error::Malformed);
    }

    let head = packet.pullup(hlen)?;
    if skip != 0 {
        let header = ipv4_packet::new_unchecked_mut(head);
        header.set_total_len(total_len);
        header.fill_checksum();
    }
    Ok(())
}

fn repair_v6(packet: &mut PacketBuf) -> wire::Result<()> {
    let payload_len = packet.len().saturating_sub(IPV6_HEADER_LEN);
    let payload_len = u16::try_from(payload_len).map_err(|_| wire::Error::Malformed)?;
    let head = packet.pullup(IPV6_HEADER_LEN)?;
    ipv6_packet::new_unchecked_mut(head).set_payload_len(payload_len);
    Ok(())
}

/// Recompute the TCP or UDP checksum after the IPv4 header.
///
/// A zero UDP checksum stays unset. Returns `false` if the transport header is cut short.
fn fix_transport_checksum(packet: &mut PacketBuf, hlen: usize, prot: IpProtocol) -> bool {
    match prot {
        IpProtocol::Tcp | IpProtocol::Udp => (),
        _ => return true,
    }

    let bytes = packet.contiguous();
    if hlen < IPV4_HEADER_LEN || bytes.len() < hlen {
        return false;
    }

    let (head, payload) = bytes.split_at_mut(hlen);
    let header = ipv4_packet::new_unchecked(head);
    let src = IpAddress::from(header.src_addr());
    let dst = IpAddress::from(header.dst_addr());

    match prot {
        IpProtocol::Tcp => {
            if payload.len() < TCP_HEADER_LEN {
                return false;
            }
            tcp_packet::new_unchecked_mut(payload).fill_checksum(src, dst).is_ok()
        },
        _ => match udp_packet::new_checked_mut(payload) {
            Ok(udp) if udp.checksum() == 0 => true,
            Ok(udp) => udp.fill_checksum(src, dst).is_ok(),
            Err(_) => false,
        },
    }
}

/// Note the completed processing on the packet.
///
/// A tag left by the transform is relabeled. Without one the association is recorded, except for
/// IPCOMP which provides no protection worth recording.
fn mark_done(packet: &mut PacketBuf, sa: &SecurityAssociation) {
    let tags = packet.tags_mut();
    match tags.remove(TagKey::IpsecCryptoDone) {
        Some(Tag::IpsecCryptoDone(record)) => tags.prepend(Tag::IpsecDone(record)),
        _ if sa.proto != SecurityProtocol::IpComp => tags.prepend(Tag::IpsecDone(IpsecRecord {
            dst: sa.destination.addr,
            proto: sa.proto,
            spi: sa.spi,
        })),
        _ => (),
    }
}
