//! Bare control segments sent outside of the data path.
//!
//! Acknowledgements and resets in reply to a received segment, and keepalive probes, do not go
//! through segment output. They are a single header, built either from the connection template or
//! by turning the received segment around.
use crate::layer::{Error, Result};
use crate::layer::ip::{Output, OutputFlags};
use crate::storage::PacketBuf;
use crate::wire::{
    ipv4_packet, ipv6_packet, tcp_packet,
    IpAddress, IpEndpoint, IpProtocol, IpVersion, TcpFlags, TcpSeqNumber,
    TCP_HEADER_LEN, TCP_MAX_WINDOW};

use super::config::Config;
use super::control::TcpControlBlock;

/// The largest response that is built, a single cluster.
pub const MAX_RESPONSE_LEN: usize = 2048;

/// Where the headers of a response come from.
#[derive(Debug)]
pub enum ResponseSource<'a> {
    /// Copy the header template of a connection.
    Template(&'a PacketBuf),

    /// Turn a received segment around.
    ///
    /// Only the fixed IP header and the TCP header are kept, IP options and the payload are
    /// dropped. The tags of the packet and the IPv4 type of service, identification and
    /// fragment fields are reset.
    Inbound {
        /// The received datagram, starting with its IP header.
        packet: PacketBuf,
        /// The offset of the TCP header.
        tcp_offset: usize,
    },
}

/// The two ends of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Endpoints {
    /// The sender.
    pub src: IpEndpoint,
    /// The receiver.
    pub dst: IpEndpoint,
}

/// The endpoints of the reply to a segment between `endpoints`.
pub fn reverse_endpoints(endpoints: Endpoints) -> Endpoints {
    Endpoints {
        src: endpoints.dst,
        dst: endpoints.src,
    }
}

/// Build a single control segment and hand it to IP output.
///
/// The segment carries `seq` and `ack` and, unless it is a SYN, a window computed from the
/// receive buffer of `tcb` (zero without a connection). A template based segment is always a bare
/// ACK, whatever `flags` say. The address family is taken from the headers themselves.
///
/// Fails with `NoBufs` if the received headers can not be made contiguous, `MessageSize` if they
/// do not fit a response, and `AddressFamily` for a datagram that is not IP. Errors of the output
/// are passed on. Nothing about the connection is changed in any case.
pub fn build_response(
    tcb: Option<&TcpControlBlock>,
    source: ResponseSource,
    ack: TcpSeqNumber,
    seq: TcpSeqNumber,
    flags: TcpFlags,
    config: &Config,
    output: &mut dyn Output,
) -> Result<()> {
    let (mut packet, version, flags) = match source {
        ResponseSource::Template(template) => {
            let version = family_of(template.head())?;
            let mut bytes = template.to_vec();
            if config.compat_42 {
                // 4.2BSD only accepts keepalives carrying a byte of data.
                bytes.push(0);
            }
            (PacketBuf::from_vec(bytes), version, TcpFlags::ACK)
        },
        ResponseSource::Inbound { packet, tcp_offset } => {
            let (packet, version) = turn_around(packet, tcp_offset, flags)?;
            (packet, version, flags)
        },
    };

    let hlen = version.header_len();
    let window = tcb
        .map(|tcb| tcb.socket().rcv.space() >> tcb.rcv.scale)
        .unwrap_or(0)
        .min(TCP_MAX_WINDOW);

    let bytes = packet.contiguous();
    let total_len = bytes.len();
    let (src, dst) = addresses(bytes, version)?;

    let tcp = tcp_packet::new_unchecked_mut(&mut bytes[hlen..]);
    tcp.set_seq_number(seq);
    tcp.set_ack_number(ack);
    if !flags.syn() {
        tcp.set_window_len(window as u16);
        tcp.set_header_len(TCP_HEADER_LEN);
    }
    tcp.set_flags(flags);
    tcp.set_urgent_at(0);
    tcp.fill_checksum(src, dst)?;

    let out_flags = OutputFlags {
        mtu_discovery: config.mtu_discovery,
        dont_route: tcb.map(|tcb| tcb.socket().dont_route).unwrap_or(false),
    };

    net_trace!("tcp: response {} -> {} seq {} ack {} [{}]", src, dst, seq, ack, flags);
    match version {
        IpVersion::Ipv4 => {
            let ip = ipv4_packet::new_unchecked_mut(&mut bytes[..hlen]);
            ip.set_total_len(total_len as u16);
            ip.set_hop_limit(config.ttl);
            ip.fill_checksum();
            output.ipv4(packet, out_flags)
        },
        IpVersion::Ipv6 => {
            let ip = ipv6_packet::new_unchecked_mut(&mut bytes[..hlen]);
            ip.clear_flow_info();
            ip.set_payload_len((total_len - hlen) as u16);
            ip.set_hop_limit(config.hop_limit);
            output.ipv6(packet, out_flags)
        },
    }
}

impl TcpControlBlock {
    /// Send a keepalive probe.
    ///
    /// The probe is an ACK one below the oldest unacknowledged sequence number, which the peer
    /// has to answer with an ACK of its own.
    pub fn send_keepalive(&mut self, output: &mut dyn Output) -> Result<()> {
        let template = self.template().clone();
        build_response(
            Some(&*self),
            ResponseSource::Template(&template),
            self.rcv.nxt,
            self.snd.una - 1,
            TcpFlags::NONE,
            &self.config,
            output)
    }
}

/// Keep the fixed IP header and the TCP header of a received segment and swap its endpoints.
fn turn_around(mut packet: PacketBuf, tcp_offset: usize, flags: TcpFlags)
    -> Result<(PacketBuf, IpVersion)>
{
    let head = packet.pullup(tcp_offset + TCP_HEADER_LEN).map_err(|_| Error::NoBufs)?;
    let version = family_of(head)?;
    let hlen = version.header_len();
    if tcp_offset < hlen {
        return Err(Error::Malformed);
    }

    // A SYN keeps its options, the window scale in there is still needed.
    let received_len = tcp_packet::new_unchecked(&head[tcp_offset..]).header_len();
    let tlen = if flags.syn() && received_len > TCP_HEADER_LEN {
        received_len
    } else {
        TCP_HEADER_LEN
    };

    if hlen + tlen > MAX_RESPONSE_LEN {
        return Err(Error::MessageSize);
    }

    let head = packet.pullup(tcp_offset + tlen).map_err(|_| Error::NoBufs)?;
    let mut bytes = alloc::vec![0; hlen + tlen];
    bytes[..hlen].copy_from_slice(&head[..hlen]);
    bytes[hlen..].copy_from_slice(&head[tcp_offset..tcp_offset + tlen]);

    let reply = reverse_endpoints(endpoints(&bytes, version)?);
    set_endpoints(&mut bytes, version, reply)?;

    match version {
        IpVersion::Ipv4 => {
            let ip = ipv4_packet::new_unchecked_mut(&mut bytes[..hlen]);
            ip.set_header_len(hlen as u8);
            ip.set_dscp_ecn(0);
            ip.set_ident(0);
            ip.set_frag_field(0);
            ip.set_protocol(IpProtocol::Tcp);
        },
        IpVersion::Ipv6 => {
            let ip = ipv6_packet::new_unchecked_mut(&mut bytes[..hlen]);
            ip.set_next_header(IpProtocol::Tcp);
        },
    }

    // Reuse the buffer, dropping everything the reply does not need. The tags described the
    // received datagram, not the reply.
    packet.truncate(0);
    packet.tags_mut().clear();
    packet.append(bytes);
    Ok((packet, version))
}

fn family_of(head: &[u8]) -> Result<IpVersion> {
    IpVersion::of_packet(head).map_err(|_| Error::AddressFamily)
}

fn addresses(bytes: &[u8], version: IpVersion) -> Result<(IpAddress, IpAddress)> {
    let hlen = version.header_len();
    if bytes.len() < hlen + TCP_HEADER_LEN {
        return Err(Error::BadSize);
    }

    Ok(match version {
        IpVersion::Ipv4 => {
            let ip = ipv4_packet::new_unchecked(&bytes[..hlen]);
            (ip.src_addr().into(), ip.dst_addr().into())
        },
        IpVersion::Ipv6 => {
            let ip = ipv6_packet::new_unchecked(&bytes[..hlen]);
            (ip.src_addr().into(), ip.dst_addr().into())
        },
    })
}

fn endpoints(bytes: &[u8], version: IpVersion) -> Result<Endpoints> {
    let (src, dst) = addresses(bytes, version)?;
    let tcp = tcp_packet::new_unchecked(&bytes[version.header_len()..]);
    Ok(Endpoints {
        src: IpEndpoint::new(src, tcp.src_port()),
        dst: IpEndpoint::new(dst, tcp.dst_port()),
    })
}

fn set_endpoints(bytes: &mut [u8], version: IpVersion, endpoints: Endpoints) -> Result<()> {
    let hlen = version.header_len();
    match (endpoints.src.addr, endpoints.dst.addr) {
        (IpAddress::Ipv4(src), IpAddress::Ipv4(dst)) => {
            let ip = ipv4_packet::new_unchecked_mut(&mut bytes[..hlen]);
            ip.set_src_addr(src);
            ip.set_dst_addr(dst);
        },
        (IpAddress::Ipv6(src), IpAddress::Ipv6(dst)) => {
            let ip = ipv6_packet::new_unchecked_mut(&mut bytes[..hlen]);
            ip.set_src_addr(src);
            ip.set_dst_addr(dst);
        },
        _ => return Err(Error::AddressFamily),
    }

    let tcp = tcp_packet::new_unchecked_mut(&mut bytes[hlen..]);
    tcp.set_src_port(endpoints.src.port);
    tcp.set_dst_port(endpoints.dst.port);
    Ok(())
}
