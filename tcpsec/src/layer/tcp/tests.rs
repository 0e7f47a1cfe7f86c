//! Connection engine tests.
//!
//! The host side is faked: IP output and segment output record what they are given, buffer
//! release counts, and the route cache is the in-crate `Routes` table.
use alloc::vec;
use alloc::vec::Vec;

use super::*;
use crate::layer::{Error, Result};
use crate::layer::ip::{
    Interface, Interfaces, Locks, Metrics, Output, OutputFlags, RouteEntry, RouteMetrics, Routes};
use crate::storage::{IpsecRecord, PacketBuf, Release, Segment, Tag, Tags};
use crate::time::{Expiration, Instant};
use crate::wire::{
    ipv4_packet, ipv6_packet, tcp_packet,
    IpAddress, IpEndpoint, IpProtocol, IpVersion, Ipv4Address, Ipv6Address,
    SecurityProtocol, TcpFlags, TcpSeqNumber};

mod mock {
    use super::*;

    pub(super) fn local_v4() -> Ipv4Address {
        Ipv4Address::new(192, 0, 2, 1)
    }

    pub(super) fn remote_v4() -> Ipv4Address {
        Ipv4Address::new(198, 51, 100, 7)
    }

    pub(super) fn local_v6() -> Ipv6Address {
        Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)
    }

    pub(super) fn remote_v6() -> Ipv6Address {
        Ipv6Address::new(0x2001, 0xdb8, 0, 1, 0, 0, 0, 7)
    }

    pub(super) fn tcb_v4(snd: u32, rcv: u32) -> TcpControlBlock {
        tcb_v4_with(snd, rcv, &Config::default())
    }

    pub(super) fn tcb_v4_with(snd: u32, rcv: u32, config: &Config) -> TcpControlBlock {
        let pcb = Ipv4Pcb::new(local_v4(), 80, remote_v4(), 40000, Socket::new(snd, rcv));
        TcpControlBlock::new(pcb.into(), config)
    }

    pub(super) fn tcb_v6(snd: u32, rcv: u32) -> TcpControlBlock {
        let pcb = Ipv6Pcb::new(local_v6(), 80, remote_v6(), 40000, Socket::new(snd, rcv));
        TcpControlBlock::new(pcb.into(), &Config::default())
    }

    /// Records every datagram given to IP output.
    #[derive(Default)]
    pub(super) struct Wire {
        pub(super) sent: Vec<(IpVersion, Vec<u8>, OutputFlags)>,
        pub(super) tags: Vec<Tags>,
    }

    impl Output for Wire {
        fn ipv4(&mut self, packet: PacketBuf, flags: OutputFlags) -> Result<()> {
            self.tags.push(packet.tags().clone());
            self.sent.push((IpVersion::Ipv4, packet.to_vec(), flags));
            Ok(())
        }

        fn ipv6(&mut self, packet: PacketBuf, flags: OutputFlags) -> Result<()> {
            self.tags.push(packet.tags().clone());
            self.sent.push((IpVersion::Ipv6, packet.to_vec(), flags));
            Ok(())
        }
    }

    /// Records the state of each connection handed to segment output.
    #[derive(Default)]
    pub(super) struct Segments {
        pub(super) calls: Vec<(State, TcpSeqNumber)>,
    }

    impl SegmentOutput for Segments {
        fn output(&mut self, tcb: &mut TcpControlBlock) -> Result<()> {
            self.calls.push((tcb.state, tcb.snd.nxt));
            Ok(())
        }
    }

    /// Counts released buffers.
    #[derive(Default)]
    pub(super) struct Freed(pub(super) usize);

    impl Release for Freed {
        fn release(&mut self, _: PacketBuf) {
            self.0 += 1;
        }
    }

    pub(super) fn queue_segments(tcb: &mut TcpControlBlock, count: u32) {
        for i in 0..count {
            tcb.reassembly.insert(Segment {
                seq: TcpSeqNumber(1000 + 100 * i),
                len: 10,
                flags: TcpFlags::NONE,
                packet: PacketBuf::from_vec(vec![0; 10]),
            });
        }
    }

    /// An IPv4 TCP segment from the remote to the local endpoint.
    pub(super) fn inbound_v4(flags: TcpFlags, options: &[u8], payload: &[u8]) -> Vec<u8> {
        let tcp_len = 20 + options.len();
        let total = 20 + tcp_len + payload.len();
        let mut bytes = vec![0; total];

        let ip = ipv4_packet::new_unchecked_mut(&mut bytes[..20]);
        ip.init();
        ip.set_total_len(total as u16);
        ip.set_hop_limit(50);
        ip.set_protocol(IpProtocol::Tcp);
        ip.set_src_addr(remote_v4());
        ip.set_dst_addr(local_v4());
        ip.fill_checksum();

        fill_tcp(&mut bytes[20..], flags, options);
        bytes[20 + tcp_len..].copy_from_slice(payload);
        bytes
    }

    /// An IPv6 TCP segment from the remote to the local endpoint.
    pub(super) fn inbound_v6(flags: TcpFlags) -> Vec<u8> {
        let mut bytes = vec![0; 60];

        let ip = ipv6_packet::new_unchecked_mut(&mut bytes[..40]);
        ip.init();
        ip.set_payload_len(20);
        ip.set_next_header(IpProtocol::Tcp);
        ip.set_hop_limit(50);
        ip.set_src_addr(remote_v6());
        ip.set_dst_addr(local_v6());

        fill_tcp(&mut bytes[40..], flags, &[]);
        bytes
    }

    fn fill_tcp(bytes: &mut [u8], flags: TcpFlags, options: &[u8]) {
        let tcp = tcp_packet::new_unchecked_mut(bytes);
        tcp.set_src_port(40000);
        tcp.set_dst_port(80);
        tcp.set_seq_number(TcpSeqNumber(7000));
        tcp.set_header_len(20 + options.len());
        tcp.set_flags(flags);
        tcp.set_window_len(1000);
        bytes[20..20 + options.len()].copy_from_slice(options);
    }
}

use self::mock::*;

fn routes_to_remote(route: RouteEntry) -> Routes {
    let mut routes = Routes::new(4);
    routes.add_route(route).expect("Room for a route");
    routes
}

#[test]
fn new_control_block_defaults() {
    let tcb = tcb_v4(8192, 8192);
    assert_eq!(tcb.state, State::Closed);
    assert_eq!(tcb.family(), IpVersion::Ipv4);
    assert_eq!((tcb.peer_mss, tcb.our_mss, tcb.segsz), (536, 536, 536));
    assert_eq!(tcb.rtt.srtt, None);
    // Four times the default round trip of 3 seconds, in half second ticks, scaled.
    assert_eq!(tcb.rtt.rxtcur, 12);
    assert_eq!(tcb.rtt.rttmin, 2);
    assert_eq!(tcb.snd.cwnd, 65_535 << 14);
    assert_eq!(tcb.snd.ssthresh, 65_535 << 14);
    assert!(tcb.options.req_scale);
    assert!(tcb.options.req_tstmp);
    assert!(tcb.options.will_sack);
    assert!(!tcb.has_template());

    let tcb = tcb_v6(8192, 8192);
    assert_eq!(tcb.family(), IpVersion::Ipv6);
    assert_eq!(tcb.peer_mss, 1024);
}

#[test]
fn option_policy_from_config() {
    let config = Config {
        rfc1323: false,
        sack: false,
        ack_on_push: true,
        ..Config::default()
    };
    let tcb = tcb_v4_with(8192, 8192, &config);
    assert_eq!(tcb.options, Options {
        ack_on_push: true,
        ..Options::default()
    });
}

#[test]
fn mss_never_below_floor() {
    let config = Config::default();
    let ifaces = [None, Some(0), Some(20), Some(41), Some(576), Some(1500), Some(9000)];
    let systems = [
        Interfaces::new(),
        vec![Interface::loopback(65536)].into_iter().collect(),
        vec![Interface::new(1500), Interface::loopback(33184)].into_iter().collect(),
        vec![Interface::new(9000)].into_iter().collect(),
    ];

    for &mss_ifmtu in [false, true].iter() {
        let config = Config { mss_ifmtu, ..config };
        for &family in [IpVersion::Ipv4, IpVersion::Ipv6].iter() {
            for iface in ifaces.iter() {
                let iface = iface.map(Interface::new);
                for system in systems.iter() {
                    let mss = negotiate_mss_outgoing(iface.as_ref(), family, system, &config);
                    assert!(mss >= u32::from(config.mss_default_for(family)),
                        "{:?} {} {:?} gave {}", iface, family, system, mss);
                }
            }
        }
    }
}

#[test]
fn mss_from_interfaces() {
    let config = Config::default();
    let lan = Interface::new(1500);
    let none = Interfaces::new();
    let jumbo: Interfaces = vec![Interface::new(9000)].into_iter().collect();
    let loopback: Interfaces = vec![Interface::loopback(65536)].into_iter().collect();

    assert_eq!(negotiate_mss_outgoing(Some(&lan), IpVersion::Ipv4, &none, &config), 1460);
    assert_eq!(negotiate_mss_outgoing(Some(&lan), IpVersion::Ipv6, &none, &config), 1440);
    assert_eq!(negotiate_mss_outgoing(Some(&lan), IpVersion::Ipv4, &jumbo, &config), 8960);
    assert_eq!(negotiate_mss_outgoing(None, IpVersion::Ipv4, &loopback, &config), 536);
    assert_eq!(negotiate_mss_outgoing(None, IpVersion::Ipv4, &none, &config), 536);
    assert_eq!(negotiate_mss_outgoing(None, IpVersion::Ipv6, &none, &config), 1024);

    let config = Config { mss_ifmtu: true, ..config };
    assert_eq!(negotiate_mss_outgoing(Some(&lan), IpVersion::Ipv4, &jumbo, &config), 1460);

    let mut tcb = tcb_v4(8192, 8192);
    assert_eq!(tcb.advertise_mss(Some(&lan), &jumbo), 8960);
    assert_eq!(tcb.our_mss, 8960);
}

#[test]
fn seed_rtt_is_idempotent() {
    let metrics = Metrics { rtt: 100_000, rttvar: 50_000, ..Metrics::default() };
    let routes = routes_to_remote(RouteEntry::host(remote_v4().into()).with_metrics(metrics));

    let mut tcb = tcb_v4(8192, 8192);
    tcb.seed_rtt_from_route(&routes);
    let seeded = tcb.rtt;
    assert_eq!(seeded.srtt, Some(6));
    assert_eq!(seeded.rttvar, 1);
    assert_eq!(seeded.rxtcur, 2);

    tcb.seed_rtt_from_route(&routes);
    assert_eq!(tcb.rtt, seeded);

    // A real measurement is never overwritten either.
    let mut stats = Stats::default();
    tcb.update_rtt(4, &mut stats);
    let measured = tcb.rtt;
    tcb.seed_rtt_from_route(&routes);
    assert_eq!(tcb.rtt, measured);
}

#[test]
fn seed_rtt_locked_raises_floor() {
    let metrics = Metrics { rtt: 1_000_000, ..Metrics::default() };
    let locks = Locks { rtt: true, ..Locks::default() };
    let routes = routes_to_remote(RouteEntry::network(IpAddress::v4(198, 51, 100, 0), 24)
        .with_metrics(metrics)
        .with_locks(locks));

    let mut tcb = tcb_v4(8192, 8192);
    tcb.seed_rtt_from_route(&routes);
    assert_eq!(tcb.rtt.rttmin, 2);
    assert_eq!(tcb.rtt.srtt, Some(64));
    assert_eq!(tcb.rtt.rttvar, 32);
    assert_eq!(tcb.rtt.rxtcur, 6);
}

#[test]
fn seed_rtt_below_resolution() {
    let metrics = Metrics { rtt: 10_000, rttvar: 5_000, ..Metrics::default() };
    let routes = routes_to_remote(RouteEntry::host(remote_v4().into()).with_metrics(metrics));

    let mut tcb = tcb_v4(8192, 8192);
    let before = tcb.rtt;
    tcb.seed_rtt_from_route(&routes);
    assert_eq!(tcb.rtt, before);
    assert_eq!(tcb.rtt.srtt, None);

    // The first measurement is then taken as is.
    let mut stats = Stats::default();
    tcb.update_rtt(1, &mut stats);
    assert_eq!(tcb.rtt.srtt, Some(32));
    assert_eq!(tcb.rtt.rttvar, 8);
}

#[test]
fn seed_rtt_without_route() {
    let mut tcb = tcb_v4(8192, 8192);
    let before = tcb.rtt;
    tcb.seed_rtt_from_route(&Routes::new(1));
    assert_eq!(tcb.rtt, before);
}

#[test]
fn rtt_samples() {
    let mut stats = Stats::default();
    let mut tcb = tcb_v4(8192, 8192);
    tcb.soft_error = Some(SocketError::HostUnreachable);
    tcb.rtt.rxtshift = 3;

    tcb.update_rtt(4, &mut stats);
    assert_eq!(tcb.rtt.srtt, Some(128));
    assert_eq!(tcb.rtt.rttvar, 32);
    assert_eq!(tcb.rtt.rxtcur, 12);
    assert_eq!(tcb.rtt.rxtshift, 0);
    assert_eq!(tcb.soft_error, None);

    tcb.update_rtt(4, &mut stats);
    assert_eq!(tcb.rtt.srtt, Some(128));
    assert_eq!(tcb.rtt.rttvar, 24);
    assert_eq!(tcb.rtt.rxtcur, 10);
    assert_eq!(stats.rttupdated, 2);
}

#[test]
fn peer_mss_rounds_send_buffer() {
    let routes = Routes::new(1);
    // (send buffer, offered mss) -> (segment size, send buffer)
    let table = [
        (8192, 1460, 1460, 8760),
        (8760, 1460, 1460, 8760),
        (8761, 1460, 1460, 10_220),
        (1460, 1460, 1460, 1460),
        (1000, 1460, 1000, 1000),
        (300_000, 1460, 1460, 261_340),
    ];

    for &(buffer, offer, segsz, rounded) in table.iter() {
        let mut tcb = tcb_v4(buffer, 8192);
        tcb.apply_peer_mss(Some(offer), &routes);
        assert_eq!(tcb.peer_mss, u32::from(offer));
        assert_eq!(tcb.segsz, segsz, "buffer {}", buffer);
        assert_eq!(tcb.socket().snd.hiwat, rounded, "buffer {}", buffer);
        if buffer >= segsz {
            assert_eq!(tcb.socket().snd.hiwat % segsz, 0);
            assert!(tcb.socket().snd.hiwat <= tcb.config().sb_max);
        }
    }
}

#[test]
fn peer_mss_defaults_and_floor() {
    let routes = Routes::new(1);

    let mut tcb = tcb_v4(8192, 8192);
    tcb.apply_peer_mss(None, &routes);
    assert_eq!(tcb.peer_mss, 536);
    assert_eq!(tcb.socket().snd.hiwat, 8576);

    let mut tcb = tcb_v6(8192, 8192);
    tcb.apply_peer_mss(None, &routes);
    assert_eq!(tcb.peer_mss, 1024);

    let mut tcb = tcb_v4(8192, 8192);
    tcb.apply_peer_mss(Some(8), &routes);
    assert_eq!(tcb.peer_mss, MIN_PEER_MSS);
    assert_eq!(tcb.segsz, 32);
}

#[test]
fn peer_mss_option_overhead() {
    let mut tcb = tcb_v4(8192, 8192);
    tcb.options.rcvd_tstmp = true;
    tcb.apply_peer_mss(Some(1460), &Routes::new(1));
    assert_eq!(tcb.peer_mss, 1460);
    assert_eq!(tcb.segsz, 1448);
    assert_eq!(tcb.socket().snd.hiwat, 8688);
}

#[test]
fn peer_mss_route_hints() {
    let metrics = Metrics { ssthresh: 1000, sendpipe: 16384, ..Metrics::default() };
    let routes = routes_to_remote(RouteEntry::host(remote_v4().into()).with_metrics(metrics));

    let mut tcb = tcb_v4(8192, 8192);
    tcb.apply_peer_mss(Some(1460), &routes);
    // Never below two segments.
    assert_eq!(tcb.snd.ssthresh, 2920);
    // The route's pipe size replaces the socket buffer.
    assert_eq!(tcb.socket().snd.hiwat, 17_520);
}

#[test]
fn established_sizes_receive_buffer() {
    let routes = Routes::new(1);
    let mut tcb = tcb_v4(8192, 16384);
    tcb.our_mss = 1460;
    tcb.enter_established(&routes, Instant::from_secs(10));

    assert_eq!(tcb.state, State::Established);
    assert_eq!(tcb.socket().rcv.hiwat, 17_520);
    assert_eq!(tcb.timers.deadline(TimerKind::Keepalive),
        Expiration::When(Instant::from_secs(7210)));
}

#[test]
fn soft_error_suppressed_when_established() {
    for &err in [
        SocketError::HostUnreachable,
        SocketError::NetUnreachable,
        SocketError::HostDown,
    ].iter() {
        let mut tcb = tcb_v4(8192, 8192);
        tcb.state = State::Established;
        let wakeups = tcb.socket().wakeups;

        tcb.notify_soft_error(err);
        assert_eq!(tcb.soft_error, None);
        assert_eq!(tcb.socket().error, None);
        assert_eq!(tcb.socket().wakeups.recv, wakeups.recv + 1);
        assert_eq!(tcb.socket().wakeups.send, wakeups.send + 1);
        assert_eq!(tcb.socket().wakeups.timeout, wakeups.timeout + 1);
    }

    // Other errors are still remembered.
    let mut tcb = tcb_v4(8192, 8192);
    tcb.state = State::Established;
    tcb.notify_soft_error(SocketError::ConnectionRefused);
    assert_eq!(tcb.soft_error, Some(SocketError::ConnectionRefused));
    assert_eq!(tcb.socket().error, None);
}

#[test]
fn soft_error_promoted_while_connecting() {
    let mut tcb = tcb_v4(8192, 8192);
    tcb.state = State::SynSent;
    tcb.rtt.rxtshift = 3;

    tcb.notify_soft_error(SocketError::HostUnreachable);
    assert_eq!(tcb.soft_error, Some(SocketError::HostUnreachable));
    // Not above the threshold yet.
    tcb.notify_soft_error(SocketError::HostDown);
    assert_eq!(tcb.soft_error, Some(SocketError::HostDown));
    assert_eq!(tcb.socket().error, None);

    tcb.rtt.rxtshift = 4;
    tcb.notify_soft_error(SocketError::NetUnreachable);
    assert_eq!(tcb.socket().error, Some(SocketError::NetUnreachable));
    assert_eq!(tcb.soft_error, Some(SocketError::HostDown));
}

#[test]
fn soft_error_v6_family() {
    let mut tcb = tcb_v6(8192, 8192);
    assert_eq!(tcb.notify_soft_error_v6(SocketError::ConnectionRefused), Ok(()));
    assert_eq!(tcb.soft_error, Some(SocketError::ConnectionRefused));

    let mut tcb = tcb_v4(8192, 8192);
    assert_eq!(tcb.notify_soft_error_v6(SocketError::ConnectionRefused), Err(Error::AddressFamily));
    assert_eq!(tcb.soft_error, None);
}

#[test]
fn path_mtu_restarts_window() {
    let mut routes = routes_to_remote(RouteEntry::host(remote_v4().into()).with_mtu(1280));
    let mut segments = Segments::default();
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    tcb.snd.una = TcpSeqNumber(1000);
    tcb.snd.nxt = TcpSeqNumber(9000);
    tcb.handle_path_mtu_notification(&mut routes, None, &mut segments, &mut stats);

    assert_eq!(tcb.snd.cwnd, 4 * 1280);
    assert_eq!(tcb.snd.nxt, TcpSeqNumber(1000));
    assert_eq!(segments.calls, vec![(State::Closed, TcpSeqNumber(1000))]);
    assert_eq!(stats.mturesent, 1);
}

#[test]
fn path_mtu_clones_network_route() {
    let mut routes = routes_to_remote(RouteEntry::network(IpAddress::v4(198, 51, 100, 0), 24));
    let mut segments = Segments::default();
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    tcb.handle_path_mtu_notification(&mut routes, Some(1400), &mut segments, &mut stats);

    assert_eq!(routes.len(), 2);
    assert_eq!(routes.get(&remote_v4().into()).map(|route| route.host), Some(true));
    assert_eq!(tcb.snd.cwnd, 4 * 1400);
    assert_eq!(segments.calls.len(), 1);
}

#[test]
fn path_mtu_without_route() {
    let mut routes = Routes::new(1);
    let mut segments = Segments::default();
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    let cwnd = tcb.snd.cwnd;
    tcb.handle_path_mtu_notification(&mut routes, Some(1400), &mut segments, &mut stats);

    // Still resent, but the window is kept.
    assert_eq!(tcb.snd.cwnd, cwnd);
    assert_eq!(segments.calls.len(), 1);
}

#[test]
fn control_input_dispatch() {
    let mut routes = Routes::new(1);
    let mut segments = Segments::default();
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    tcb.segsz = 1460;
    let action = tcb.control_input(ControlCommand::Quench, &mut routes, None, &mut segments, &mut stats);
    assert_eq!(action, Action::Quench);
    assert_eq!(tcb.snd.cwnd, 1460);

    let mut tcb = tcb_v6(8192, 8192);
    let action = tcb.control_input(ControlCommand::UnreachPort, &mut routes, None, &mut segments, &mut stats);
    assert_eq!(action, Action::Notify(SocketError::ConnectionRefused));
    assert_eq!(tcb.soft_error, Some(SocketError::ConnectionRefused));
    assert!(segments.calls.is_empty());
}

#[test]
fn close_drains_queue() {
    let mut routes = Routes::new(1);
    let mut freed = Freed::default();
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    queue_segments(&mut tcb, 5);
    let tuple = tcb.pcb().four_tuple();
    tcb.syn_cache.push(tuple);
    tcb.template();
    tcb.timers.arm(TimerKind::DelayedAck, Instant::from_millis(200));

    let pcb = tcb.close_connection(&mut routes, &mut freed, &mut stats);
    assert_eq!(freed.0, 5);
    assert_eq!(stats.closed, 1);
    assert!(!pcb.socket().connected);
    assert_eq!(pcb.family(), IpVersion::Ipv4);
}

#[test]
fn close_feeds_back_metrics() {
    let cached = Metrics { rtt: 500_000, ssthresh: 20_000, ..Metrics::default() };
    let mut routes = routes_to_remote(RouteEntry::host(remote_v4().into()).with_metrics(cached));
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    tcb.snd.max = tcb.snd.iss + 16 * 8192 + 1;
    tcb.rtt.srtt = Some(64);
    tcb.rtt.rttvar = 32;
    tcb.snd.ssthresh = 14_600;
    tcb.segsz = 1460;
    tcb.close_connection(&mut routes, &mut Freed::default(), &mut stats);

    let metrics = routes.get(&remote_v4().into()).expect("Route exists").metrics;
    assert_eq!(metrics.rtt, 750_000);
    assert_eq!(metrics.rttvar, 1_000_000);
    // Ten segments with headers, averaged with the cached value.
    assert_eq!(metrics.ssthresh, 17_500);
}

#[test]
fn close_respects_locks() {
    let cached = Metrics { rtt: 500_000, rttvar: 200_000, ..Metrics::default() };
    let locks = Locks { rtt: true, rttvar: true, ssthresh: true, mtu: false };
    let mut routes = routes_to_remote(RouteEntry::host(remote_v4().into())
        .with_metrics(cached)
        .with_locks(locks));

    let mut tcb = tcb_v4(8192, 8192);
    tcb.snd.max = tcb.snd.iss + 16 * 8192 + 1;
    tcb.rtt.srtt = Some(64);
    tcb.close_connection(&mut routes, &mut Freed::default(), &mut Stats::default());

    let metrics = routes.get(&remote_v4().into()).expect("Route exists").metrics;
    assert_eq!(metrics, cached);
}

#[test]
fn close_without_sample() {
    let cached = Metrics { rtt: 500_000, ..Metrics::default() };
    let mut routes = routes_to_remote(RouteEntry::host(remote_v4().into()).with_metrics(cached));

    // Exactly the threshold is not enough.
    let mut tcb = tcb_v4(8192, 8192);
    tcb.snd.max = tcb.snd.iss + 16 * 8192;
    tcb.rtt.srtt = Some(64);
    tcb.close_connection(&mut routes, &mut Freed::default(), &mut Stats::default());
    assert_eq!(routes.get(&remote_v4().into()).map(|route| route.metrics), Some(cached));

    // A default route never learns.
    let mut routes = routes_to_remote(RouteEntry::network(IpAddress::v4(0, 0, 0, 0), 0)
        .with_metrics(cached));
    let mut tcb = tcb_v4(8192, 8192);
    tcb.snd.max = tcb.snd.iss + 16 * 8192 + 1;
    tcb.rtt.srtt = Some(64);
    tcb.close_connection(&mut routes, &mut Freed::default(), &mut Stats::default());
    assert_eq!(routes.get(&remote_v4().into()).map(|route| route.metrics), Some(cached));
}

#[test]
fn drop_sends_reset() {
    let mut segments = Segments::default();
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    tcb.state = State::Established;
    tcb.soft_error = Some(SocketError::HostUnreachable);
    queue_segments(&mut tcb, 2);

    let mut freed = Freed::default();
    let pcb = tcb.drop_connection(SocketError::TimedOut,
        &mut segments, &mut Routes::new(1), &mut freed, &mut stats);

    assert_eq!(segments.calls.len(), 1);
    assert_eq!(segments.calls[0].0, State::Closed);
    assert_eq!(pcb.socket().error, Some(SocketError::HostUnreachable));
    assert_eq!(freed.0, 2);
    assert_eq!((stats.drops, stats.conndrops, stats.closed), (1, 0, 1));
}

#[test]
fn drop_embryonic() {
    let mut segments = Segments::default();
    let mut stats = Stats::default();

    let mut tcb = tcb_v4(8192, 8192);
    tcb.state = State::SynSent;
    let pcb = tcb.drop_connection(SocketError::TimedOut,
        &mut segments, &mut Routes::new(1), &mut Freed::default(), &mut stats);

    assert!(segments.calls.is_empty());
    assert_eq!(pcb.socket().error, Some(SocketError::TimedOut));
    assert_eq!((stats.drops, stats.conndrops, stats.closed), (0, 1, 1));
}

#[test]
fn keepalive_from_template() {
    let mut wire = Wire::default();
    let mut tcb = tcb_v4(8192, 16384);
    tcb.rcv.nxt = TcpSeqNumber(5000);
    tcb.snd.una = TcpSeqNumber(1000);

    tcb.send_keepalive(&mut wire).expect("Keepalive sent");
    assert!(tcb.has_template());
    assert_eq!(wire.sent.len(), 1);

    let (version, bytes, flags) = &wire.sent[0];
    assert_eq!(*version, IpVersion::Ipv4);
    assert_eq!(*flags, OutputFlags { mtu_discovery: true, dont_route: false });
    assert_eq!(bytes.len(), 40);

    let ip = ipv4_packet::new_checked(bytes).expect("Valid header");
    assert!(ip.verify_checksum());
    assert_eq!(ip.total_len(), 40);
    assert_eq!(ip.hop_limit(), 64);
    assert_eq!(ip.src_addr(), local_v4());
    assert_eq!(ip.dst_addr(), remote_v4());

    let tcp = tcp_packet::new_checked(&bytes[20..]).expect("Valid segment");
    assert!(tcp.verify_checksum(local_v4().into(), remote_v4().into()));
    assert_eq!(tcp.src_port(), 80);
    assert_eq!(tcp.dst_port(), 40000);
    assert_eq!(tcp.seq_number(), TcpSeqNumber(999));
    assert_eq!(tcp.ack_number(), TcpSeqNumber(5000));
    assert_eq!(tcp.flags(), TcpFlags::ACK);
    assert_eq!(tcp.window_len(), 16384);
}

#[test]
fn keepalive_compat_byte() {
    let config = Config { compat_42: true, ..Config::default() };
    let mut wire = Wire::default();
    let mut tcb = tcb_v4_with(8192, 8192, &config);
    tcb.send_keepalive(&mut wire).expect("Keepalive sent");

    let bytes = &wire.sent[0].1;
    assert_eq!(bytes.len(), 41);
    let ip = ipv4_packet::new_checked(bytes).expect("Valid header");
    assert_eq!(ip.total_len(), 41);
    let tcp = tcp_packet::new_checked(&bytes[20..]).expect("Valid segment");
    assert!(tcp.verify_checksum(local_v4().into(), remote_v4().into()));
}

#[test]
fn window_scaled_and_clamped() {
    let mut wire = Wire::default();
    let mut tcb = tcb_v4(8192, 1 << 20);
    tcb.send_keepalive(&mut wire).expect("Keepalive sent");
    tcb.rcv.scale = 7;
    tcb.send_keepalive(&mut wire).expect("Keepalive sent");

    let window = |bytes: &Vec<u8>| tcp_packet::new_unchecked(&bytes[20..]).window_len();
    assert_eq!(window(&wire.sent[0].1), 65535);
    assert_eq!(window(&wire.sent[1].1), 8192);
}

#[test]
fn reset_reverses_inbound() {
    let config = Config::default();
    let mut wire = Wire::default();
    let bytes = inbound_v4(TcpFlags::ACK, &[], &[1, 2, 3, 4]);
    let packet = PacketBuf::from_segments(vec![bytes[..30].to_vec(), bytes[30..].to_vec()]);

    build_response(
        None,
        ResponseSource::Inbound { packet, tcp_offset: 20 },
        TcpSeqNumber(0),
        TcpSeqNumber(7004),
        TcpFlags::RST,
        &config,
        &mut wire,
    ).expect("Reset sent");

    let bytes = &wire.sent[0].1;
    assert_eq!(bytes.len(), 40);
    let ip = ipv4_packet::new_checked(bytes).expect("Valid header");
    assert!(ip.verify_checksum());
    assert_eq!(ip.total_len(), 40);
    assert_eq!(ip.hop_limit(), 64);
    assert_eq!(ip.src_addr(), local_v4());
    assert_eq!(ip.dst_addr(), remote_v4());

    let tcp = tcp_packet::new_checked(&bytes[20..]).expect("Valid segment");
    assert!(tcp.verify_checksum(local_v4().into(), remote_v4().into()));
    assert_eq!((tcp.src_port(), tcp.dst_port()), (80, 40000));
    assert_eq!(tcp.seq_number(), TcpSeqNumber(7004));
    assert_eq!(tcp.flags(), TcpFlags::RST);
    assert_eq!(tcp.window_len(), 0);
}

#[test]
fn reset_drops_inbound_state() {
    let config = Config::default();
    let mut wire = Wire::default();
    let mut bytes = inbound_v4(TcpFlags::ACK, &[], &[]);
    {
        let ip = ipv4_packet::new_unchecked_mut(&mut bytes[..20]);
        ip.set_dscp_ecn(0x03);
        ip.set_ident(0xabcd);
        // Don't fragment.
        ip.set_frag_field(0x4000);
        ip.fill_checksum();
    }

    let mut packet = PacketBuf::from_vec(bytes);
    packet.tags_mut().set(Tag::NatTraversalPorts { src: 4500, dst: 4500 });
    packet.tags_mut().prepend(Tag::IpsecDone(IpsecRecord {
        dst: local_v4().into(),
        proto: SecurityProtocol::Esp,
        spi: 0x1000,
    }));

    build_response(
        None,
        ResponseSource::Inbound { packet, tcp_offset: 20 },
        TcpSeqNumber(0),
        TcpSeqNumber(7001),
        TcpFlags::RST,
        &config,
        &mut wire,
    ).expect("Reset sent");

    assert!(wire.tags[0].is_empty());
    let ip = ipv4_packet::new_checked(&wire.sent[0].1).expect("Valid header");
    assert_eq!(ip.dscp_ecn(), 0);
    assert_eq!(ip.ident(), 0);
    assert_eq!(ip.frag_field(), 0);
    assert!(ip.verify_checksum());
}

#[test]
fn syn_reply_keeps_options() {
    let config = Config::default();
    let mut wire = Wire::default();
    let tcb = tcb_v4(8192, 8192);
    // Maximum segment size option.
    let bytes = inbound_v4(TcpFlags::SYN, &[2, 4, 5, 180], &[]);

    build_response(
        Some(&tcb),
        ResponseSource::Inbound { packet: bytes.into(), tcp_offset: 20 },
        TcpSeqNumber(7001),
        TcpSeqNumber(300),
        TcpFlags::SYN | TcpFlags::ACK,
        &config,
        &mut wire,
    ).expect("Reply sent");

    let bytes = &wire.sent[0].1;
    assert_eq!(bytes.len(), 44);
    let tcp = tcp_packet::new_checked(&bytes[20..]).expect("Valid segment");
    assert_eq!(tcp.header_len(), 24);
    assert_eq!(&bytes[40..], &[2, 4, 5, 180]);
    assert_eq!(tcp.flags(), TcpFlags::SYN | TcpFlags::ACK);
    // The window of a SYN is left as received.
    assert_eq!(tcp.window_len(), 1000);
    assert!(tcp.verify_checksum(local_v4().into(), remote_v4().into()));
}

#[test]
fn ack_reverses_inbound_v6() {
    let config = Config::default();
    let mut wire = Wire::default();
    let tcb = tcb_v6(8192, 4096);

    build_response(
        Some(&tcb),
        ResponseSource::Inbound { packet: inbound_v6(TcpFlags::ACK).into(), tcp_offset: 40 },
        TcpSeqNumber(7000),
        TcpSeqNumber(1),
        TcpFlags::ACK,
        &config,
        &mut wire,
    ).expect("Ack sent");

    let (version, bytes, _) = &wire.sent[0];
    assert_eq!(*version, IpVersion::Ipv6);
    let ip = ipv6_packet::new_checked(bytes).expect("Valid header");
    assert_eq!(ip.payload_len(), 20);
    assert_eq!(ip.hop_limit(), 64);
    assert_eq!(ip.next_header(), IpProtocol::Tcp);
    assert_eq!(ip.src_addr(), local_v6());
    assert_eq!(ip.dst_addr(), remote_v6());

    let tcp = tcp_packet::new_checked(&bytes[40..]).expect("Valid segment");
    assert!(tcp.verify_checksum(local_v6().into(), remote_v6().into()));
    assert_eq!(tcp.window_len(), 4096);
}

#[test]
fn response_errors() {
    let config = Config::default();
    let mut wire = Wire::default();

    let not_ip = PacketBuf::from_vec(vec![0x50; 40]);
    assert_eq!(build_response(None, ResponseSource::Inbound { packet: not_ip, tcp_offset: 20 },
        TcpSeqNumber(0), TcpSeqNumber(0), TcpFlags::RST, &config, &mut wire),
        Err(Error::AddressFamily));

    let truncated = PacketBuf::from_vec(inbound_v4(TcpFlags::ACK, &[], &[])[..30].to_vec());
    assert_eq!(build_response(None, ResponseSource::Inbound { packet: truncated, tcp_offset: 20 },
        TcpSeqNumber(0), TcpSeqNumber(0), TcpFlags::RST, &config, &mut wire),
        Err(Error::NoBufs));

    assert!(wire.sent.is_empty());
}

#[test]
fn endpoints_reverse() {
    let there = Endpoints {
        src: IpEndpoint::new(remote_v4(), 40000),
        dst: IpEndpoint::new(local_v4(), 80),
    };
    let back = reverse_endpoints(there);
    assert_eq!(back.src, there.dst);
    assert_eq!(back.dst, there.src);
    assert_eq!(reverse_endpoints(back), there);
}

#[test]
fn table_keys_expire() {
    let mut table = Connections::new();
    let tuple = tcb_v4(1, 1).pcb().four_tuple();

    let key = table.insert(tcb_v4(8192, 8192)).expect("Inserted");
    assert_eq!(table.insert(tcb_v4(8192, 8192)).err(), Some(Error::Illegal));
    assert_eq!(table.lookup(&tuple), Some(key));
    assert_eq!(table.len(), 1);

    let handle = table.get_mut(key).expect("Present")
        .timers.arm(TimerKind::Keepalive, Instant::from_secs(5));
    let tcb = table.remove(key).expect("Present");
    assert!(table.get(key).is_none());
    assert_eq!(table.lookup(&tuple), None);

    // The slot is reused, the old key and its timers stay dead.
    let newer = table.insert(tcb).expect("Inserted");
    assert_ne!(newer, key);
    assert!(table.get(key).is_none());
    assert_eq!(table.fire_timer(key, handle, Instant::from_secs(6)), None);
    assert!(table.get(newer).is_some());
}

#[test]
fn closed_connection_timers_dead() {
    let mut table = Connections::new();
    let key = table.insert(tcb_v4(8192, 8192)).expect("Inserted");
    let handle = table.get_mut(key).expect("Present")
        .timers.arm(TimerKind::Retransmit, Instant::from_secs(1));

    let mut tcb = table.remove(key).expect("Present");
    let generation = tcb.timers.generation();
    tcb.timers.cancel_all();
    assert_eq!(tcb.timers.fire(handle, Instant::from_secs(2)), None);
    assert_ne!(tcb.timers.generation(), generation);
    tcb.close_connection(&mut Routes::new(1), &mut Freed::default(), &mut Stats::default());
}

#[test]
fn table_notify_and_drain() {
    let mut table = Connections::new();
    let mut first = tcb_v4(8192, 8192);
    first.state = State::Established;
    queue_segments(&mut first, 3);
    table.insert(first).expect("Inserted");

    let second = Ipv4Pcb::new(local_v4(), 81, remote_v4(), 40000, Socket::new(8192, 8192));
    let mut second = TcpControlBlock::new(second.into(), &Config::default());
    queue_segments(&mut second, 2);
    let second = table.insert(second).expect("Inserted");

    let elsewhere = Ipv4Pcb::new(local_v4(), 80, Ipv4Address::new(203, 0, 113, 9), 40000,
        Socket::new(8192, 8192));
    let elsewhere = table.insert(TcpControlBlock::new(elsewhere.into(), &Config::default()))
        .expect("Inserted");

    let notified = table.notify_matching(&remote_v4().into(), ControlCommand::HostUnreach,
        &mut Routes::new(1), None, &mut Segments::default(), &mut Stats::default());
    assert_eq!(notified, 2);
    assert_eq!(table.get(second).and_then(|tcb| tcb.soft_error),
        Some(SocketError::HostUnreachable));
    assert_eq!(table.get(elsewhere).and_then(|tcb| tcb.soft_error), None);
    // The established connection suppressed it.
    assert!(table.iter().all(|(_, tcb)| tcb.state != State::Established || tcb.soft_error.is_none()));

    let mut freed = Freed::default();
    assert_eq!(table.drain(&mut freed), 5);
    assert_eq!(freed.0, 5);
    assert!(table.iter().all(|(_, tcb)| tcb.reassembly.is_empty()));
}

#[test]
fn isn_per_connection() {
    let isn = IsnGenerator::new(1, 2);
    let tcb = tcb_v4(8192, 8192);
    let tuple = tcb.pcb().four_tuple();
    let now = Instant::from_secs(1);
    assert_eq!(isn.isn(&tuple, now), isn.isn(&tuple, now));
    assert_ne!(isn.isn(&tuple, now), IsnGenerator::new(2, 1).isn(&tuple, now));
}
