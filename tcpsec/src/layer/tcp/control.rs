use alloc::vec::Vec;

use crate::storage::{PacketBuf, ReassemblyQueue};
use crate::time::ticks;
use crate::wire::{
    ipv4_packet, ipv6_packet, tcp_packet,
    IpProtocol, IpVersion, TcpSeqNumber,
    IPV4_HEADER_LEN, IPV6_HEADER_LEN, TCP_HEADER_LEN, TCP_MAX_WINDOW, TCP_MAX_WINDOW_SHIFT};

use super::config::Config;
use super::pcb::{FourTuple, OwningPcb, Socket, SocketError};
use super::rtt::{rexmtval, Rtt};
use super::timer::Timers;

/// State enum of the connection state machine.
///
/// The order of the variants is significant, a connection only ever moves towards later states
/// except for the return from `SynReceived` to `Listen`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Closed, or a control block that is about to be freed.
    Closed,
    /// Waiting for a connection request.
    Listen,
    /// Sent a SYN, waiting for the matching one.
    SynSent,
    /// Sent and received a SYN, waiting for the ACK.
    SynReceived,
    /// The connection is open.
    Established,
    /// Received a FIN, waiting for the application to close.
    CloseWait,
    /// Closed by the application and sent a FIN.
    FinWait1,
    /// Both sides closed simultaneously, waiting for the ACK of our FIN.
    Closing,
    /// Closed after the peer did, waiting for the ACK of our FIN.
    LastAck,
    /// Our FIN was acknowledged, waiting for the peer's.
    FinWait2,
    /// Waiting out 2MSL before the connection identity may be reused.
    TimeWait,
}

impl State {
    /// Whether a SYN was received in this connection.
    pub fn have_received_syn(self) -> bool {
        self >= State::SynReceived
    }

    /// Whether the connection was established at some point.
    pub fn have_established(self) -> bool {
        self >= State::Established
    }
}

/// The options requested for and negotiated on a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Options {
    /// We request window scaling.
    pub req_scale: bool,
    /// We request timestamps.
    pub req_tstmp: bool,
    /// The peer sent timestamps.
    pub rcvd_tstmp: bool,
    /// We offer selective acknowledgements.
    pub will_sack: bool,
    /// Ignore SACK blocks sent by the peer.
    pub ignore_rx_sack: bool,
    /// Acknowledge pushed segments immediately.
    pub ack_on_push: bool,
    /// Send no options at all.
    pub no_opt: bool,
}

/// The sending state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Send {
    /// The oldest unacknowledged sequence number, `SND.UNA`.
    pub una: TcpSeqNumber,
    /// The next sequence number to send, `SND.NXT`.
    pub nxt: TcpSeqNumber,
    /// The highest sequence number sent so far.
    pub max: TcpSeqNumber,
    /// The initial send sequence number, `ISS`.
    pub iss: TcpSeqNumber,
    /// The congestion window in bytes.
    pub cwnd: u32,
    /// The slow start threshold in bytes.
    pub ssthresh: u32,
    /// The window scale the peer applies to our advertisements.
    pub scale: u8,
}

/// The receiving state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Receive {
    /// The next expected sequence number, `RCV.NXT`.
    pub nxt: TcpSeqNumber,
    /// The initial receive sequence number, `IRS`.
    pub irs: TcpSeqNumber,
    /// The window scale we apply to our advertisements.
    pub scale: u8,
}

/// The state of one TCP connection outside of the data path.
///
/// The control block owns the protocol control block it is attached to. Closing the connection
/// consumes the control block and hands the protocol control block back, so no reference to the
/// connection can outlive it.
#[derive(Debug)]
pub struct TcpControlBlock {
    /// The current state of the state machine.
    pub state: State,

    /// The sending state.
    pub snd: Send,

    /// The receiving state.
    pub rcv: Receive,

    /// The round trip time estimator.
    pub rtt: Rtt,

    /// Requested and negotiated options.
    pub options: Options,

    /// The segment size offered by the peer.
    pub peer_mss: u32,

    /// The segment size we advertised.
    pub our_mss: u32,

    /// The segment size used for sending, after subtracting option overhead.
    pub segsz: u32,

    /// An asynchronous error not yet reported.
    ///
    /// Surfaced to the socket only if the connection fails without any better explanation.
    pub soft_error: Option<SocketError>,

    /// The connection timers.
    pub timers: Timers,

    /// Out-of-order segments.
    pub reassembly: ReassemblyQueue,

    /// Embryonic connections of a listening control block.
    pub syn_cache: Vec<FourTuple>,

    pub(crate) template: Option<PacketBuf>,
    pub(crate) pcb: OwningPcb,
    pub(crate) config: Config,
}

impl TcpControlBlock {
    /// Create the control block of a new connection.
    ///
    /// Segment sizes start at the default of the address family, the option policy is taken from
    /// `config`. There is no round trip estimate yet and the retransmit timer starts from the
    /// configured default. Congestion window and slow start threshold start at the largest
    /// possible window, slow start will pull them down.
    pub fn new(pcb: OwningPcb, config: &Config) -> Self {
        let mss = u32::from(config.mss_default_for(pcb.family()));

        let mut options = Options::default();
        if config.rfc1323 {
            options.req_scale = config.window_scale;
            options.req_tstmp = config.timestamps;
        }
        if config.sack {
            options.will_sack = true;
            options.ignore_rx_sack = config.sack_ignore_received;
        }
        options.ack_on_push = config.ack_on_push;

        // The variance is scaled by 16 while srtt is still zero, giving 4 times the default.
        let rttvar = ticks(config.rtt_default) << 3;
        let rttmin = ticks(config.rexmt_min);
        let rxtcur = rexmtval(None, rttvar)
            .max(rttmin)
            .min(ticks(config.rexmt_max));

        let max_window = TCP_MAX_WINDOW << TCP_MAX_WINDOW_SHIFT;
        TcpControlBlock {
            state: State::Closed,
            snd: Send {
                una: TcpSeqNumber(0),
                nxt: TcpSeqNumber(0),
                max: TcpSeqNumber(0),
                iss: TcpSeqNumber(0),
                cwnd: max_window,
                ssthresh: max_window,
                scale: 0,
            },
            rcv: Receive {
                nxt: TcpSeqNumber(0),
                irs: TcpSeqNumber(0),
                scale: 0,
            },
            rtt: Rtt {
                srtt: None,
                rttvar,
                rttmin,
                rxtcur,
                rxtshift: 0,
            },
            options,
            peer_mss: mss,
            our_mss: mss,
            segsz: mss,
            soft_error: None,
            timers: Timers::new(),
            reassembly: ReassemblyQueue::new(),
            syn_cache: Vec::new(),
            template: None,
            pcb,
            config: *config,
        }
    }

    /// The protocol control block this connection is attached to.
    pub fn pcb(&self) -> &OwningPcb {
        &self.pcb
    }

    /// Mutable access to the protocol control block.
    pub fn pcb_mut(&mut self) -> &mut OwningPcb {
        &mut self.pcb
    }

    /// The owning socket.
    pub fn socket(&self) -> &Socket {
        self.pcb.socket()
    }

    /// Mutable access to the owning socket.
    pub fn socket_mut(&mut self) -> &mut Socket {
        self.pcb.socket_mut()
    }

    /// The configuration captured at creation.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The address family of the connection.
    pub fn family(&self) -> IpVersion {
        self.pcb.family()
    }

    /// The cached header template, built on first use.
    ///
    /// Contains the IP and TCP header of a segment of this connection with addresses, ports and
    /// protocol filled in and everything else zeroed.
    pub fn template(&mut self) -> &PacketBuf {
        let pcb = &self.pcb;
        self.template.get_or_insert_with(|| build_template(pcb))
    }

    /// Whether a header template is cached.
    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// React to a source quench: close the congestion window to one segment.
    pub fn quench(&mut self) {
        net_trace!("tcp {}: source quench, cwnd {} -> {}", self.pcb.remote(), self.snd.cwnd, self.segsz);
        self.snd.cwnd = self.segsz;
    }

    /// Bytes of TCP options carried in every segment.
    pub(crate) fn tcp_optlen(&self) -> u32 {
        let opt = self.options;
        if opt.req_tstmp && opt.rcvd_tstmp && !opt.no_opt {
            // Timestamps, aligned by two NOPs.
            12
        } else {
            0
        }
    }
}

/// The IP and TCP header of a segment of the connection, addresses, ports and protocol filled in.
fn build_template(pcb: &OwningPcb) -> PacketBuf {
    let (local, remote) = (pcb.local(), pcb.remote());
    let (mut bytes, hlen) = match pcb {
        OwningPcb::V4(v4) => {
            let mut bytes = alloc::vec![0; IPV4_HEADER_LEN + TCP_HEADER_LEN];
            let ip = ipv4_packet::new_unchecked_mut(&mut bytes[..IPV4_HEADER_LEN]);
            ip.init();
            ip.set_protocol(IpProtocol::Tcp);
            ip.set_src_addr(v4.local);
            ip.set_dst_addr(v4.remote);
            (bytes, IPV4_HEADER_LEN)
        },
        OwningPcb::V6(v6) => {
            let mut bytes = alloc::vec![0; IPV6_HEADER_LEN + TCP_HEADER_LEN];
            let ip = ipv6_packet::new_unchecked_mut(&mut bytes[..IPV6_HEADER_LEN]);
            ip.init();
            ip.set_next_header(IpProtocol::Tcp);
            ip.set_src_addr(v6.local);
            ip.set_dst_addr(v6.remote);
            (bytes, IPV6_HEADER_LEN)
        },
    };

    let tcp = tcp_packet::new_unchecked_mut(&mut bytes[hlen..]);
    tcp.set_src_port(local.port);
    tcp.set_dst_port(remote.port);
    tcp.set_header_len(TCP_HEADER_LEN);
    PacketBuf::from_vec(bytes)
}
