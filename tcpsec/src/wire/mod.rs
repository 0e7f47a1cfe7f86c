/*! Low-level packet access and construction.

# The packet representations used here

The `wire` module deals with the packet *representation*. Every header is a lowercase,
dynamically sized byte wrapper such as [`ipv4`] or [`tcp`] that turns a `[u8]` into a set of field
accessors and setters. There is no owned packet type in this module; ownership of packet bytes
lies with [`PacketBuf`] which hands out contiguous prefixes on request.

[`ipv4`]: struct.ipv4.html
[`tcp`]: struct.tcp.html
[`PacketBuf`]: ../storage/struct.PacketBuf.html

Each wrapper guarantees that, if `new_checked` returned successfully, no field accessor or setter
will panic as long as the buffer is not shrunk. The `new_unchecked` constructors are for buffers
the caller has already validated or is about to fill, such as a freshly allocated template.

Addresses, protocol numbers and the sequence number arithmetic of TCP are small `Copy` types that
live next to the header they belong to. Checksums follow RFC 1071 and are computed by the
crate-internal `ip::checksum` helpers, the IPv4 header checksum in [`ipv4::fill_checksum`] and the
transport checksums, including the pseudo header, in [`tcp::fill_checksum`] and
[`udp::fill_checksum`].

[`ipv4::fill_checksum`]: struct.ipv4.html#method.fill_checksum
[`tcp::fill_checksum`]: struct.tcp.html#method.fill_checksum
[`udp::fill_checksum`]: struct.udp.html#method.fill_checksum

# Examples

Emit a minimal IPv4 header and check it:

```rust
use tcpsec::wire::{ipv4_packet, IpProtocol, Ipv4Address};

let mut buffer = [0u8; 20];
let packet = ipv4_packet::new_unchecked_mut(&mut buffer);
packet.init();
packet.set_total_len(20);
packet.set_hop_limit(64);
packet.set_protocol(IpProtocol::Tcp);
packet.set_src_addr(Ipv4Address::new(10, 0, 0, 1));
packet.set_dst_addr(Ipv4Address::new(10, 0, 0, 2));
packet.fill_checksum();

let packet = ipv4_packet::new_checked(&buffer).expect("truncated packet");
assert!(packet.verify_checksum());
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to files in this folder unless otherwise noted. These are:
// * `error.rs`
// * `ip.rs`
// * `ipv4.rs`
// * `ipv6.rs`
// * `mod.rs` (this file)
// * `tcp.rs`
// * `udp.rs`

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod error;
pub(crate) mod ip;
pub mod ipsec;
mod ipv4;
mod ipv6;
pub mod ipv6ext;
mod tcp;
mod udp;

pub use self::error::{
    Error,
    Result};

pub use self::ip::{
    Address as IpAddress,
    Endpoint as IpEndpoint,
    Protocol as IpProtocol,
    Version as IpVersion};

pub use self::ipv4::{
    ipv4 as ipv4_packet,
    Address as Ipv4Address,
    DST_ADDR_OFFSET as IPV4_DST_ADDR_OFFSET,
    HEADER_LEN as IPV4_HEADER_LEN,
    PROTOCOL_OFFSET as IPV4_PROTOCOL_OFFSET};

pub use self::ipv6::{
    ipv6 as ipv6_packet,
    Address as Ipv6Address,
    DST_ADDR_OFFSET as IPV6_DST_ADDR_OFFSET,
    HEADER_LEN as IPV6_HEADER_LEN,
    MIN_MTU as IPV6_MIN_MTU,
    NEXT_HEADER_OFFSET as IPV6_NEXT_HEADER_OFFSET};

pub use self::ipsec::SecurityProtocol;

pub use self::tcp::{
    tcp as tcp_packet,
    Flags as TcpFlags,
    SeqNumber as TcpSeqNumber,
    HEADER_LEN as TCP_HEADER_LEN,
    MAX_WINDOW as TCP_MAX_WINDOW,
    MAX_WINDOW_SHIFT as TCP_MAX_WINDOW_SHIFT};

pub use self::udp::{
    udp as udp_packet,
    HEADER_LEN as UDP_HEADER_LEN};
