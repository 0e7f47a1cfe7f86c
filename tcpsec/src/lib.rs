//! The connection-control half of a TCP implementation and an IPsec input pipeline.
//!
//! ## Table of contents
//!
//! 1. [Design](#design)
//! 2. [The wire module](wire/index.html)
//! 3. [Buffers and the reassembly queue](storage/index.html)
//! 4. [The layers](layer/index.html)
//!    1. [IP collaborators](layer/ip/index.html)
//!    1. [The TCP control block engine](layer/tcp/index.html)
//!    1. [The IPsec input pipeline](layer/ipsec/index.html)
//!
//! ## Design
//!
//! Two engines live in this crate. The first owns everything about a TCP connection that is *not*
//! the data path: creating the control block, negotiating segment sizes, seeding and updating the
//! round trip estimator, reacting to ICMP, building bare control segments (ACK, RST, keepalive)
//! and tearing a connection down again. The second takes a datagram whose protocol number says
//! ESP, AH or IPCOMP, finds the security association it belongs to, hands it to that association's
//! transform and finally re-injects the decapsulated datagram into protocol dispatch.
//!
//! Neither engine owns a routing table, a socket layer, a key database or a device. All of those
//! are traits in [`layer::ip`], [`layer::tcp`] and [`layer::ipsec`] so that a host stack plugs in
//! its own and tests plug in fakes. Every connection is owned by exactly one caller at a time; the
//! only shared state is the security association, which is reference counted and keeps its
//! counters in atomics.
//!
//! Packets are [`storage::PacketBuf`], a chain of byte segments which can be pulled up so that a
//! header prefix is contiguous. Side data such as NAT traversal ports travels in its
//! [`storage::Tags`] instead of fixed fields.
//!
//! [`layer::ip`]: layer/ip/index.html
//! [`layer::tcp`]: layer/tcp/index.html
//! [`layer::ipsec`]: layer/ipsec/index.html
//! [`storage::PacketBuf`]: storage/struct.PacketBuf.html
//! [`storage::Tags`]: storage/struct.Tags.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

/// The `alloc` crate, packet buffers and association references need it.
pub extern crate alloc;

#[macro_use] mod macros;
pub mod layer;
pub mod storage;
pub mod time;
pub mod wire;
