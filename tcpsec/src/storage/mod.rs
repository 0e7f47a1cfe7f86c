//! Packet buffers and the queues built from them.
//!
//! [`PacketBuf`] is the unit every engine in this crate consumes and produces. It owns its bytes
//! as a chain of segments and is only made contiguous where a header is read, with [`pullup`].
//! Buffers that the engines drop are handed back through [`Release`] so that the owner of the
//! storage can recycle or account for them.
//!
//! [`ReassemblyQueue`] holds the out-of-order segments of a TCP connection.
//!
//! [`PacketBuf`]: struct.PacketBuf.html
//! [`pullup`]: struct.PacketBuf.html#method.pullup
//! [`Release`]: trait.Release.html
//! [`ReassemblyQueue`]: struct.ReassemblyQueue.html
mod packet;
mod reassembly;
mod tags;

pub use self::packet::{Discard, PacketBuf, Release};
pub use self::reassembly::{ReassemblyQueue, Segment};
pub use self::tags::{IpsecRecord, Tag, TagKey, Tags};
