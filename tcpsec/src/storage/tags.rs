use alloc::vec::Vec;

use crate::wire::{IpAddress, SecurityProtocol};

/// Keyed side data attached to a packet.
///
/// Tags model information that is about a packet but not part of its bytes: the UDP ports of a
/// NAT traversal encapsulation that was already stripped, the note that a packet came out of an
/// IPsec tunnel, the associations that processed it. Several tags of the same kind may be
/// attached, the most recently added one is found first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags {
    list: Vec<Tag>,
}

/// A single piece of side data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    /// Ports of the UDP encapsulation of ESP (RFC 3948) the packet arrived in.
    NatTraversalPorts {
        /// Source port, in host order.
        src: u16,
        /// Destination port, in host order.
        dst: u16,
    },

    /// The packet was decapsulated from a tunnel and has no real ingress interface.
    ///
    /// Packet filters should skip their interface based rules.
    SkipInterfaceFilter,

    /// Inbound IPsec processing completed under the recorded association.
    IpsecDone(IpsecRecord),

    /// A transform finished its cryptographic work under the recorded association.
    ///
    /// Relabeled as `IpsecDone` once the packet passes the input callback.
    IpsecCryptoDone(IpsecRecord),

    /// Data owned by some other layer.
    Opaque {
        /// Application chosen key.
        key: u32,
        /// Uninterpreted content.
        data: Vec<u8>,
    },
}

/// The identity of a security association which processed a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IpsecRecord {
    /// Destination address of the association.
    pub dst: IpAddress,
    /// The security protocol.
    pub proto: SecurityProtocol,
    /// Security parameter index.
    pub spi: u32,
}

/// Identifies the kind of a [`Tag`](enum.Tag.html) for lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKey {
    /// Matches `Tag::NatTraversalPorts`.
    NatTraversalPorts,
    /// Matches `Tag::SkipInterfaceFilter`.
    SkipInterfaceFilter,
    /// Matches `Tag::IpsecDone`.
    IpsecDone,
    /// Matches `Tag::IpsecCryptoDone`.
    IpsecCryptoDone,
    /// Matches `Tag::Opaque` with that key.
    Opaque(u32),
}

impl Tag {
    /// The key under which this tag is found.
    pub fn key(&self) -> TagKey {
        match self {
            Tag::NatTraversalPorts { .. } => TagKey::NatTraversalPorts,
            Tag::SkipInterfaceFilter => TagKey::SkipInterfaceFilter,
            Tag::IpsecDone(_) => TagKey::IpsecDone,
            Tag::IpsecCryptoDone(_) => TagKey::IpsecCryptoDone,
            Tag::Opaque { key, .. } => TagKey::Opaque(*key),
        }
    }
}

impl Tags {
    /// Find the most recent tag of a kind.
    pub fn find(&self, key: TagKey) -> Option<&Tag> {
        self.list.iter().find(|tag| tag.key() == key)
    }

    /// Iterate all tags of a kind, most recent first.
    pub fn find_all(&self, key: TagKey) -> impl Iterator<Item=&Tag> {
        self.list.iter().filter(move |tag| tag.key() == key)
    }

    /// Whether any tag of the kind is attached.
    pub fn contains(&self, key: TagKey) -> bool {
        self.find(key).is_some()
    }

    /// Attach a tag in front of all others, keeping existing tags of the same kind.
    pub fn prepend(&mut self, tag: Tag) {
        self.list.insert(0, tag);
    }

    /// Attach a tag, replacing every existing tag of the same kind.
    pub fn set(&mut self, tag: Tag) {
        let key = tag.key();
        self.list.retain(|existing| existing.key() != key);
        self.prepend(tag);
    }

    /// Detach the most recent tag of a kind.
    pub fn remove(&mut self, key: TagKey) -> Option<Tag> {
        let idx = self.list.iter().position(|tag| tag.key() == key)?;
        Some(self.list.remove(idx))
    }

    /// Detach all tags.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// The NAT traversal ports, `(0, 0)` if no traversal is in effect.
    pub fn nat_traversal_ports(&self) -> (u16, u16) {
        match self.find(TagKey::NatTraversalPorts) {
            Some(&Tag::NatTraversalPorts { src, dst }) => (src, dst),
            _ => (0, 0),
        }
    }

    /// The number of attached tags.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether no tag is attached.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(spi: u32) -> IpsecRecord {
        IpsecRecord {
            dst: IpAddress::v4(192, 0, 2, 1),
            proto: SecurityProtocol::Esp,
            spi,
        }
    }

    #[test]
    fn nat_ports_default_to_zero() {
        let mut tags = Tags::default();
        assert_eq!(tags.nat_traversal_ports(), (0, 0));
        tags.set(Tag::NatTraversalPorts { src: 4500, dst: 4501 });
        tags.set(Tag::NatTraversalPorts { src: 4500, dst: 4500 });
        assert_eq!(tags.nat_traversal_ports(), (4500, 4500));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn prepend_keeps_history() {
        let mut tags = Tags::default();
        tags.prepend(Tag::IpsecDone(record(1)));
        tags.prepend(Tag::IpsecDone(record(2)));
        assert_eq!(tags.find(TagKey::IpsecDone), Some(&Tag::IpsecDone(record(2))));
        assert_eq!(tags.find_all(TagKey::IpsecDone).count(), 2);
        assert_eq!(tags.remove(TagKey::IpsecDone), Some(Tag::IpsecDone(record(2))));
        assert_eq!(tags.find(TagKey::IpsecDone), Some(&Tag::IpsecDone(record(1))));
    }

    #[test]
    fn opaque_keys_are_distinct() {
        let mut tags = Tags::default();
        tags.set(Tag::Opaque { key: 1, data: alloc::vec![1] });
        tags.set(Tag::Opaque { key: 2, data: alloc::vec![2] });
        assert_eq!(tags.len(), 2);
        assert!(tags.contains(TagKey::Opaque(1)));
        assert!(!tags.contains(TagKey::SkipInterfaceFilter));
    }
}
