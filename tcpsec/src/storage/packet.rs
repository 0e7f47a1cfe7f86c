use core::iter;

use alloc::vec::Vec;

use crate::wire::{Error, Result};
use super::Tags;

/// An owned packet made of one or more byte segments.
///
/// Received packets are not necessarily contiguous: a device may hand over a header in one buffer
/// and the payload in others, and decapsulation may split things further. Instead of requiring a
/// flat copy up front, a `PacketBuf` keeps its segments and makes a prefix contiguous only when a
/// header is about to be accessed, see [`pullup`].
///
/// Each buffer also carries its [`Tags`], keyed side data that travels with the bytes through the
/// layers.
///
/// [`pullup`]: #method.pullup
/// [`Tags`]: struct.Tags.html
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PacketBuf {
    /// Never contains an empty segment.
    segments: Vec<Vec<u8>>,
    tags: Tags,
}

/// Takes ownership of buffers which are no longer needed.
///
/// Where a packet is dropped by this crate it is handed to the caller's implementation, which may
/// recycle the storage or just count it.
pub trait Release {
    /// Take back a buffer.
    fn release(&mut self, packet: PacketBuf);
}

/// A `Release` that drops every buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl Release for Discard {
    fn release(&mut self, _: PacketBuf) { }
}

impl PacketBuf {
    /// An empty packet.
    pub fn new() -> Self {
        PacketBuf::default()
    }

    /// A packet consisting of a single contiguous segment.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        PacketBuf::from_segments(iter::once(bytes))
    }

    /// A packet chained from several segments, empty segments are ignored.
    pub fn from_segments<I>(segments: I) -> Self
        where I: IntoIterator<Item=Vec<u8>>
    {
        PacketBuf {
            segments: segments.into_iter().filter(|seg| !seg.is_empty()).collect(),
            tags: Tags::default(),
        }
    }

    /// The total number of bytes in all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Whether the packet holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The number of segments the bytes are spread over.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Iterate over the segments in order.
    pub fn segments(&self) -> impl Iterator<Item=&[u8]> {
        self.segments.iter().map(Vec::as_slice)
    }

    /// The bytes that are currently contiguous at the start of the packet.
    pub fn head(&self) -> &[u8] {
        self.segments.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable access to the contiguous head.
    pub fn head_mut(&mut self) -> &mut [u8] {
        match self.segments.first_mut() {
            Some(head) => head.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Ensure the first `len` bytes are contiguous and return them.
    ///
    /// Fails with `Error::Truncated` if the packet is shorter than `len`, in which case it is left
    /// unchanged.
    pub fn pullup(&mut self, len: usize) -> Result<&mut [u8]> {
        if len > self.len() {
            return Err(Error::Truncated);
        }

        if self.head().len() < len {
            let mut merged = Vec::with_capacity(len);
            let mut consumed = 0;
            for segment in self.segments.iter() {
                if merged.len() >= len {
                    break;
                }
                merged.extend_from_slice(segment);
                consumed += 1;
            }
            self.segments.splice(..consumed, iter::once(merged));
        }

        Ok(&mut self.head_mut()[..len])
    }

    /// Make the whole packet contiguous.
    pub fn contiguous(&mut self) -> &mut [u8] {
        if self.segments.len() > 1 {
            let merged = self.segments.concat();
            self.segments.clear();
            self.segments.push(merged);
        }
        self.head_mut()
    }

    /// Copy bytes starting at `offset` into `out`, across segment boundaries.
    pub fn copy_data(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(out.len()).ok_or(Error::Truncated)?;
        if end > self.len() {
            return Err(Error::Truncated);
        }

        let mut skip = offset;
        let mut written = 0;
        for segment in self.segments.iter() {
            if written == out.len() {
                break;
            }
            if skip >= segment.len() {
                skip -= segment.len();
                continue;
            }
            let available = &segment[skip..];
            let count = available.len().min(out.len() - written);
            out[written..written + count].copy_from_slice(&available[..count]);
            written += count;
            skip = 0;
        }

        Ok(())
    }

    /// Read a single byte at `offset`.
    pub fn byte_at(&self, offset: usize) -> Result<u8> {
        let mut byte = [0];
        self.copy_data(offset, &mut byte)?;
        Ok(byte[0])
    }

    /// Overwrite a single byte at `offset`.
    pub fn set_byte_at(&mut self, offset: usize, value: u8) -> Result<()> {
        let mut skip = offset;
        for segment in self.segments.iter_mut() {
            if skip < segment.len() {
                segment[skip] = value;
                return Ok(());
            }
            skip -= segment.len();
        }
        Err(Error::Truncated)
    }

    /// Remove `len` bytes from the front.
    pub fn adjust_front(&mut self, len: usize) -> Result<()> {
        if len > self.len() {
            return Err(Error::Truncated);
        }

        let mut remaining = len;
        while remaining > 0 {
            let head = &mut self.segments[0];
            if head.len() <= remaining {
                remaining -= head.len();
                self.segments.remove(0);
            } else {
                head.drain(..remaining);
                remaining = 0;
            }
        }

        Ok(())
    }

    /// Shorten the packet to `len` bytes, dropping the tail.
    ///
    /// Has no effect if the packet is not longer than `len`.
    pub fn truncate(&mut self, len: usize) {
        let mut kept = 0;
        let mut keep_segments = 0;
        for segment in self.segments.iter_mut() {
            if kept >= len {
                break;
            }
            let room = len - kept;
            if segment.len() > room {
                segment.truncate(room);
            }
            kept += segment.len();
            keep_segments += 1;
        }
        self.segments.truncate(keep_segments);
    }

    /// Add `len` zeroed bytes in front of the packet and return them.
    ///
    /// The new bytes are always contiguous.
    pub fn prepend(&mut self, len: usize) -> &mut [u8] {
        if len == 0 {
            return &mut [];
        }
        self.segments.insert(0, alloc::vec![0; len]);
        self.head_mut()
    }

    /// Append bytes as a new segment.
    pub fn append(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.segments.push(bytes);
        }
    }

    /// A flat copy of all bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.segments.concat()
    }

    /// The side data attached to the packet.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Mutable access to the side data.
    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }
}

impl From<Vec<u8>> for PacketBuf {
    fn from(bytes: Vec<u8>) -> Self {
        PacketBuf::from_vec(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn chained() -> PacketBuf {
        PacketBuf::from_segments(vec![vec![0, 1, 2], vec![], vec![3, 4], vec![5, 6, 7, 8]])
    }

    #[test]
    fn empty_segments_dropped() {
        let packet = chained();
        assert_eq!(packet.segment_count(), 3);
        assert_eq!(packet.len(), 9);
        assert_eq!(packet.head(), &[0, 1, 2]);
    }

    #[test]
    fn pullup_merges_prefix() {
        let mut packet = chained();
        assert_eq!(packet.pullup(4).unwrap(), &[0, 1, 2, 3]);
        // Whole segments are merged, the rest stays chained.
        assert_eq!(packet.segment_count(), 2);
        assert_eq!(packet.head(), &[0, 1, 2, 3, 4]);
        assert_eq!(packet.to_vec(), (0..9).collect::<Vec<u8>>());
    }

    #[test]
    fn pullup_too_long() {
        let mut packet = chained();
        assert_eq!(packet.pullup(10), Err(Error::Truncated));
        assert_eq!(packet.segment_count(), 3);
        assert_eq!(packet.pullup(0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn copy_across_segments() {
        let packet = chained();
        let mut out = [0; 4];
        packet.copy_data(2, &mut out).unwrap();
        assert_eq!(out, [2, 3, 4, 5]);
        assert_eq!(packet.byte_at(8), Ok(8));
        assert_eq!(packet.byte_at(9), Err(Error::Truncated));
    }

    #[test]
    fn adjust_and_truncate() {
        let mut packet = chained();
        packet.adjust_front(4).unwrap();
        assert_eq!(packet.to_vec(), vec![4, 5, 6, 7, 8]);
        packet.truncate(2);
        assert_eq!(packet.to_vec(), vec![4, 5]);
        assert_eq!(packet.segment_count(), 2);
        packet.truncate(0);
        assert!(packet.is_empty());
    }

    #[test]
    fn prepend_header() {
        let mut packet = chained();
        packet.prepend(2).copy_from_slice(&[0xaa, 0xbb]);
        assert_eq!(packet.len(), 11);
        assert_eq!(packet.byte_at(0), Ok(0xaa));
        packet.set_byte_at(3, 0xcc).unwrap();
        assert_eq!(packet.byte_at(3), Ok(0xcc));
    }
}
