//! Owned packet buffer chain.
//!
//! A [`Packet`] is a chain of `bytes::Bytes` segments. Headers are prepended as
//! new segments instead of copying the payload, and trimming the front or back
//! only adjusts segment views. Every hand-off between the interface, its links
//! and the protocol consumers moves the `Packet` by value, so exactly one owner
//! exists at any time.
//!
//! # Example
//!
//! ```
//! use pppmux::Packet;
//!
//! let mut packet = Packet::from_slice(b"payload");
//! packet.prepend(&[0x00, 0x21]);
//! assert_eq!(packet.len(), 9);
//! assert_eq!(packet.byte_at(1), Some(0x21));
//!
//! packet.trim_front(2);
//! assert_eq!(packet.to_vec(), b"payload");
//! ```

use std::collections::VecDeque;
use std::fmt;

use bytes::{Buf, Bytes, BytesMut};

/// Owned, chained byte buffer.
#[derive(Clone, Default)]
pub struct Packet {
    /// Non-empty segments in wire order.
    chunks: VecDeque<Bytes>,
    /// Total length over all segments.
    len: usize,
}

impl Packet {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packet from a single segment (zero-copy).
    pub fn from_bytes(bytes: Bytes) -> Self {
        let mut packet = Self::new();
        packet.append_bytes(bytes);
        packet
    }

    /// Create a packet by copying a slice.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    /// Total number of bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the packet carries no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of segments in the chain.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Prepend a copy of `data` as a new leading segment.
    pub fn prepend(&mut self, data: &[u8]) {
        self.prepend_bytes(Bytes::copy_from_slice(data));
    }

    /// Prepend a segment (zero-copy).
    pub fn prepend_bytes(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        self.chunks.push_front(bytes);
    }

    /// Append a copy of `data` as a new trailing segment.
    pub fn append(&mut self, data: &[u8]) {
        self.append_bytes(Bytes::copy_from_slice(data));
    }

    /// Append a segment (zero-copy).
    pub fn append_bytes(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        self.chunks.push_back(bytes);
    }

    /// Remove `n` bytes from the front.
    ///
    /// Returns `false` and leaves the packet untouched if it is shorter than `n`.
    pub fn trim_front(&mut self, mut n: usize) -> bool {
        if n > self.len {
            return false;
        }
        self.len -= n;
        while n > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= n {
                n -= front.len();
                self.chunks.pop_front();
            } else {
                front.advance(n);
                n = 0;
            }
        }
        true
    }

    /// Remove `n` bytes from the back.
    ///
    /// Returns `false` and leaves the packet untouched if it is shorter than `n`.
    pub fn trim_back(&mut self, mut n: usize) -> bool {
        if n > self.len {
            return false;
        }
        self.len -= n;
        while n > 0 {
            let Some(back) = self.chunks.back_mut() else {
                break;
            };
            if back.len() <= n {
                n -= back.len();
                self.chunks.pop_back();
            } else {
                back.truncate(back.len() - n);
                n = 0;
            }
        }
        true
    }

    /// Iterate over the segments in order.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().map(|c| c.as_ref())
    }

    /// Read the byte at `index`, walking the chain.
    pub fn byte_at(&self, mut index: usize) -> Option<u8> {
        for chunk in &self.chunks {
            if index < chunk.len() {
                return Some(chunk[index]);
            }
            index -= chunk.len();
        }
        None
    }

    /// Copy the first `buf.len()` bytes into `buf`.
    ///
    /// Returns `false` if the packet is shorter than `buf`.
    pub fn copy_prefix(&self, buf: &mut [u8]) -> bool {
        if buf.len() > self.len {
            return false;
        }
        let mut filled = 0;
        for chunk in &self.chunks {
            if filled == buf.len() {
                break;
            }
            let take = chunk.len().min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&chunk[..take]);
            filled += take;
        }
        true
    }

    /// Collapse the chain into one segment and borrow it.
    pub fn make_contiguous(&mut self) -> &[u8] {
        if self.chunks.len() > 1 {
            let joined = self.gather();
            self.chunks.clear();
            self.chunks.push_back(joined);
        }
        self.chunks.front().map(|c| c.as_ref()).unwrap_or(&[])
    }

    /// Convert into a single contiguous `Bytes` (zero-copy for one segment).
    pub fn into_bytes(mut self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.pop_front().unwrap_or_default(),
            _ => self.gather(),
        }
    }

    /// Copy all bytes into a `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    fn gather(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len);
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
        buf.freeze()
    }
}

impl From<Bytes> for Packet {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(Bytes::from(data))
    }
}

impl From<&[u8]> for Packet {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.to_vec() == other.to_vec()
    }
}

impl Eq for Packet {}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.len)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}
