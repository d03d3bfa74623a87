//! Van Jacobson TCP/IP header compression seam.
//!
//! The header codec itself is supplied by the embedder through a [`VjFactory`];
//! the interface only decides when to call it:
//!
//! ```text
//! send(IP, tcp datagram) ──► compress_tcp ──► IP | VJC_UNCOMP | VJC_COMP
//! deliver(VJC_COMP | VJC_UNCOMP) ──► uncompress ──► IP datagram
//! ```
//!
//! Receive failures toss the codec state so the peer's next uncompressed
//! packet resynchronizes the slot table.

use crate::packet::Packet;

/// Smallest IPv4 header.
pub const IPV4_MIN_HDRLEN: usize = 20;

/// IP protocol number of TCP.
pub const IPPROTO_TCP: u8 = 6;

/// Check whether an IP datagram is IPv4 carrying TCP.
pub fn is_tcp_ipv4(datagram: &Packet) -> bool {
    if datagram.len() < IPV4_MIN_HDRLEN {
        return false;
    }
    matches!(datagram.byte_at(0), Some(b) if b >> 4 == 4)
        && datagram.byte_at(9) == Some(IPPROTO_TCP)
}

/// Per-interface VJ compression state.
pub trait VjCodec: Send {
    /// Compress an IPv4 TCP datagram.
    ///
    /// Returns the protocol to send it under (IP, VJC_UNCOMP or VJC_COMP) and
    /// the possibly rewritten packet. `compress_cid` is false when the peer
    /// asked for the connection id to be sent on every packet.
    fn compress_tcp(&mut self, datagram: Packet, compress_cid: bool) -> (u16, Packet);

    /// Expand a VJC_COMP or VJC_UNCOMP frame back into an IP datagram.
    ///
    /// Returns `None` if the frame cannot be decoded.
    fn uncompress(&mut self, protocol: u16, packet: Packet) -> Option<Packet>;

    /// Discard receive state after an error.
    fn toss(&mut self);
}

/// Creates VJ state for an interface.
pub trait VjFactory: Send + Sync {
    /// Allocate state with `slots` connection slots in each direction.
    fn create(&self, slots: u8) -> Option<Box<dyn VjCodec>>;
}
