//! PPP wire conventions shared by links, interfaces and the family shim.
//!
//! Protocol discriminator:
//! ```text
//! ┌──────────────┐        ┌──────────┬──────────┐
//! │ low bit = 1  │   or   │ even hi  │ odd lo   │
//! │ 1 byte       │        │ 1 byte   │ 1 byte   │
//! └──────────────┘        └──────────┴──────────┘
//! ```
//!
//! A leading byte with its low bit set is a complete (compressed) protocol
//! number; otherwise the discriminator is two bytes, Big Endian. Frames may be
//! preceded by the standard `FF 03` address/control prefix.

use crate::error::{PppError, Result};
use crate::packet::Packet;

/// All-stations address byte.
pub const PPP_ALLSTATIONS: u8 = 0xFF;

/// Unnumbered-information control byte.
pub const PPP_UI: u8 = 0x03;

/// Size of the address/control prefix.
pub const AC_PREFIX_LEN: usize = 2;

/// Size of an uncompressed protocol field.
pub const PROTO_LEN: usize = 2;

/// Address + control + protocol.
pub const PPP_HDRLEN: usize = 4;

/// Default maximum receive unit.
pub const PPP_MRU: u16 = 1500;

/// Protocols at or above this value belong to link control and
/// authentication; they are never delivered to a network-protocol consumer.
pub const LINK_PROTOCOL_BASE: u16 = 0xC000;

/// Protocol numbers used by the core.
pub mod proto {
    /// Internet Protocol v4.
    pub const IP: u16 = 0x0021;
    /// Van Jacobson compressed TCP/IP.
    pub const VJC_COMP: u16 = 0x002D;
    /// Van Jacobson uncompressed TCP/IP.
    pub const VJC_UNCOMP: u16 = 0x002F;
    /// Internet Protocol v6.
    pub const IPV6: u16 = 0x0057;
    /// Individual-link compressed datagram.
    pub const COMPFRAG: u16 = 0x00FB;
    /// Compressed datagram.
    pub const COMP: u16 = 0x00FD;
    /// IP Control Protocol.
    pub const IPCP: u16 = 0x8021;
    /// IPv6 Control Protocol.
    pub const IPV6CP: u16 = 0x8057;
    /// Individual-link Compression Control Protocol.
    pub const CCPFRAG: u16 = 0x80FB;
    /// Compression Control Protocol.
    pub const CCP: u16 = 0x80FD;
    /// Link Control Protocol.
    pub const LCP: u16 = 0xC021;
    /// Password Authentication Protocol.
    pub const PAP: u16 = 0xC023;
    /// Challenge Handshake Authentication Protocol.
    pub const CHAP: u16 = 0xC223;
}

/// Check a protocol number against the PPP assignment rule.
///
/// The low byte must be odd and the high byte even, which is what makes the
/// low-bit discriminator rule unambiguous.
#[inline]
pub fn is_valid_protocol(protocol: u16) -> bool {
    protocol & 0x0001 == 0x0001 && protocol & 0x0100 == 0
}

/// Check if a protocol belongs to the link-control range.
#[inline]
pub fn is_link_protocol(protocol: u16) -> bool {
    protocol >= LINK_PROTOCOL_BASE
}

/// Check if a protocol carries network-layer data (0x0000-0x3FFF).
#[inline]
pub fn is_network_data(protocol: u16) -> bool {
    protocol < 0x4000
}

/// Decode the discriminator at the front of `packet`.
///
/// Returns the protocol and the number of bytes it occupied, or `None` if the
/// packet is too short.
pub fn decode_protocol(packet: &Packet) -> Option<(u16, usize)> {
    let first = packet.byte_at(0)?;
    if first & 0x01 == 0x01 {
        return Some((first as u16, 1));
    }
    let second = packet.byte_at(1)?;
    Some((u16::from_be_bytes([first, second]), PROTO_LEN))
}

/// Decode and strip the discriminator from the front of `packet`.
pub fn take_protocol(packet: &mut Packet) -> Result<u16> {
    let (protocol, len) = decode_protocol(packet)
        .ok_or_else(|| PppError::InvalidArgument("Frame too short for protocol field".into()))?;
    packet.trim_front(len);
    Ok(protocol)
}

/// Encode a protocol as the full two-byte field.
#[inline]
pub fn encode_protocol(protocol: u16) -> [u8; PROTO_LEN] {
    protocol.to_be_bytes()
}

/// Prepend the full two-byte protocol field.
#[inline]
pub fn push_protocol(packet: &mut Packet, protocol: u16) {
    packet.prepend(&encode_protocol(protocol));
}

/// Check if the packet starts with `FF 03`.
pub fn has_ac_prefix(packet: &Packet) -> bool {
    packet.byte_at(0) == Some(PPP_ALLSTATIONS) && packet.byte_at(1) == Some(PPP_UI)
}
