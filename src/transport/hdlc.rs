//! Asynchronous HDLC-like framing (RFC 1662).
//!
//! ```text
//! ┌──────┬──────────────────────────┬─────────────┬──────┐
//! │ 7E   │ frame, octet-stuffed     │ FCS-16 (LE) │ 7E   │
//! │ 1    │ ...                      │ stuffed     │ 1    │
//! └──────┴──────────────────────────┴─────────────┴──────┘
//! ```
//!
//! Stuffing replaces an octet `b` with `7D, b ^ 0x20`. Flag and escape octets
//! are always stuffed; other octets only when the escape map says so.
//!
//! The decoder is a small state machine fed with whatever the stream returns:
//! - `Hunting`: discarding bytes until the next flag
//! - `Collecting`: accumulating frame bytes
//! - `Escaped`: the previous byte was `7D`

use bytes::{BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_16_IBM_SDLC};

use crate::link::EscapeMap;
use crate::packet::Packet;

/// Frame delimiter.
pub const HDLC_FLAG: u8 = 0x7E;

/// Control escape.
pub const HDLC_ESCAPE: u8 = 0x7D;

/// XOR applied to an escaped octet.
pub const HDLC_TRANS: u8 = 0x20;

/// Size of the frame check sequence.
pub const FCS_LEN: usize = 2;

const FCS16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Frame check sequence over every chunk of a packet.
pub fn fcs16(packet: &Packet) -> u16 {
    let mut digest = FCS16.digest();
    for chunk in packet.chunks() {
        digest.update(chunk);
    }
    digest.finalize()
}

#[inline]
fn put_stuffed(out: &mut BytesMut, octet: u8, escape: &EscapeMap) {
    if octet == HDLC_FLAG || octet == HDLC_ESCAPE || escape.is_escaped(octet) {
        out.put_u8(HDLC_ESCAPE);
        out.put_u8(octet ^ HDLC_TRANS);
    } else {
        out.put_u8(octet);
    }
}

/// Stuff a frame, append its FCS and wrap it in flags.
pub fn encode_frame(frame: &Packet, escape: &EscapeMap) -> Bytes {
    let mut out = BytesMut::with_capacity(frame.len() * 2 + 2 * FCS_LEN + 2);
    out.put_u8(HDLC_FLAG);
    for chunk in frame.chunks() {
        for &octet in chunk {
            put_stuffed(&mut out, octet, escape);
        }
    }
    for octet in fcs16(frame).to_le_bytes() {
        put_stuffed(&mut out, octet, escape);
    }
    out.put_u8(HDLC_FLAG);
    out.freeze()
}

/// One result of feeding bytes to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A frame with a valid FCS, FCS removed.
    Frame(Packet),
    /// A frame failed its FCS check or was shorter than one.
    BadFcs,
    /// A frame exceeded the size limit and was discarded.
    Overrun,
    /// The sender aborted a frame with `7D 7E`.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Hunting,
    Collecting,
    Escaped,
}

/// Incremental HDLC frame decoder.
#[derive(Debug)]
pub struct HdlcDecoder {
    buffer: BytesMut,
    state: State,
    max_frame: usize,
}

impl HdlcDecoder {
    /// Create a decoder accepting frames of up to `max_frame` unstuffed bytes
    /// (FCS included).
    pub fn new(max_frame: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_frame.min(4096)),
            state: State::Hunting,
            max_frame,
        }
    }

    /// Feed bytes from the stream and collect every completed result.
    pub fn push(&mut self, data: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();
        for &octet in data {
            if let Some(result) = self.push_octet(octet) {
                out.push(result);
            }
        }
        out
    }

    fn push_octet(&mut self, octet: u8) -> Option<Decoded> {
        match (self.state, octet) {
            (State::Hunting, HDLC_FLAG) => {
                self.state = State::Collecting;
                None
            }
            (State::Hunting, _) => None,
            (State::Escaped, HDLC_FLAG) => {
                self.buffer.clear();
                self.state = State::Collecting;
                Some(Decoded::Aborted)
            }
            (State::Collecting, HDLC_FLAG) => self.finish(),
            (State::Collecting, HDLC_ESCAPE) => {
                self.state = State::Escaped;
                None
            }
            (State::Collecting, _) => self.store(octet),
            (State::Escaped, _) => {
                self.state = State::Collecting;
                self.store(octet ^ HDLC_TRANS)
            }
        }
    }

    fn store(&mut self, octet: u8) -> Option<Decoded> {
        if self.buffer.len() >= self.max_frame {
            self.buffer.clear();
            self.state = State::Hunting;
            return Some(Decoded::Overrun);
        }
        self.buffer.put_u8(octet);
        None
    }

    /// Closing flag seen; it also opens the next frame.
    fn finish(&mut self) -> Option<Decoded> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut raw = self.buffer.split();
        if raw.len() <= FCS_LEN {
            return Some(Decoded::BadFcs);
        }
        let trailer = raw.split_off(raw.len() - FCS_LEN);
        let frame = Packet::from_bytes(raw.freeze());
        let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
        if fcs16(&frame) != expected {
            return Some(Decoded::BadFcs);
        }
        Some(Decoded::Frame(frame))
    }

    /// Number of buffered, not yet framed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop partial input and hunt for the next flag.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::Hunting;
    }
}
