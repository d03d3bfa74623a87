//! PPP Deflate compression (RFC 1979).
//!
//! COMP frame body:
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ Sequence     │ Raw deflate data, sync flushed,              │
//! │ 2 bytes BE   │ trailing 00 00 FF FF removed                 │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! The deflated data covers the protocol field (compressed to one byte when its
//! high byte is zero) followed by the payload. Both ends count every frame they
//! run through the dictionary, including the ones sent uncompressed, so a
//! mismatch in sequence numbers means a frame was lost and a CCP reset is
//! needed.
//!
//! Option block: `[id, 4, (window - 8) << 4 | 8, 0]`.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::{CompStats, Compressor, CompressorBackend, DecompressError, Decompressor};
use crate::packet::Packet;
use crate::protocol::{proto, PROTO_LEN};

/// RFC 1979 option id.
pub const CI_DEFLATE: u8 = 26;

/// Option id used by pre-RFC implementations.
pub const CI_DEFLATE_DRAFT: u8 = 24;

/// Method nibble for deflate.
pub const DEFLATE_METHOD_VAL: u8 = 8;

/// Option block length.
const CILEN_DEFLATE: usize = 4;

/// Only sequence-number checking is defined.
const DEFLATE_CHK_SEQUENCE: u8 = 0;

const DEFLATE_MIN_WINDOW: u8 = 9;
const DEFLATE_MAX_WINDOW: u8 = 15;

/// Sequence number overhead.
const DEFLATE_OVHD: usize = 2;

/// What a sync flush leaves at the end of the stream.
const SYNC_TRAILER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Output buffer growth step.
const BUF_SLACK: usize = 256;

/// Largest stored block payload.
const STORED_MAX: usize = 0xFFFF;

/// Parse an option block for backend `id`, returning the window size in bits.
fn parse_options(options: &[u8], id: u8) -> Option<u8> {
    if options.len() < CILEN_DEFLATE
        || options[0] != id
        || options[1] as usize != CILEN_DEFLATE
        || options[2] & 0x0F != DEFLATE_METHOD_VAL
        || options[3] != DEFLATE_CHK_SEQUENCE
    {
        return None;
    }
    let window = (options[2] >> 4) + 8;
    if !(DEFLATE_MIN_WINDOW..=DEFLATE_MAX_WINDOW).contains(&window) {
        return None;
    }
    Some(window)
}

/// Protocols that go through the dictionary.
#[inline]
fn is_compressible(protocol: u16) -> bool {
    (proto::IP..=0x3FFF).contains(&protocol)
        && protocol != proto::COMP
        && protocol != proto::COMPFRAG
}

/// Split a frame into its protocol and the bytes the dictionary sees.
fn dictionary_input(data: &[u8]) -> Option<(u16, &[u8])> {
    if data.len() < PROTO_LEN {
        return None;
    }
    let protocol = u16::from_be_bytes([data[0], data[1]]);
    let body = if data[0] == 0 { &data[1..] } else { data };
    Some((protocol, body))
}

/// Deflate backend, registered under [`CI_DEFLATE`] or [`CI_DEFLATE_DRAFT`].
#[derive(Debug, Clone, Copy)]
pub struct DeflateBackend {
    id: u8,
}

impl DeflateBackend {
    /// Backend registered under the RFC id.
    pub fn new() -> Self {
        Self::with_id(CI_DEFLATE)
    }

    /// Backend registered under a different option id.
    pub fn with_id(id: u8) -> Self {
        Self { id }
    }
}

impl Default for DeflateBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressorBackend for DeflateBackend {
    fn id(&self) -> u8 {
        self.id
    }

    fn name(&self) -> &'static str {
        if self.id == CI_DEFLATE_DRAFT {
            "deflate-draft"
        } else {
            "deflate"
        }
    }

    fn alloc_compressor(&self, options: &[u8]) -> Option<Box<dyn Compressor>> {
        let window = parse_options(options, self.id)?;
        if window != DEFLATE_MAX_WINDOW {
            tracing::debug!(
                "deflate: transmit window of {} bits is not supported",
                window
            );
            return None;
        }
        Some(Box::new(DeflateCompressor {
            id: self.id,
            window,
            seqno: 0,
            unit: 0,
            debug: false,
            deflate: Compress::new(Compression::default(), false),
            stats: CompStats::default(),
        }))
    }

    fn alloc_decompressor(&self, options: &[u8]) -> Option<Box<dyn Decompressor>> {
        let window = parse_options(options, self.id)?;
        Some(Box::new(DeflateDecompressor {
            id: self.id,
            window,
            seqno: 0,
            unit: 0,
            mru: 0,
            debug: false,
            inflate: Decompress::new(false),
            stats: CompStats::default(),
        }))
    }
}

struct DeflateCompressor {
    id: u8,
    window: u8,
    seqno: u16,
    unit: u32,
    debug: bool,
    deflate: Compress,
    stats: CompStats,
}

impl DeflateCompressor {
    /// Deflate `input` with a sync flush and strip the trailer.
    fn deflate_sync(&mut self, input: &[u8]) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() + BUF_SLACK);
        let start = self.deflate.total_in();

        loop {
            let consumed = (self.deflate.total_in() - start) as usize;
            let before = (self.deflate.total_in(), self.deflate.total_out());
            if let Err(e) =
                self.deflate
                    .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)
            {
                tracing::warn!("deflate{}: compression failed: {}", self.unit, e);
                return None;
            }

            let consumed = (self.deflate.total_in() - start) as usize;
            let stalled = before == (self.deflate.total_in(), self.deflate.total_out());
            if out.len() < out.capacity() && (consumed == input.len() || stalled) {
                break;
            }
            out.reserve(BUF_SLACK);
        }

        if !out.ends_with(&SYNC_TRAILER) {
            tracing::warn!("deflate{}: sync flush trailer missing", self.unit);
            return None;
        }
        out.truncate(out.len() - SYNC_TRAILER.len());
        Some(out)
    }
}

impl Compressor for DeflateCompressor {
    fn init(&mut self, options: &[u8], unit: u32, debug: bool) -> bool {
        if parse_options(options, self.id) != Some(self.window) {
            return false;
        }
        self.unit = unit;
        self.debug = debug;
        self.reset();
        true
    }

    fn reset(&mut self) {
        self.seqno = 0;
        self.deflate.reset();
    }

    fn compress(&mut self, packet: &Packet) -> Option<Packet> {
        let data = packet.to_vec();
        let (protocol, body) = dictionary_input(&data)?;
        if !is_compressible(protocol) {
            return None;
        }

        let seq = self.seqno;
        self.seqno = self.seqno.wrapping_add(1);

        let deflated = self.deflate_sync(body)?;
        let out_len = deflated.len() + DEFLATE_OVHD;

        self.stats.unc_bytes += data.len() as u64;
        self.stats.unc_packets += 1;

        if out_len >= data.len() {
            self.stats.inc_bytes += data.len() as u64;
            self.stats.inc_packets += 1;
            if self.debug {
                tracing::debug!(
                    "deflate{}: seq {} incompressible ({} -> {})",
                    self.unit,
                    seq,
                    data.len(),
                    out_len
                );
            }
            return None;
        }

        self.stats.comp_bytes += out_len as u64;
        self.stats.comp_packets += 1;

        let mut out = Vec::with_capacity(out_len);
        out.extend_from_slice(&seq.to_be_bytes());
        out.extend_from_slice(&deflated);
        Some(Packet::from(out))
    }

    fn stats(&self) -> CompStats {
        self.stats
    }
}

struct DeflateDecompressor {
    id: u8,
    window: u8,
    seqno: u16,
    unit: u32,
    mru: usize,
    debug: bool,
    inflate: Decompress,
    stats: CompStats,
}

impl DeflateDecompressor {
    /// Inflate `input` with a sync flush, failing if more than `limit` bytes
    /// come out.
    fn inflate_sync(
        &mut self,
        input: &[u8],
        limit: usize,
    ) -> std::result::Result<Vec<u8>, DecompressError> {
        let mut out = Vec::with_capacity(input.len().saturating_mul(2).max(BUF_SLACK));
        let start = self.inflate.total_in();

        loop {
            let consumed = (self.inflate.total_in() - start) as usize;
            let before = (self.inflate.total_in(), self.inflate.total_out());
            let status = self
                .inflate
                .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
                .map_err(|e| {
                    tracing::debug!("deflate{}: inflate failed: {}", self.unit, e);
                    DecompressError::Fatal
                })?;

            if out.len() > limit {
                tracing::debug!("deflate{}: frame exceeds {} bytes", self.unit, limit);
                return Err(DecompressError::Fatal);
            }

            let consumed = (self.inflate.total_in() - start) as usize;
            let stalled = before == (self.inflate.total_in(), self.inflate.total_out());
            if status == Status::StreamEnd
                || (out.len() < out.capacity() && (consumed == input.len() || stalled))
            {
                break;
            }
            out.reserve(BUF_SLACK);
        }

        Ok(out)
    }
}

impl Decompressor for DeflateDecompressor {
    fn init(&mut self, options: &[u8], unit: u32, mru: usize, debug: bool) -> bool {
        if parse_options(options, self.id) != Some(self.window) {
            return false;
        }
        self.unit = unit;
        self.mru = mru;
        self.debug = debug;
        self.reset();
        true
    }

    fn reset(&mut self) {
        self.seqno = 0;
        self.inflate.reset(false);
    }

    fn decompress(&mut self, packet: &Packet) -> std::result::Result<Packet, DecompressError> {
        let data = packet.to_vec();
        if data.len() <= DEFLATE_OVHD {
            if self.debug {
                tracing::debug!("deflate{}: short frame ({} bytes)", self.unit, data.len());
            }
            return Err(DecompressError::Error);
        }

        let seq = u16::from_be_bytes([data[0], data[1]]);
        if seq != self.seqno {
            if self.debug {
                tracing::debug!(
                    "deflate{}: bad sequence {}, expected {}",
                    self.unit,
                    seq,
                    self.seqno
                );
            }
            return Err(DecompressError::Error);
        }
        self.seqno = self.seqno.wrapping_add(1);

        let mut input = Vec::with_capacity(data.len() - DEFLATE_OVHD + SYNC_TRAILER.len());
        input.extend_from_slice(&data[DEFLATE_OVHD..]);
        input.extend_from_slice(&SYNC_TRAILER);

        let inflated = self.inflate_sync(&input, self.mru + PROTO_LEN)?;
        let Some(&first) = inflated.first() else {
            tracing::debug!("deflate{}: no protocol in frame", self.unit);
            return Err(DecompressError::Error);
        };

        let mut frame = Vec::with_capacity(inflated.len() + 1);
        if first & 0x01 == 0x01 {
            frame.push(0);
        }
        frame.extend_from_slice(&inflated);
        if frame.len() < PROTO_LEN {
            return Err(DecompressError::Error);
        }

        self.stats.comp_bytes += data.len() as u64;
        self.stats.comp_packets += 1;
        self.stats.unc_bytes += frame.len() as u64;
        self.stats.unc_packets += 1;

        Ok(Packet::from(frame))
    }

    fn incompress(&mut self, packet: &Packet) {
        let data = packet.to_vec();
        let Some((protocol, body)) = dictionary_input(&data) else {
            return;
        };
        if !is_compressible(protocol) {
            return;
        }
        self.seqno = self.seqno.wrapping_add(1);

        // Stored blocks put the bytes in the window without emitting a stream
        // bit the peer did not send.
        let mut blocks = Vec::with_capacity(body.len() + 5 * (body.len() / STORED_MAX + 1));
        for chunk in body.chunks(STORED_MAX) {
            let len = chunk.len() as u16;
            blocks.push(0x00);
            blocks.extend_from_slice(&len.to_le_bytes());
            blocks.extend_from_slice(&(!len).to_le_bytes());
            blocks.extend_from_slice(chunk);
        }
        if self.inflate_sync(&blocks, usize::MAX).is_err() {
            tracing::warn!("deflate{}: failed to account uncompressed frame", self.unit);
            return;
        }

        self.stats.inc_bytes += data.len() as u64;
        self.stats.inc_packets += 1;
        self.stats.unc_bytes += data.len() as u64;
        self.stats.unc_packets += 1;
    }

    fn stats(&self) -> CompStats {
        self.stats
    }
}
