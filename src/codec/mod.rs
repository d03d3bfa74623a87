//! Codec module - pluggable payload compressors negotiated through CCP.
//!
//! This module provides:
//!
//! - [`CompressorBackend`] - a registered compression method, addressed by its
//!   CCP option id, that allocates per-interface codec state
//! - [`Compressor`] / [`Decompressor`] - the per-direction codec state
//! - [`CompressorRegistry`] - id to backend lookup
//! - [`DeflateBackend`] - PPP Deflate (RFC 1979) on top of `flate2`
//!
//! # Design
//!
//! Codec state is a boxed trait object owned by exactly one interface
//! direction. Freeing the state is dropping the box, so an interface can never
//! hold two live states for one direction or a reference to a freed one.
//!
//! # Example
//!
//! ```
//! use pppmux::codec::{CompressorRegistry, DeflateBackend};
//! use std::sync::Arc;
//!
//! let registry = CompressorRegistry::new();
//! registry.register(Arc::new(DeflateBackend::new())).unwrap();
//! assert!(registry.lookup(26).is_some());
//! ```

mod deflate;
mod registry;

use bitflags::bitflags;
use serde::Serialize;

use crate::packet::Packet;

pub use deflate::{DeflateBackend, CI_DEFLATE, CI_DEFLATE_DRAFT, DEFLATE_METHOD_VAL};
pub use registry::CompressorRegistry;

/// Which side of the interface a codec serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outbound compressor.
    Transmit,
    /// Inbound decompressor.
    Receive,
}

bitflags! {
    /// Operations a backend declares it implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BackendOps: u8 {
        const ALLOC = 0b0000_0001;
        const FREE = 0b0000_0010;
        const INIT = 0b0000_0100;
        const RESET = 0b0000_1000;
        const COMPRESS = 0b0001_0000;
        const DECOMPRESS = 0b0010_0000;
        const INCOMPRESS = 0b0100_0000;
        const STAT = 0b1000_0000;

        /// Every operation; registration requires all of them.
        const REQUIRED = Self::ALLOC.bits()
            | Self::FREE.bits()
            | Self::INIT.bits()
            | Self::RESET.bits()
            | Self::COMPRESS.bits()
            | Self::DECOMPRESS.bits()
            | Self::INCOMPRESS.bits()
            | Self::STAT.bits();
    }
}

/// Per-direction compression counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompStats {
    /// Bytes of packets that went through the codec (before compression).
    pub unc_bytes: u64,
    /// Packets that went through the codec.
    pub unc_packets: u64,
    /// Compressed bytes produced or consumed.
    pub comp_bytes: u64,
    /// Compressed packets produced or consumed.
    pub comp_packets: u64,
    /// Bytes sent or received as incompressible.
    pub inc_bytes: u64,
    /// Packets sent or received as incompressible.
    pub inc_packets: u64,
}

impl CompStats {
    /// Compression ratio (uncompressed / compressed) over compressed packets.
    pub fn ratio(&self) -> f64 {
        let compressed_in = self.unc_bytes.saturating_sub(self.inc_bytes);
        if self.comp_bytes == 0 {
            return 1.0;
        }
        compressed_in as f64 / self.comp_bytes as f64
    }
}

/// Failure modes of [`Decompressor::decompress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    /// The frame is unusable (e.g. out of sequence); a CCP reset recovers.
    Error,
    /// The dictionary is corrupt; full reinitialization is required.
    Fatal,
}

/// A compression method registered with a [`CompressorRegistry`].
pub trait CompressorBackend: Send + Sync {
    /// CCP option id (first byte of the option block).
    fn id(&self) -> u8;

    /// Human readable name for logs.
    fn name(&self) -> &'static str;

    /// Operations this backend implements.
    fn ops(&self) -> BackendOps {
        BackendOps::REQUIRED
    }

    /// Allocate transmit state for the given option block.
    ///
    /// Returns `None` if the options are unsupported or allocation fails.
    fn alloc_compressor(&self, options: &[u8]) -> Option<Box<dyn Compressor>>;

    /// Allocate receive state for the given option block.
    fn alloc_decompressor(&self, options: &[u8]) -> Option<Box<dyn Decompressor>>;
}

/// Transmit-side codec state.
pub trait Compressor: Send {
    /// (Re)initialize from the negotiated option block; `false` if it does not
    /// match this state.
    fn init(&mut self, options: &[u8], unit: u32, debug: bool) -> bool;

    /// Reset the dictionary after the peer requested it.
    fn reset(&mut self);

    /// Compress a frame that starts with its two-byte protocol field.
    ///
    /// Returns the body of a COMP frame, or `None` to send the frame as is.
    fn compress(&mut self, packet: &Packet) -> Option<Packet>;

    /// Counters for this direction.
    fn stats(&self) -> CompStats;
}

/// Receive-side codec state.
pub trait Decompressor: Send {
    /// (Re)initialize from the negotiated option block.
    fn init(&mut self, options: &[u8], unit: u32, mru: usize, debug: bool) -> bool;

    /// Reset the dictionary after a CCP ResetAck.
    fn reset(&mut self);

    /// Decompress the body of a COMP frame into a frame that starts with its
    /// two-byte protocol field.
    fn decompress(&mut self, packet: &Packet) -> std::result::Result<Packet, DecompressError>;

    /// Account for a frame the peer sent uncompressed (starts with its two-byte
    /// protocol field) so the dictionary stays in step.
    fn incompress(&mut self, packet: &Packet);

    /// Counters for this direction.
    fn stats(&self) -> CompStats;
}
