//! Compression Control Protocol packet layout.
//!
//! ```text
//! ┌──────┬────────────┬──────────┬──────────────────────────────┐
//! │ Code │ Identifier │ Length   │ Options (id, len, params...) │
//! │ 1    │ 1          │ 2 BE     │ Length - 4                   │
//! └──────┴────────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! Only the fields the core needs for its bookkeeping are decoded here; option
//! negotiation itself belongs to the control-plane process.

use crate::error::{PppError, Result};

/// CCP header size.
pub const CCP_HDRLEN: usize = 4;

/// Minimum option block size (id + length).
pub const CCP_OPT_MINLEN: usize = 2;

/// CCP codes the core reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcpCode {
    ConfigRequest,
    ConfigAck,
    ConfigNak,
    ConfigReject,
    TermRequest,
    TermAck,
    CodeReject,
    ResetRequest,
    ResetAck,
    Other(u8),
}

impl From<u8> for CcpCode {
    fn from(code: u8) -> Self {
        match code {
            1 => CcpCode::ConfigRequest,
            2 => CcpCode::ConfigAck,
            3 => CcpCode::ConfigNak,
            4 => CcpCode::ConfigReject,
            5 => CcpCode::TermRequest,
            6 => CcpCode::TermAck,
            7 => CcpCode::CodeReject,
            14 => CcpCode::ResetRequest,
            15 => CcpCode::ResetAck,
            other => CcpCode::Other(other),
        }
    }
}

impl From<CcpCode> for u8 {
    fn from(code: CcpCode) -> Self {
        match code {
            CcpCode::ConfigRequest => 1,
            CcpCode::ConfigAck => 2,
            CcpCode::ConfigNak => 3,
            CcpCode::ConfigReject => 4,
            CcpCode::TermRequest => 5,
            CcpCode::TermAck => 6,
            CcpCode::CodeReject => 7,
            CcpCode::ResetRequest => 14,
            CcpCode::ResetAck => 15,
            CcpCode::Other(other) => other,
        }
    }
}

/// Decoded CCP header with a borrowed view of the options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcpPacket<'a> {
    /// Packet code.
    pub code: CcpCode,
    /// Identifier byte.
    pub identifier: u8,
    /// Options, clamped to the declared length.
    pub options: &'a [u8],
}

impl<'a> CcpPacket<'a> {
    /// Decode a CCP payload (protocol field already removed).
    ///
    /// Returns `None` if the payload is shorter than the header or the declared
    /// length is smaller than the header.
    pub fn decode(payload: &'a [u8]) -> Option<Self> {
        if payload.len() < CCP_HDRLEN {
            return None;
        }
        let declared = u16::from_be_bytes([payload[2], payload[3]]) as usize;
        if declared < CCP_HDRLEN {
            return None;
        }
        let end = declared.min(payload.len());
        Some(Self {
            code: CcpCode::from(payload[0]),
            identifier: payload[1],
            options: &payload[CCP_HDRLEN..end],
        })
    }

    /// Check that the first option is complete.
    ///
    /// A ConfigAck is only acted upon when this holds.
    pub fn has_complete_option(&self) -> bool {
        self.options.len() >= CCP_OPT_MINLEN && self.options.len() >= self.options[1] as usize
    }
}

/// A compression option block: backend id, length, parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionBlock<'a> {
    /// Backend id (first byte).
    pub id: u8,
    /// The whole block, clamped to its declared length.
    pub bytes: &'a [u8],
}

impl<'a> OptionBlock<'a> {
    /// Parse and validate an option block.
    pub fn parse(block: &'a [u8]) -> Result<Self> {
        if block.len() < CCP_OPT_MINLEN {
            return Err(PppError::InvalidArgument(format!(
                "Option block of {} bytes is shorter than {}",
                block.len(),
                CCP_OPT_MINLEN
            )));
        }
        let declared = block[1] as usize;
        if declared < CCP_OPT_MINLEN || declared > block.len() {
            return Err(PppError::InvalidArgument(format!(
                "Option length {} does not fit block of {} bytes",
                declared,
                block.len()
            )));
        }
        Ok(Self {
            id: block[0],
            bytes: &block[..declared],
        })
    }
}
