//! Error types for pppmux.

use thiserror::Error;

/// Main error type for all interface, link and control-plane operations.
#[derive(Debug, Error)]
pub enum PppError {
    /// Allocation failed or a bounded resource (unit space, queue) is full.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Unknown unit, link, handle or compressor id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate registration or attachment.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Operation on an unbound, already-bound or already-detached object.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed option block, protocol number or command argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport does not offer the requested capability.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A compressed frame could not be decoded.
    ///
    /// `fatal` failures require the decompressor to be reinitialized through a
    /// CCP ConfigAck before compressed frames are accepted again.
    #[error("Decompression failure (fatal: {fatal})")]
    Decompression { fatal: bool },

    /// The transport queue is full; the frame is held and retried on drain.
    #[error("Transport rejected frame")]
    TransportRejected,

    /// The protocol's mode is ERROR.
    #[error("Protocol {0:#06x} is disabled on this interface")]
    ProtocolDisabled(u16),

    /// I/O error in a stream transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration or building reports.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using PppError.
pub type Result<T> = std::result::Result<T, PppError>;
