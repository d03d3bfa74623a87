//! Transport module - reference link driver over async byte streams.
//!
//! Provides:
//! - HDLC-like octet stuffing and FCS-16 (`hdlc`)
//! - A [`Link`](crate::link::Link) driver spawning reader/writer tasks over
//!   any `AsyncRead + AsyncWrite` stream (`stream`)

pub mod hdlc;
mod stream;

pub use hdlc::{encode_frame, fcs16, Decoded, HdlcDecoder};
pub use stream::{
    spawn_stream_link, StreamConfig, StreamTasks, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_FRAME,
    DEFAULT_READ_BUFFER,
};
