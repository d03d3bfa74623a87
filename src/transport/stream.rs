//! Link driver over an async byte stream.
//!
//! The registry calls [`Link::send`] with its lock held, so the driver never
//! waits: frames are HDLC-encoded and handed to a writer task through a
//! bounded channel. A full channel rejects the frame; once the writer has made
//! room it raises the drained event so the registry retransmits.
//!
//! ```text
//!  Registry ─ send ─► StreamLink ─► mpsc ─► writer task ─► stream
//!     ▲                                          │
//!     └──────────── link_drained ────────────────┘
//!
//!  stream ─► reader task ─► HdlcDecoder ─► Registry::link_input / link_error
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::link::{EscapeMap, Link, LinkCaps, LinkId, SendOutcome};
use crate::packet::Packet;
use crate::registry::Registry;

use super::hdlc::{encode_frame, Decoded, HdlcDecoder};

/// Default number of encoded frames the writer channel holds.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default largest unstuffed frame the decoder accepts, FCS included.
pub const DEFAULT_MAX_FRAME: usize = 0x10000;

/// Default read buffer size.
pub const DEFAULT_READ_BUFFER: usize = 4096;

/// Configuration for a stream link.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub channel_capacity: usize,
    pub max_frame: usize,
    pub read_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame: DEFAULT_MAX_FRAME,
            read_buffer: DEFAULT_READ_BUFFER,
        }
    }
}

/// The [`Link`] registered with the registry.
struct StreamLink {
    tx: mpsc::Sender<Bytes>,
    escape: EscapeMap,
    /// Set when a frame was rejected; the writer clears it and reports drained.
    blocked: Arc<AtomicBool>,
}

impl Link for StreamLink {
    fn caps(&self) -> LinkCaps {
        LinkCaps::ASYNC_ESCAPE
    }

    fn send(&mut self, frame: Packet, _priority: bool) -> SendOutcome {
        let encoded = encode_frame(&frame, &self.escape);
        // Flag first: the writer may free a slot before we return.
        self.blocked.store(true, Ordering::Release);
        match self.tx.try_send(encoded) {
            Ok(()) => {
                self.blocked.store(false, Ordering::Release);
                SendOutcome::Sent
            }
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Rejected(frame),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.blocked.store(false, Ordering::Release);
                tracing::warn!("Stream writer closed, dropping frame");
                SendOutcome::Dropped
            }
        }
    }

    fn set_escape_map(&mut self, map: &EscapeMap) {
        self.escape = *map;
    }
}

/// Tasks driving one stream link.
#[derive(Debug)]
pub struct StreamTasks {
    pub link: LinkId,
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

impl StreamTasks {
    /// Stop both tasks without unregistering the link.
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Register a link carried over `stream` and spawn its reader and writer.
///
/// The link is unregistered when the stream reaches end of file or fails.
/// Must be called from within a tokio runtime.
pub fn spawn_stream_link<S>(registry: Arc<Registry>, stream: S, config: StreamConfig) -> StreamTasks
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let blocked = Arc::new(AtomicBool::new(false));
    let link = registry.register_link(Box::new(StreamLink {
        tx,
        escape: EscapeMap::with_accm(u32::MAX),
        blocked: blocked.clone(),
    }));

    let (read_half, write_half) = tokio::io::split(stream);
    let writer = tokio::spawn(writer_loop(registry.clone(), link, rx, write_half, blocked));
    let reader = tokio::spawn(reader_loop(registry, link, read_half, config));

    StreamTasks {
        link,
        reader,
        writer,
    }
}

async fn writer_loop<W>(
    registry: Arc<Registry>,
    link: LinkId,
    mut rx: mpsc::Receiver<Bytes>,
    mut writer: W,
    blocked: Arc<AtomicBool>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(encoded) = rx.recv().await {
        if blocked.swap(false, Ordering::AcqRel) {
            registry.link_drained(link);
        }
        if let Err(e) = writer.write_all(&encoded).await {
            tracing::warn!("link{}: write failed: {}", link, e);
            break;
        }
        if rx.is_empty() {
            if let Err(e) = writer.flush().await {
                tracing::warn!("link{}: flush failed: {}", link, e);
                break;
            }
        }
    }
    tracing::debug!("link{}: writer stopped", link);
}

async fn reader_loop<R>(registry: Arc<Registry>, link: LinkId, mut reader: R, config: StreamConfig)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = HdlcDecoder::new(config.max_frame);
    let mut buf = vec![0u8; config.read_buffer.max(1)];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("link{}: end of stream", link);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("link{}: read failed: {}", link, e);
                break;
            }
        };

        for result in decoder.push(&buf[..n]) {
            match result {
                Decoded::Frame(frame) => registry.link_input(link, frame),
                other => {
                    tracing::debug!("link{}: input error {:?}", link, other);
                    registry.link_error(link);
                }
            }
        }
    }

    if let Err(e) = registry.unregister_link(link) {
        tracing::debug!("link{}: {}", link, e);
    }
}
