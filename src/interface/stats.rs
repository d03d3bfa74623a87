//! Interface counters and idle times.

use std::time::Duration;

use serde::Serialize;

use crate::codec::CompStats;

/// Per-interface traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceStats {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Malformed frames, decompression and VJ failures.
    pub rx_errors: u64,
    /// Frames discarded by mode or by a full client queue.
    pub rx_dropped: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    /// Sends refused because the output queue was full.
    pub tx_errors: u64,
    /// Frames discarded by mode or for lack of a link.
    pub tx_dropped: u64,
}

/// Compression counters for both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompressionStats {
    pub transmit: CompStats,
    pub receive: CompStats,
}

/// Time since the interface last sent and received a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdleTimes {
    pub xmit_idle: Duration,
    pub recv_idle: Duration,
}
