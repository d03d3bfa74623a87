//! Control commands and their replies.
//!
//! Commands are addressed to a handle; the handle's binding decides whether
//! the interface or the link operations apply:
//!
//! | Bound to  | Commands                                                  |
//! |-----------|-----------------------------------------------------------|
//! | Interface | flags, MRU, compressor, modes, VJ slots, stats, idle, unit |
//! | Link      | link flags, link MRU, escape map, connect, disconnect,    |
//! |           | channel, unit, driver-specific                            |

use crate::codec::Direction;
use crate::interface::{CompressionStats, IdleTimes, InterfaceFlags, InterfaceStats, NpMode};
use crate::link::{EscapeMap, LinkFlags, LinkId};

/// A control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoctlCmd {
    /// Read interface flags.
    GetFlags,
    /// Replace the settable interface flags.
    SetFlags(InterfaceFlags),
    /// Read interface MRU.
    GetMru,
    /// Set interface MRU.
    SetMru(u16),
    /// Install codec state from a CCP option block.
    SetCompressor {
        direction: Direction,
        options: Vec<u8>,
    },
    /// Read a protocol's mode.
    GetNpMode(u16),
    /// Set a protocol's mode.
    SetNpMode(u16, NpMode),
    /// Recreate VJ state with this many slots.
    SetMaxCid(u8),
    /// Interface counters.
    GetStats,
    /// Compression counters.
    GetCompStats,
    /// Idle times.
    GetIdle,
    /// Unit number of the interface (or the link's owner).
    GetUnit,

    /// Read link flags.
    GetLinkFlags,
    /// Replace link flags.
    SetLinkFlags(LinkFlags),
    /// Read link MRU.
    GetLinkMru,
    /// Set link MRU.
    SetLinkMru(u16),
    /// Read the transmit escape map.
    GetEscapeMap,
    /// Set the transmit escape map.
    SetEscapeMap(EscapeMap),
    /// Attach the link to an interface.
    Connect(u32),
    /// Detach the link from its interface.
    Disconnect,
    /// Link index.
    GetChannel,

    /// Command understood only by the link's driver.
    Driver { code: u32, data: Vec<u8> },
}

/// Reply to an [`IoctlCmd`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoctlReply {
    /// Command applied.
    Done,
    Flags(InterfaceFlags),
    LinkFlags(LinkFlags),
    Mru(u16),
    NpMode(NpMode),
    Stats(InterfaceStats),
    CompStats(CompressionStats),
    Idle(IdleTimes),
    Unit(u32),
    Channel(LinkId),
    EscapeMap(EscapeMap),
    /// Driver-specific reply data.
    Driver(Vec<u8>),
}
