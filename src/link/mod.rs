//! Link module - the capability every transport driver implements.
//!
//! A driver registers a boxed [`Link`] with the [`Registry`](crate::Registry)
//! and receives a [`LinkId`]. The core keeps the per-link state it layers on
//! top of every driver (owning interface, negotiated flags, MRU, escape map,
//! pending control frames) and calls into the driver only to hand it a framed
//! packet or a driver-specific control command.
//!
//! ```text
//!   Interface ──► framing::frame_outbound ──► Link::send ──► wire
//!   wire ──► Registry::link_input ──► framing::deframe_inbound ──► Interface
//! ```
//!
//! Driver callbacks run while the registry lock is held; a driver must not call
//! back into the registry from inside them. Completion of a rejected send is
//! reported later through [`Registry::link_drained`](crate::Registry::link_drained).

pub mod framing;

use std::collections::VecDeque;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::control::{IoctlCmd, IoctlReply};
use crate::error::{PppError, Result};
use crate::interface::ClientQueue;
use crate::packet::Packet;

pub use framing::{deframe_inbound, frame_outbound};

/// Registry-assigned link index.
pub type LinkId = u32;

bitflags! {
    /// What the transport itself provides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LinkCaps: u8 {
        /// The transport never carries the `FF 03` address/control prefix.
        const ELIDES_AC = 0x01;
        /// The transport has a priority queue for link-control frames.
        const OOB_QUEUE = 0x02;
        /// The transport performs async control-character escaping.
        const ASYNC_ESCAPE = 0x04;
    }
}

bitflags! {
    /// Flags negotiated for the link by the control plane.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LinkFlags: u32 {
        /// Protocol-field compression is in use on transmit.
        const COMP_PROT = 0x0000_0001;
        /// Address/control-field compression is in use on transmit.
        const COMP_AC = 0x0000_0002;
        /// Drop received frames that lack the address/control prefix.
        const REJ_COMP_AC = 0x0000_0010;
    }
}

/// Result of handing a frame to a driver.
#[derive(Debug)]
pub enum SendOutcome {
    /// The driver took ownership of the frame.
    Sent,
    /// The transport queue is full; the frame is handed back unchanged.
    Rejected(Packet),
    /// The transport is gone; the frame was discarded.
    Dropped,
}

/// Per-octet transmit escape map for async transports.
///
/// Bit `b & 7` of byte `b >> 3` is set when octet `b` must be escaped.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EscapeMap([u8; 32]);

impl EscapeMap {
    /// Size of the map on the wire.
    pub const LEN: usize = 32;

    /// Map with no octet escaped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map built from raw bytes.
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Map escaping the control characters selected by `accm` plus the flag
    /// and escape octets.
    pub fn with_accm(accm: u32) -> Self {
        let mut map = Self::new();
        map.0[..4].copy_from_slice(&accm.to_le_bytes());
        map.set(0x7D);
        map.set(0x7E);
        map
    }

    /// Check whether an octet is escaped.
    #[inline]
    pub fn is_escaped(&self, octet: u8) -> bool {
        self.0[(octet >> 3) as usize] & (1 << (octet & 7)) != 0
    }

    /// Mark an octet as escaped.
    #[inline]
    pub fn set(&mut self, octet: u8) {
        self.0[(octet >> 3) as usize] |= 1 << (octet & 7);
    }

    /// Raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Debug for EscapeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escaped: Vec<u8> = (0..=255u8).filter(|b| self.is_escaped(*b)).collect();
        f.debug_tuple("EscapeMap").field(&escaped).finish()
    }
}

/// Transport driver capability.
pub trait Link: Send {
    /// Capabilities of the transport; read once at registration.
    fn caps(&self) -> LinkCaps;

    /// Hand a fully framed packet to the transport.
    ///
    /// `priority` asks for the out-of-band queue and is only set when the
    /// driver declared [`LinkCaps::OOB_QUEUE`].
    fn send(&mut self, frame: Packet, priority: bool) -> SendOutcome;

    /// Driver-specific control. `None` means the command is not handled here
    /// and falls back to the common link operations.
    fn ioctl(&mut self, _cmd: &IoctlCmd) -> Option<Result<IoctlReply>> {
        None
    }

    /// A new escape map was configured.
    fn set_escape_map(&mut self, _map: &EscapeMap) {}

    /// The owning interface's stalled output queue has emptied.
    fn queue_drained(&mut self) {}
}

/// Core-side state of a registered link.
pub(crate) struct LinkEntry {
    pub(crate) id: LinkId,
    pub(crate) driver: Box<dyn Link>,
    pub(crate) caps: LinkCaps,
    pub(crate) unit: Option<u32>,
    pub(crate) flags: LinkFlags,
    pub(crate) mru: u16,
    pub(crate) escape: EscapeMap,
    /// Frames written by the link's own control-plane client.
    pub(crate) tx_queue: VecDeque<Packet>,
    /// Frames for the link's control-plane client.
    pub(crate) rx_queue: ClientQueue,
    pub(crate) tx_queue_len: usize,
}

impl LinkEntry {
    pub(crate) fn new(
        id: LinkId,
        driver: Box<dyn Link>,
        mru: u16,
        tx_queue_len: usize,
        rx_queue_len: usize,
    ) -> Self {
        let caps = driver.caps();
        let escape = if caps.contains(LinkCaps::ASYNC_ESCAPE) {
            EscapeMap::with_accm(u32::MAX)
        } else {
            EscapeMap::new()
        };
        Self {
            id,
            driver,
            caps,
            unit: None,
            flags: LinkFlags::empty(),
            mru,
            escape,
            tx_queue: VecDeque::new(),
            rx_queue: ClientQueue::new(rx_queue_len),
            tx_queue_len,
        }
    }

    /// Frame and send one packet that starts with its two-byte protocol.
    ///
    /// On rejection the unframed packet is handed back.
    pub(crate) fn transmit(&mut self, frame: Packet) -> SendOutcome {
        let (framed, priority) = frame_outbound(frame.clone(), self.flags, self.caps);
        match self.driver.send(framed, priority) {
            SendOutcome::Sent => SendOutcome::Sent,
            SendOutcome::Dropped => SendOutcome::Dropped,
            SendOutcome::Rejected(_) => {
                tracing::debug!("link{}: {}", self.id, PppError::TransportRejected);
                SendOutcome::Rejected(frame)
            }
        }
    }

    /// Queue a frame from the link's own client.
    pub(crate) fn enqueue(&mut self, frame: Packet) -> Result<()> {
        if self.tx_queue.len() >= self.tx_queue_len {
            return Err(PppError::ResourceExhausted(format!(
                "link{} transmit queue is full",
                self.id
            )));
        }
        self.tx_queue.push_back(frame);
        Ok(())
    }

    /// Send queued link-level frames; returns `true` once the queue is empty.
    pub(crate) fn push_own(&mut self) -> bool {
        while let Some(frame) = self.tx_queue.pop_front() {
            if let SendOutcome::Rejected(frame) = self.transmit(frame) {
                self.tx_queue.push_front(frame);
                return false;
            }
        }
        true
    }

    /// Operations every link supports, after the driver declined `cmd`.
    pub(crate) fn common_ioctl(&mut self, cmd: &IoctlCmd) -> Result<IoctlReply> {
        match cmd {
            IoctlCmd::GetLinkFlags => Ok(IoctlReply::LinkFlags(self.flags)),
            IoctlCmd::SetLinkFlags(flags) => {
                self.flags = *flags & LinkFlags::all();
                Ok(IoctlReply::Done)
            }
            IoctlCmd::GetLinkMru => Ok(IoctlReply::Mru(self.mru)),
            IoctlCmd::SetLinkMru(mru) => {
                self.mru = *mru;
                Ok(IoctlReply::Done)
            }
            IoctlCmd::GetEscapeMap | IoctlCmd::SetEscapeMap(_)
                if !self.caps.contains(LinkCaps::ASYNC_ESCAPE) =>
            {
                Err(PppError::NotSupported(format!(
                    "link{} does not escape octets",
                    self.id
                )))
            }
            IoctlCmd::GetEscapeMap => Ok(IoctlReply::EscapeMap(self.escape)),
            IoctlCmd::SetEscapeMap(map) => {
                self.escape = *map;
                self.driver.set_escape_map(map);
                Ok(IoctlReply::Done)
            }
            IoctlCmd::GetChannel => Ok(IoctlReply::Channel(self.id)),
            IoctlCmd::GetUnit => self.unit.map(IoctlReply::Unit).ok_or_else(|| {
                PppError::InvalidState(format!("link{} is not connected", self.id))
            }),
            other => Err(PppError::NotSupported(format!(
                "{:?} is not a link operation",
                other
            ))),
        }
    }
}

impl fmt::Debug for LinkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkEntry")
            .field("id", &self.id)
            .field("caps", &self.caps)
            .field("unit", &self.unit)
            .field("flags", &self.flags)
            .field("mru", &self.mru)
            .field("tx_queue", &self.tx_queue.len())
            .finish()
    }
}
