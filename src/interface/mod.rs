//! Interface module - the multiplexer between protocol consumers and links.
//!
//! An interface presents one or more links as a single point-to-point
//! endpoint:
//!
//! ```text
//!   consumers (IP, IPv6, ...)        control-plane client
//!            │ send ▲ deliver              │ ▲
//!            ▼      │                      ▼ │
//!   ┌───────────────────────────────────────────────────┐
//!   │ mode table │ VJ │ CCP peek │ compressor │ queue   │
//!   └───────────────────────────────────────────────────┘
//!            │ round robin          ▲ link_input
//!            ▼                      │
//!         link 0   link 1   ...  link N
//! ```
//!
//! Every method here runs with the registry lock held. Frames for protocol
//! consumers are returned as [`Delivery`] values and dispatched by the
//! registry after the lock is released.

mod mode;
mod queue;
mod stats;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::codec::{
    Compressor, CompressorBackend, CompressorRegistry, DecompressError, Decompressor, Direction,
};
use crate::config::RegistryConfig;
use crate::control::{IoctlCmd, IoctlReply};
use crate::error::{PppError, Result};
use crate::link::{LinkEntry, LinkId, SendOutcome};
use crate::packet::Packet;
use crate::protocol::{
    is_link_protocol, is_valid_protocol, proto, push_protocol, take_protocol, CcpCode, CcpPacket,
    OptionBlock,
};
use crate::vj::{is_tcp_ipv4, VjCodec, VjFactory};

pub use mode::{ModeTable, NpMode};
pub(crate) use queue::{ClientQueue, OutputQueue};
pub use stats::{CompressionStats, IdleTimes, InterfaceStats};

/// Registered links by id.
pub(crate) type LinkTable = BTreeMap<LinkId, LinkEntry>;

bitflags! {
    /// Interface flags.
    ///
    /// Only [`InterfaceFlags::SETTABLE`] bits can be changed through
    /// `SetFlags`; the running and error bits are driven by CCP traffic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct InterfaceFlags: u32 {
        /// VJ-compress outgoing TCP.
        const COMP_TCP = 0x0000_0004;
        /// Send the VJ connection id on every packet.
        const NO_TCP_CCID = 0x0000_0008;
        /// Treat incoming VJ frames as errors.
        const REJ_COMP_TCP = 0x0000_0020;
        /// CCP negotiation is in progress or done.
        const CCP_OPEN = 0x0000_0040;
        /// CCP negotiation finished.
        const CCP_UP = 0x0000_0080;
        /// Transmit compressor is running.
        const COMP_RUN = 0x0000_1000;
        /// Receive decompressor is running.
        const DECOMP_RUN = 0x0000_2000;
        /// Pass debug to codec state.
        const DEBUG = 0x0001_0000;
        /// Decompression failed; waiting for a CCP reset.
        const DC_ERROR = 0x0040_0000;
        /// Decompression failed fatally; waiting for reinitialization.
        const DC_FERROR = 0x0080_0000;

        const SETTABLE = Self::CCP_OPEN.bits()
            | Self::CCP_UP.bits()
            | Self::COMP_TCP.bits()
            | Self::NO_TCP_CCID.bits()
            | Self::REJ_COMP_TCP.bits()
            | Self::DEBUG.bits();
    }
}

/// A network-protocol consumer attached to an interface.
pub trait ProtocolConsumer: Send + Sync {
    /// A frame for `protocol` arrived on interface `unit`; the discriminator
    /// has been removed.
    fn input(&self, unit: u32, protocol: u16, packet: Packet);
}

/// A frame waiting to be handed to a consumer outside the registry lock.
pub(crate) struct Delivery {
    consumer: Arc<dyn ProtocolConsumer>,
    unit: u32,
    protocol: u16,
    packet: Packet,
}

impl Delivery {
    pub(crate) fn dispatch(self) {
        self.consumer.input(self.unit, self.protocol, self.packet);
    }
}

/// Installed codec state together with the backend that allocated it.
struct CodecSlot<C: ?Sized> {
    backend: Arc<dyn CompressorBackend>,
    state: Box<C>,
}

/// One logical PPP endpoint.
pub(crate) struct Interface {
    unit: u32,
    pub(crate) clients: usize,
    links: Vec<LinkId>,
    cursor: usize,
    modes: ModeTable,
    flags: InterfaceFlags,
    mru: u16,
    xcomp: Option<CodecSlot<dyn Compressor>>,
    rcomp: Option<CodecSlot<dyn Decompressor>>,
    vj: Option<Box<dyn VjCodec>>,
    queue: OutputQueue,
    pub(crate) rx_queue: ClientQueue,
    consumers: BTreeMap<u16, Arc<dyn ProtocolConsumer>>,
    stats: InterfaceStats,
    last_xmit: Instant,
    last_recv: Instant,
}

impl Interface {
    pub(crate) fn new(unit: u32, config: &RegistryConfig, vj: Option<Box<dyn VjCodec>>) -> Self {
        let now = Instant::now();
        let flags = if config.debug {
            InterfaceFlags::DEBUG
        } else {
            InterfaceFlags::empty()
        };
        Self {
            unit,
            clients: 1,
            links: Vec::new(),
            cursor: 0,
            modes: ModeTable::new(),
            flags,
            mru: config.default_mru,
            xcomp: None,
            rcomp: None,
            vj,
            queue: OutputQueue::new(config.output_queue_len),
            rx_queue: ClientQueue::new(config.client_queue_len),
            consumers: BTreeMap::new(),
            stats: InterfaceStats::default(),
            last_xmit: now,
            last_recv: now,
        }
    }

    #[inline]
    pub(crate) fn unit(&self) -> u32 {
        self.unit
    }

    #[inline]
    pub(crate) fn flags(&self) -> InterfaceFlags {
        self.flags
    }

    #[inline]
    pub(crate) fn mru(&self) -> u16 {
        self.mru
    }

    #[inline]
    pub(crate) fn stats(&self) -> InterfaceStats {
        self.stats
    }

    pub(crate) fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn mode(&self, protocol: u16) -> NpMode {
        self.modes.get(protocol)
    }

    /// Names of the installed backends, transmit then receive.
    pub(crate) fn compressor_names(&self) -> (Option<&'static str>, Option<&'static str>) {
        (
            self.xcomp.as_ref().map(|slot| slot.backend.name()),
            self.rcomp.as_ref().map(|slot| slot.backend.name()),
        )
    }

    pub(crate) fn comp_stats(&self) -> CompressionStats {
        CompressionStats {
            transmit: self
                .xcomp
                .as_ref()
                .map(|slot| slot.state.stats())
                .unwrap_or_default(),
            receive: self
                .rcomp
                .as_ref()
                .map(|slot| slot.state.stats())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn idle(&self) -> IdleTimes {
        IdleTimes {
            xmit_idle: self.last_xmit.elapsed(),
            recv_idle: self.last_recv.elapsed(),
        }
    }

    // ------------------------------------------------------------------
    // Consumers and links
    // ------------------------------------------------------------------

    pub(crate) fn attach_consumer(
        &mut self,
        protocol: u16,
        consumer: Arc<dyn ProtocolConsumer>,
    ) -> Result<()> {
        if !is_valid_protocol(protocol) || is_link_protocol(protocol) {
            return Err(PppError::InvalidArgument(format!(
                "{:#06x} cannot have a network-protocol consumer",
                protocol
            )));
        }
        if self.consumers.contains_key(&protocol) {
            return Err(PppError::AlreadyExists(format!(
                "Protocol {:#06x} on ppp{}",
                protocol, self.unit
            )));
        }
        self.consumers.insert(protocol, consumer);
        Ok(())
    }

    pub(crate) fn detach_consumer(&mut self, protocol: u16) -> bool {
        self.consumers.remove(&protocol).is_some()
    }

    pub(crate) fn attach_link(&mut self, link: LinkId) {
        self.links.push(link);
        tracing::debug!("ppp{}: link{} attached", self.unit, link);
    }

    pub(crate) fn detach_link(&mut self, link: LinkId, links: &mut LinkTable) {
        if let Some(pos) = self.links.iter().position(|id| *id == link) {
            self.links.remove(pos);
            if self.cursor > pos {
                self.cursor -= 1;
            }
            tracing::debug!("ppp{}: link{} detached", self.unit, link);
        }
        if self.queue.stalled_on() == Some(link) {
            self.queue.unstall();
            self.push(links);
        }
    }

    // ------------------------------------------------------------------
    // Transmit
    // ------------------------------------------------------------------

    /// Send a consumer's packet for a network protocol.
    pub(crate) fn send(&mut self, protocol: u16, payload: Packet, links: &mut LinkTable) -> Result<()> {
        if !is_valid_protocol(protocol) || is_link_protocol(protocol) {
            return Err(PppError::InvalidArgument(format!(
                "{:#06x} is not a network protocol",
                protocol
            )));
        }
        match self.modes.get(protocol) {
            NpMode::Pass => self.transmit(protocol, payload, links),
            NpMode::Error => Err(PppError::ProtocolDisabled(protocol)),
            NpMode::Drop => {
                self.stats.tx_dropped += 1;
                Ok(())
            }
            NpMode::Queue => {
                self.stats.tx_dropped += 1;
                tracing::debug!(
                    "ppp{}: protocol {:#06x} is queued; discarding frame",
                    self.unit,
                    protocol
                );
                Ok(())
            }
        }
    }

    /// Send a frame written by the control-plane client. The frame starts
    /// with its protocol field; modes do not apply.
    pub(crate) fn send_control(&mut self, mut frame: Packet, links: &mut LinkTable) -> Result<()> {
        let protocol = take_protocol(&mut frame)?;
        self.transmit(protocol, frame, links)
    }

    fn transmit(&mut self, protocol: u16, payload: Packet, links: &mut LinkTable) -> Result<()> {
        // Checked before compression so a refused frame never advances the
        // compressor's sequence.
        if self.queue.is_full() {
            return Err(self.queue_full());
        }
        let frame = self.prepare(protocol, payload);
        self.queue.push_back(frame).map_err(|_| self.queue_full())?;
        self.push(links);
        Ok(())
    }

    fn queue_full(&mut self) -> PppError {
        self.stats.tx_errors += 1;
        tracing::debug!("ppp{}: output queue full", self.unit);
        PppError::ResourceExhausted(format!("ppp{} output queue is full", self.unit))
    }

    /// Apply VJ, CCP bookkeeping and compression; returns the frame with its
    /// two-byte protocol field.
    fn prepare(&mut self, mut protocol: u16, mut payload: Packet) -> Packet {
        if protocol == proto::IP
            && self.flags.contains(InterfaceFlags::COMP_TCP)
            && is_tcp_ipv4(&payload)
        {
            let compress_cid = !self.flags.contains(InterfaceFlags::NO_TCP_CCID);
            if let Some(vj) = self.vj.as_mut() {
                (protocol, payload) = vj.compress_tcp(payload, compress_cid);
            }
        }

        if protocol == proto::CCP {
            self.control_ccp(&payload, false);
        }

        let mut frame = payload;
        push_protocol(&mut frame, protocol);

        if self.flags.contains(InterfaceFlags::COMP_RUN)
            && protocol != proto::CCP
            && !is_link_protocol(protocol)
        {
            if let Some(slot) = self.xcomp.as_mut() {
                if let Some(mut body) = slot.state.compress(&frame) {
                    push_protocol(&mut body, proto::COMP);
                    return body;
                }
            }
        }
        frame
    }

    /// Hand queued frames to links, round robin, until the queue empties or a
    /// link rejects.
    pub(crate) fn push(&mut self, links: &mut LinkTable) {
        if self.queue.stalled_on().is_some() {
            return;
        }
        while let Some(frame) = self.queue.pop_front() {
            if self.links.is_empty() {
                self.stats.tx_dropped += 1;
                tracing::debug!("ppp{}: no link attached, dropping frame", self.unit);
                continue;
            }
            let index = self.cursor % self.links.len();
            let id = self.links[index];
            let Some(link) = links.get_mut(&id) else {
                self.stats.tx_dropped += 1;
                continue;
            };

            let len = frame.len() as u64;
            let outcome = if link.push_own() {
                link.transmit(frame)
            } else {
                SendOutcome::Rejected(frame)
            };
            match outcome {
                SendOutcome::Sent => {
                    self.cursor = index + 1;
                    self.stats.tx_packets += 1;
                    self.stats.tx_bytes += len;
                    self.last_xmit = Instant::now();
                }
                SendOutcome::Dropped => {
                    self.cursor = index + 1;
                    self.stats.tx_dropped += 1;
                    tracing::debug!("ppp{}: link{} dropped frame", self.unit, id);
                }
                SendOutcome::Rejected(frame) => {
                    self.cursor = index;
                    self.queue.hold(frame, id);
                    return;
                }
            }
        }
    }

    /// A link reported that its transport queue drained.
    pub(crate) fn link_drained(&mut self, link: LinkId, links: &mut LinkTable) {
        if self.queue.stalled_on() != Some(link) {
            return;
        }
        self.queue.unstall();
        self.push(links);
        if self.queue.stalled_on().is_none() {
            tracing::debug!("ppp{}: output queue drained", self.unit);
            for id in &self.links {
                if let Some(entry) = links.get_mut(id) {
                    entry.driver.queue_drained();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Receive
    // ------------------------------------------------------------------

    /// Process a received frame whose discriminator has been decoded.
    pub(crate) fn deliver(&mut self, protocol: u16, payload: Packet) -> Option<Delivery> {
        self.stats.rx_packets += 1;
        self.stats.rx_bytes += payload.len() as u64;
        self.last_recv = Instant::now();

        let (protocol, payload) = self.decompress_stage(protocol, payload)?;
        let (protocol, payload) = self.vj_stage(protocol, payload)?;

        if protocol == proto::CCP {
            self.control_ccp(&payload, true);
        }

        if !is_link_protocol(protocol) {
            if let Some(consumer) = self.consumers.get(&protocol) {
                if self.modes.get(protocol) != NpMode::Pass {
                    self.stats.rx_dropped += 1;
                    return None;
                }
                return Some(Delivery {
                    consumer: consumer.clone(),
                    unit: self.unit,
                    protocol,
                    packet: payload,
                });
            }
        }

        self.queue_for_client(protocol, payload);
        None
    }

    fn decompress_stage(&mut self, protocol: u16, payload: Packet) -> Option<(u16, Packet)> {
        let running = self.flags.contains(InterfaceFlags::DECOMP_RUN)
            && !self
                .flags
                .intersects(InterfaceFlags::DC_ERROR | InterfaceFlags::DC_FERROR);

        if protocol != proto::COMP {
            if running {
                if let Some(slot) = self.rcomp.as_mut() {
                    let mut frame = payload.clone();
                    push_protocol(&mut frame, protocol);
                    slot.state.incompress(&frame);
                }
            }
            return Some((protocol, payload));
        }

        let result = match self.rcomp.as_mut() {
            Some(slot) if running => slot.state.decompress(&payload),
            _ => {
                self.stats.rx_dropped += 1;
                tracing::debug!(
                    "ppp{}: compressed frame while decompressor is not running",
                    self.unit
                );
                return None;
            }
        };

        match result {
            Ok(mut frame) => match take_protocol(&mut frame) {
                Ok(inner) => Some((inner, frame)),
                Err(_) => {
                    self.stats.rx_errors += 1;
                    None
                }
            },
            Err(e) => {
                self.flags.insert(InterfaceFlags::DC_ERROR);
                if e == DecompressError::Fatal {
                    self.flags.insert(InterfaceFlags::DC_FERROR);
                }
                self.stats.rx_errors += 1;
                tracing::warn!(
                    "ppp{}: {}",
                    self.unit,
                    PppError::Decompression {
                        fatal: e == DecompressError::Fatal
                    }
                );
                None
            }
        }
    }

    fn vj_stage(&mut self, protocol: u16, payload: Packet) -> Option<(u16, Packet)> {
        if protocol != proto::VJC_COMP && protocol != proto::VJC_UNCOMP {
            return Some((protocol, payload));
        }
        let rejected = self.flags.contains(InterfaceFlags::REJ_COMP_TCP);
        let expanded = match self.vj.as_mut() {
            Some(vj) if !rejected => {
                let expanded = vj.uncompress(protocol, payload);
                if expanded.is_none() {
                    vj.toss();
                }
                expanded
            }
            _ => None,
        };
        if expanded.is_none() {
            self.stats.rx_errors += 1;
            tracing::debug!("ppp{}: VJ frame {:#06x} dropped", self.unit, protocol);
        }
        expanded.map(|datagram| (proto::IP, datagram))
    }

    /// Queue a frame for the control-plane client with its discriminator.
    pub(crate) fn queue_for_client(&mut self, protocol: u16, mut payload: Packet) {
        push_protocol(&mut payload, protocol);
        if self.rx_queue.push(payload) {
            self.stats.rx_dropped += 1;
            tracing::debug!("ppp{}: client queue full, dropped oldest frame", self.unit);
        }
    }

    /// Input error reported by a link.
    pub(crate) fn error(&mut self) {
        self.stats.rx_errors += 1;
        if let Some(vj) = self.vj.as_mut() {
            vj.toss();
        }
        self.flags.insert(InterfaceFlags::DC_ERROR);
    }

    // ------------------------------------------------------------------
    // CCP
    // ------------------------------------------------------------------

    /// Track CCP packets crossing the interface. `payload` excludes the
    /// protocol field.
    pub(crate) fn control_ccp(&mut self, payload: &Packet, received: bool) {
        let bytes = payload.to_vec();
        let Some(ccp) = CcpPacket::decode(&bytes) else {
            return;
        };
        // A ConfigRequest carries what its sender wants to receive.
        let requested_dir = if received {
            InterfaceFlags::COMP_RUN
        } else {
            InterfaceFlags::DECOMP_RUN
        };

        match ccp.code {
            CcpCode::ConfigRequest | CcpCode::TermRequest => self.flags.remove(requested_dir),
            CcpCode::TermAck => self
                .flags
                .remove(InterfaceFlags::COMP_RUN | InterfaceFlags::DECOMP_RUN),
            CcpCode::ConfigAck => {
                let open_up = self.flags & (InterfaceFlags::CCP_OPEN | InterfaceFlags::CCP_UP);
                if open_up != InterfaceFlags::CCP_OPEN || !ccp.has_complete_option() {
                    return;
                }
                let debug = self.flags.contains(InterfaceFlags::DEBUG);
                if received {
                    let Some(slot) = self.rcomp.as_mut() else {
                        return;
                    };
                    if slot
                        .state
                        .init(ccp.options, self.unit, self.mru as usize, debug)
                    {
                        self.flags.insert(InterfaceFlags::DECOMP_RUN);
                        self.flags
                            .remove(InterfaceFlags::DC_ERROR | InterfaceFlags::DC_FERROR);
                        tracing::debug!("ppp{}: decompressor running", self.unit);
                    }
                } else {
                    let Some(slot) = self.xcomp.as_mut() else {
                        return;
                    };
                    if slot.state.init(ccp.options, self.unit, debug) {
                        self.flags.insert(InterfaceFlags::COMP_RUN);
                        tracing::debug!("ppp{}: compressor running", self.unit);
                    }
                }
            }
            CcpCode::ResetAck => {
                if !self.flags.contains(InterfaceFlags::CCP_UP) {
                    return;
                }
                if received {
                    if let Some(slot) = self.rcomp.as_mut() {
                        if self.flags.contains(InterfaceFlags::DECOMP_RUN) {
                            slot.state.reset();
                            self.flags.remove(InterfaceFlags::DC_ERROR);
                        }
                    }
                } else if let Some(slot) = self.xcomp.as_mut() {
                    if self.flags.contains(InterfaceFlags::COMP_RUN) {
                        slot.state.reset();
                    }
                }
            }
            _ => {}
        }
    }

    /// Install codec state for one direction from a CCP option block.
    pub(crate) fn set_compressor(
        &mut self,
        direction: Direction,
        options: &[u8],
        compressors: &CompressorRegistry,
    ) -> Result<()> {
        let block = OptionBlock::parse(options)?;
        let backend = compressors
            .lookup(block.id)
            .ok_or_else(|| PppError::NotFound(format!("Compressor id {}", block.id)))?;

        let exhausted = || {
            PppError::ResourceExhausted(format!(
                "{} could not allocate {:?} state",
                backend.name(),
                direction
            ))
        };

        // The previous state is dropped before the new one is allocated.
        match direction {
            Direction::Transmit => {
                self.flags.remove(InterfaceFlags::COMP_RUN);
                self.xcomp = None;
                let state = backend.alloc_compressor(block.bytes).ok_or_else(exhausted)?;
                self.xcomp = Some(CodecSlot {
                    backend: backend.clone(),
                    state,
                });
            }
            Direction::Receive => {
                self.flags.remove(InterfaceFlags::DECOMP_RUN);
                self.rcomp = None;
                let state = backend.alloc_decompressor(block.bytes).ok_or_else(exhausted)?;
                self.rcomp = Some(CodecSlot {
                    backend: backend.clone(),
                    state,
                });
            }
        }
        tracing::debug!(
            "ppp{}: {} installed for {:?}",
            self.unit,
            backend.name(),
            direction
        );
        Ok(())
    }

    /// Release both codec states.
    fn ccp_closed(&mut self) {
        self.flags.remove(
            InterfaceFlags::CCP_OPEN
                | InterfaceFlags::CCP_UP
                | InterfaceFlags::COMP_RUN
                | InterfaceFlags::DECOMP_RUN
                | InterfaceFlags::DC_ERROR
                | InterfaceFlags::DC_FERROR,
        );
        self.xcomp = None;
        self.rcomp = None;
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    pub(crate) fn set_flags(&mut self, requested: InterfaceFlags) {
        let closing = self.flags.contains(InterfaceFlags::CCP_OPEN)
            && !requested.contains(InterfaceFlags::CCP_OPEN);
        self.flags = (self.flags - InterfaceFlags::SETTABLE) | (requested & InterfaceFlags::SETTABLE);
        if closing {
            self.ccp_closed();
        }
    }

    fn set_max_cid(&mut self, slots: u8, factory: Option<&dyn VjFactory>) -> Result<()> {
        if slots == 0 {
            return Err(PppError::InvalidArgument("VJ slot count must be at least 1".into()));
        }
        let factory = factory
            .ok_or_else(|| PppError::NotSupported("No VJ codec is configured".into()))?;
        self.vj = None;
        self.vj = Some(factory.create(slots).ok_or_else(|| {
            PppError::ResourceExhausted(format!("VJ state with {} slots", slots))
        })?);
        Ok(())
    }

    pub(crate) fn ioctl(
        &mut self,
        cmd: &IoctlCmd,
        compressors: &CompressorRegistry,
        vj_factory: Option<&dyn VjFactory>,
    ) -> Result<IoctlReply> {
        match cmd {
            IoctlCmd::GetFlags => Ok(IoctlReply::Flags(self.flags)),
            IoctlCmd::SetFlags(flags) => {
                self.set_flags(*flags);
                Ok(IoctlReply::Done)
            }
            IoctlCmd::GetMru => Ok(IoctlReply::Mru(self.mru)),
            IoctlCmd::SetMru(mru) => {
                self.mru = *mru;
                Ok(IoctlReply::Done)
            }
            IoctlCmd::SetCompressor { direction, options } => {
                self.set_compressor(*direction, options, compressors)?;
                Ok(IoctlReply::Done)
            }
            IoctlCmd::GetNpMode(protocol) => Ok(IoctlReply::NpMode(self.modes.get(*protocol))),
            IoctlCmd::SetNpMode(protocol, mode) => {
                self.modes.set(*protocol, *mode)?;
                Ok(IoctlReply::Done)
            }
            IoctlCmd::SetMaxCid(slots) => {
                self.set_max_cid(*slots, vj_factory)?;
                Ok(IoctlReply::Done)
            }
            IoctlCmd::GetStats => Ok(IoctlReply::Stats(self.stats)),
            IoctlCmd::GetCompStats => Ok(IoctlReply::CompStats(self.comp_stats())),
            IoctlCmd::GetIdle => Ok(IoctlReply::Idle(self.idle())),
            IoctlCmd::GetUnit => Ok(IoctlReply::Unit(self.unit)),
            other => Err(PppError::NotSupported(format!(
                "{:?} is not an interface operation",
                other
            ))),
        }
    }

    /// Release everything the interface holds. Attached links are evicted
    /// but stay registered.
    pub(crate) fn teardown(&mut self, links: &mut LinkTable) {
        for id in self.links.drain(..) {
            if let Some(entry) = links.get_mut(&id) {
                entry.unit = None;
            }
        }
        self.consumers.clear();
        self.ccp_closed();
        self.vj = None;
        let dropped = self.queue.clear();
        self.rx_queue.clear();
        tracing::debug!("ppp{}: torn down ({} queued frames dropped)", self.unit, dropped);
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("unit", &self.unit)
            .field("clients", &self.clients)
            .field("links", &self.links)
            .field("flags", &self.flags)
            .field("mru", &self.mru)
            .field("queued", &self.queue.len())
            .finish()
    }
}
