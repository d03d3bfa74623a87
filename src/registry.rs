//! Registry - owner of every interface, link and control handle.
//!
//! All mutable state sits behind one exclusive lock. Public methods take the
//! lock, do their work and release it before any protocol consumer is
//! called, so a consumer may send from inside its `input` callback. Link
//! driver callbacks run with the lock held and must not re-enter.
//!
//! # Example
//!
//! ```
//! use pppmux::{Registry, UnitHint};
//!
//! let registry = Registry::builder().output_queue_len(16).build().unwrap();
//!
//! let a = registry.new_unit(UnitHint::Auto).unwrap();
//! let b = registry.new_unit(UnitHint::Auto).unwrap();
//! assert_eq!((a, b), (0, 1));
//!
//! registry.detach_client(a).unwrap();
//! assert_eq!(registry.new_unit(UnitHint::Auto).unwrap(), 0);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::codec::{CompressorRegistry, Direction};
use crate::config::RegistryConfig;
use crate::control::{Binding, HandleId, IoctlCmd, IoctlReply};
use crate::error::{PppError, Result};
use crate::interface::{
    CompressionStats, Interface, InterfaceStats, LinkTable, ProtocolConsumer,
};
use crate::link::{deframe_inbound, Link, LinkEntry, LinkId};
use crate::packet::Packet;
use crate::protocol::{is_link_protocol, proto, push_protocol};
use crate::vj::VjFactory;

/// How `new_unit` picks the unit number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitHint {
    /// Smallest number not held by a live interface.
    Auto,
    /// This exact number.
    Explicit(u32),
}

pub(crate) fn unit_not_found(unit: u32) -> PppError {
    PppError::NotFound(format!("Interface ppp{}", unit))
}

pub(crate) fn link_not_found(link: LinkId) -> PppError {
    PppError::NotFound(format!("Link {}", link))
}

/// Everything guarded by the registry lock.
pub(crate) struct State {
    pub(crate) interfaces: BTreeMap<u32, Interface>,
    pub(crate) links: LinkTable,
    pub(crate) handles: BTreeMap<HandleId, Binding>,
    next_link: LinkId,
    pub(crate) next_handle: HandleId,
}

impl State {
    fn new() -> Self {
        Self {
            interfaces: BTreeMap::new(),
            links: BTreeMap::new(),
            handles: BTreeMap::new(),
            next_link: 0,
            next_handle: 0,
        }
    }

    /// Smallest unit not held by a live interface.
    fn free_unit(&self) -> u32 {
        let mut candidate = 0;
        for &unit in self.interfaces.keys() {
            if unit != candidate {
                break;
            }
            candidate += 1;
        }
        candidate
    }

    pub(crate) fn new_unit(
        &mut self,
        hint: UnitHint,
        config: &RegistryConfig,
        vj_factory: Option<&dyn VjFactory>,
    ) -> Result<u32> {
        if self.interfaces.len() >= config.max_interfaces {
            return Err(PppError::ResourceExhausted(format!(
                "All {} interfaces are in use",
                config.max_interfaces
            )));
        }
        let unit = match hint {
            UnitHint::Auto => self.free_unit(),
            UnitHint::Explicit(unit) if self.interfaces.contains_key(&unit) => {
                return Err(PppError::AlreadyExists(format!("Interface ppp{}", unit)));
            }
            UnitHint::Explicit(unit) => unit,
        };

        let vj = vj_factory.and_then(|factory| factory.create(config.vj_slots));
        self.interfaces
            .insert(unit, Interface::new(unit, config, vj));
        tracing::debug!("ppp{}: created", unit);
        Ok(unit)
    }

    pub(crate) fn attach_client(&mut self, unit: u32) -> Result<()> {
        let iface = self
            .interfaces
            .get_mut(&unit)
            .ok_or_else(|| unit_not_found(unit))?;
        iface.clients += 1;
        Ok(())
    }

    pub(crate) fn detach_client(&mut self, unit: u32) -> Result<()> {
        let iface = self
            .interfaces
            .get_mut(&unit)
            .ok_or_else(|| unit_not_found(unit))?;
        iface.clients = iface.clients.saturating_sub(1);
        if iface.clients > 0 {
            return Ok(());
        }
        if let Some(mut iface) = self.interfaces.remove(&unit) {
            iface.teardown(&mut self.links);
        }
        // The unit number may be reused; handles must not follow it.
        for binding in self.handles.values_mut() {
            if *binding == Binding::Interface(unit) {
                *binding = Binding::Unbound;
            }
        }
        Ok(())
    }

    pub(crate) fn connect_link(&mut self, link: LinkId, unit: u32) -> Result<()> {
        let entry = self.links.get_mut(&link).ok_or_else(|| link_not_found(link))?;
        if let Some(current) = entry.unit {
            return Err(PppError::InvalidState(format!(
                "Link {} is already attached to ppp{}",
                link, current
            )));
        }
        let iface = self
            .interfaces
            .get_mut(&unit)
            .ok_or_else(|| unit_not_found(unit))?;
        entry.unit = Some(unit);
        iface.attach_link(link);
        tracing::debug!("link{}: attached to ppp{}", link, unit);
        Ok(())
    }

    pub(crate) fn disconnect_link(&mut self, link: LinkId) -> Result<()> {
        let entry = self.links.get_mut(&link).ok_or_else(|| link_not_found(link))?;
        let unit = entry.unit.take().ok_or_else(|| {
            PppError::InvalidState(format!("Link {} is not attached", link))
        })?;
        if let Some(iface) = self.interfaces.get_mut(&unit) {
            iface.detach_link(link, &mut self.links);
        }
        Ok(())
    }

    pub(crate) fn unit_ioctl(
        &mut self,
        unit: u32,
        cmd: &IoctlCmd,
        compressors: &CompressorRegistry,
        vj_factory: Option<&dyn VjFactory>,
    ) -> Result<IoctlReply> {
        let iface = self
            .interfaces
            .get_mut(&unit)
            .ok_or_else(|| unit_not_found(unit))?;
        iface.ioctl(cmd, compressors, vj_factory)
    }

    pub(crate) fn link_ioctl(&mut self, link: LinkId, cmd: &IoctlCmd) -> Result<IoctlReply> {
        match cmd {
            IoctlCmd::Connect(unit) => self.connect_link(link, *unit).map(|_| IoctlReply::Done),
            IoctlCmd::Disconnect => self.disconnect_link(link).map(|_| IoctlReply::Done),
            _ => {
                let entry = self.links.get_mut(&link).ok_or_else(|| link_not_found(link))?;
                match entry.driver.ioctl(cmd) {
                    Some(reply) => reply,
                    None => entry.common_ioctl(cmd),
                }
            }
        }
    }

    /// Queue a frame written by a link's own client and try to send it.
    pub(crate) fn link_write(&mut self, link: LinkId, frame: Packet) -> Result<()> {
        let entry = self.links.get_mut(&link).ok_or_else(|| link_not_found(link))?;
        entry.enqueue(frame)?;
        entry.push_own();
        Ok(())
    }
}

/// Builder for a [`Registry`].
pub struct RegistryBuilder {
    config: RegistryConfig,
    compressors: Option<Arc<CompressorRegistry>>,
    vj_factory: Option<Arc<dyn VjFactory>>,
}

impl RegistryBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            compressors: None,
            vj_factory: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Maximum number of live interfaces.
    ///
    /// Default: 256
    pub fn max_interfaces(mut self, limit: usize) -> Self {
        self.config.max_interfaces = limit;
        self
    }

    /// Interface output queue bound.
    ///
    /// Default: 50
    pub fn output_queue_len(mut self, len: usize) -> Self {
        self.config.output_queue_len = len;
        self
    }

    /// Control-plane receive queue bound.
    ///
    /// Default: 32
    pub fn client_queue_len(mut self, len: usize) -> Self {
        self.config.client_queue_len = len;
        self
    }

    /// MRU for new interfaces and links.
    ///
    /// Default: 1500
    pub fn default_mru(mut self, mru: u16) -> Self {
        self.config.default_mru = mru;
        self
    }

    /// VJ slots for new interfaces.
    ///
    /// Default: 16
    pub fn vj_slots(mut self, slots: u8) -> Self {
        self.config.vj_slots = slots;
        self
    }

    /// Pass debug to codec state.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Share a compressor registry. Without one, a registry with the
    /// built-in Deflate backends is created.
    pub fn compressors(mut self, compressors: Arc<CompressorRegistry>) -> Self {
        self.compressors = Some(compressors);
        self
    }

    /// Factory used to create VJ state for each interface.
    pub fn vj_factory(mut self, factory: Arc<dyn VjFactory>) -> Self {
        self.vj_factory = Some(factory);
        self
    }

    /// Validate the configuration and build the registry.
    pub fn build(self) -> Result<Registry> {
        self.config.validate()?;
        Ok(Registry {
            state: Mutex::new(State::new()),
            compressors: self
                .compressors
                .unwrap_or_else(|| Arc::new(CompressorRegistry::with_defaults())),
            vj_factory: self.vj_factory,
            config: self.config,
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The subsystem object owning all interfaces and links.
pub struct Registry {
    state: Mutex<State>,
    compressors: Arc<CompressorRegistry>,
    vj_factory: Option<Arc<dyn VjFactory>>,
    config: RegistryConfig,
}

impl Registry {
    /// Create a builder.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with default configuration and the built-in compressors.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
            compressors: Arc::new(CompressorRegistry::with_defaults()),
            vj_factory: None,
            config: RegistryConfig::default(),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Active configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Compressor backends available to `set_compressor`.
    pub fn compressors(&self) -> &Arc<CompressorRegistry> {
        &self.compressors
    }

    pub(crate) fn vj_factory(&self) -> Option<&dyn VjFactory> {
        self.vj_factory.as_deref()
    }

    // ------------------------------------------------------------------
    // Interfaces
    // ------------------------------------------------------------------

    /// Create an interface; the caller becomes its first client.
    pub fn new_unit(&self, hint: UnitHint) -> Result<u32> {
        self.lock().new_unit(hint, &self.config, self.vj_factory())
    }

    /// Add a client reference to an interface.
    pub fn attach_client(&self, unit: u32) -> Result<()> {
        self.lock().attach_client(unit)
    }

    /// Drop a client reference; the interface is torn down at zero.
    pub fn detach_client(&self, unit: u32) -> Result<()> {
        self.lock().detach_client(unit)
    }

    /// Live unit numbers in ascending order.
    pub fn units(&self) -> Vec<u32> {
        self.lock().interfaces.keys().copied().collect()
    }

    /// Send a consumer's packet.
    ///
    /// # Errors
    ///
    /// - `ProtocolDisabled` if the protocol's mode is ERROR
    /// - `ResourceExhausted` if the output queue is full
    pub fn send(&self, unit: u32, protocol: u16, packet: Packet) -> Result<()> {
        let mut state = self.lock();
        let State {
            interfaces, links, ..
        } = &mut *state;
        let iface = interfaces.get_mut(&unit).ok_or_else(|| unit_not_found(unit))?;
        iface.send(protocol, packet, links)
    }

    /// Attach a consumer for one network protocol.
    pub fn attach_protocol(
        &self,
        unit: u32,
        protocol: u16,
        consumer: Arc<dyn ProtocolConsumer>,
    ) -> Result<()> {
        let mut state = self.lock();
        let iface = state
            .interfaces
            .get_mut(&unit)
            .ok_or_else(|| unit_not_found(unit))?;
        iface.attach_consumer(protocol, consumer)
    }

    /// Detach a consumer; returns whether one was attached.
    pub fn detach_protocol(&self, unit: u32, protocol: u16) -> Result<bool> {
        let mut state = self.lock();
        let iface = state
            .interfaces
            .get_mut(&unit)
            .ok_or_else(|| unit_not_found(unit))?;
        Ok(iface.detach_consumer(protocol))
    }

    /// Install codec state from a CCP option block.
    pub fn set_compressor(&self, unit: u32, direction: Direction, options: &[u8]) -> Result<()> {
        let mut state = self.lock();
        let iface = state
            .interfaces
            .get_mut(&unit)
            .ok_or_else(|| unit_not_found(unit))?;
        iface.set_compressor(direction, options, &self.compressors)
    }

    /// Run an interface command without going through a handle.
    pub fn unit_ioctl(&self, unit: u32, cmd: &IoctlCmd) -> Result<IoctlReply> {
        self.lock()
            .unit_ioctl(unit, cmd, &self.compressors, self.vj_factory())
    }

    /// Interface counters.
    pub fn stats(&self, unit: u32) -> Result<InterfaceStats> {
        let state = self.lock();
        let iface = state.interfaces.get(&unit).ok_or_else(|| unit_not_found(unit))?;
        Ok(iface.stats())
    }

    /// Compression counters.
    pub fn comp_stats(&self, unit: u32) -> Result<CompressionStats> {
        let state = self.lock();
        let iface = state.interfaces.get(&unit).ok_or_else(|| unit_not_found(unit))?;
        Ok(iface.comp_stats())
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Register a transport driver.
    pub fn register_link(&self, driver: Box<dyn Link>) -> LinkId {
        let mut state = self.lock();
        let id = state.next_link;
        state.next_link += 1;
        let entry = LinkEntry::new(
            id,
            driver,
            self.config.default_mru,
            self.config.output_queue_len,
            self.config.client_queue_len,
        );
        tracing::debug!("link{}: registered ({:?})", id, entry.caps);
        state.links.insert(id, entry);
        id
    }

    /// Remove a transport driver, detaching it first if needed.
    pub fn unregister_link(&self, link: LinkId) -> Result<()> {
        let mut state = self.lock();
        let attached = state
            .links
            .get(&link)
            .ok_or_else(|| link_not_found(link))?
            .unit
            .is_some();
        if attached {
            state.disconnect_link(link)?;
        }
        state.links.remove(&link);
        tracing::debug!("link{}: unregistered", link);
        Ok(())
    }

    /// Attach a link to an interface.
    ///
    /// Fails `InvalidState` if the link is already attached.
    pub fn connect_link(&self, link: LinkId, unit: u32) -> Result<()> {
        self.lock().connect_link(link, unit)
    }

    /// Detach a link from its interface.
    ///
    /// Fails `InvalidState` if the link is not attached.
    pub fn disconnect_link(&self, link: LinkId) -> Result<()> {
        self.lock().disconnect_link(link)
    }

    /// Run a link command without going through a handle.
    pub fn link_ioctl(&self, link: LinkId, cmd: &IoctlCmd) -> Result<IoctlReply> {
        self.lock().link_ioctl(link, cmd)
    }

    /// A frame arrived on a link.
    pub fn link_input(&self, link: LinkId, frame: Packet) {
        let delivery = {
            let mut state = self.lock();
            let State {
                interfaces, links, ..
            } = &mut *state;
            let Some(entry) = links.get_mut(&link) else {
                tracing::warn!("Input on unknown link {}", link);
                return;
            };
            let owner = entry.unit;

            let (protocol, payload) =
                match deframe_inbound(frame, entry.flags, entry.caps, entry.mru) {
                    Ok(parts) => parts,
                    Err(e) => {
                        tracing::debug!("link{}: {}", link, e);
                        if let Some(iface) = owner.and_then(|unit| interfaces.get_mut(&unit)) {
                            iface.error();
                        }
                        return;
                    }
                };

            let iface = owner.and_then(|unit| interfaces.get_mut(&unit));
            match iface {
                Some(iface) if !is_link_protocol(protocol) && protocol != proto::CCPFRAG => {
                    iface.deliver(protocol, payload)
                }
                _ => {
                    let mut frame = payload;
                    push_protocol(&mut frame, protocol);
                    if entry.rx_queue.push(frame) {
                        tracing::debug!("link{}: client queue full, dropped oldest frame", link);
                    }
                    None
                }
            }
        };

        if let Some(delivery) = delivery {
            delivery.dispatch();
        }
    }

    /// The link's transport reported an input error (bad FCS, overrun).
    pub fn link_error(&self, link: LinkId) {
        let mut state = self.lock();
        let State {
            interfaces, links, ..
        } = &mut *state;
        let owner = links.get(&link).and_then(|entry| entry.unit);
        if let Some(iface) = owner.and_then(|unit| interfaces.get_mut(&unit)) {
            iface.error();
        }
    }

    /// The link's transport queue drained; resume sending.
    pub fn link_drained(&self, link: LinkId) {
        let mut state = self.lock();
        let State {
            interfaces, links, ..
        } = &mut *state;
        let Some(entry) = links.get_mut(&link) else {
            return;
        };
        if !entry.push_own() {
            return;
        }
        let owner = entry.unit;
        if let Some(iface) = owner.and_then(|unit| interfaces.get_mut(&unit)) {
            iface.link_drained(link, links);
        }
    }

    /// Owning interface of a link.
    pub fn link_unit(&self, link: LinkId) -> Result<Option<u32>> {
        let state = self.lock();
        let entry = state.links.get(&link).ok_or_else(|| link_not_found(link))?;
        Ok(entry.unit)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Registry")
            .field("interfaces", &state.interfaces.keys().collect::<Vec<_>>())
            .field("links", &state.links.keys().collect::<Vec<_>>())
            .field("handles", &state.handles.len())
            .field("compressors", &self.compressors)
            .finish()
    }
}
