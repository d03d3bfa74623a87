//! Control plane - handles bound to an interface or a link.
//!
//! A handle starts unbound. Binding it to an interface makes it a client of
//! that interface; binding it to a link gives it the link's control queue.
//!
//! ```text
//!              open()
//!                │
//!            ┌───▼────┐  new_unit / attach   ┌───────────┐
//!            │Unbound ├─────────────────────►│ Interface │
//!            │        ├─────────────────────►│   Link    │
//!            └───▲────┘     attach_link      └─────┬─────┘
//!                └───────────── detach ────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pppmux::{ControlPlane, IoctlCmd, IoctlReply, Registry, UnitHint};
//!
//! let control = ControlPlane::new(Arc::new(Registry::new()));
//! let handle = control.open();
//! let unit = control.new_unit(handle, UnitHint::Auto).unwrap();
//!
//! let reply = control.ioctl(handle, &IoctlCmd::GetUnit).unwrap();
//! assert_eq!(reply, IoctlReply::Unit(unit));
//! ```

mod ioctl;
mod report;

use std::sync::Arc;

use serde_json::Value;

use crate::error::{PppError, Result};
use crate::link::LinkId;
use crate::packet::Packet;
use crate::registry::{link_not_found, unit_not_found, Registry, State, UnitHint};

pub use ioctl::{IoctlCmd, IoctlReply};
pub use report::write_report;

/// Control handle identifier.
pub type HandleId = u32;

/// What a handle is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Interface(u32),
    Link(LinkId),
}

fn unknown_handle(handle: HandleId) -> PppError {
    PppError::NotFound(format!("Handle {}", handle))
}

fn unbound(handle: HandleId) -> PppError {
    PppError::InvalidState(format!("Handle {} is not bound", handle))
}

impl State {
    fn binding(&self, handle: HandleId) -> Result<Binding> {
        self.handles
            .get(&handle)
            .copied()
            .ok_or_else(|| unknown_handle(handle))
    }

    /// Fails unless the handle exists and is unbound.
    fn check_unbound(&self, handle: HandleId) -> Result<()> {
        match self.binding(handle)? {
            Binding::Unbound => Ok(()),
            bound => Err(PppError::InvalidState(format!(
                "Handle {} is already bound to {:?}",
                handle, bound
            ))),
        }
    }

    fn release(&mut self, handle: HandleId) -> Result<()> {
        match self.binding(handle)? {
            Binding::Unbound => return Err(unbound(handle)),
            Binding::Interface(unit) => {
                // The interface may already be gone if it was torn down
                // through the registry directly.
                if self.interfaces.contains_key(&unit) {
                    self.detach_client(unit)?;
                }
            }
            Binding::Link(_) => {}
        }
        self.handles.insert(handle, Binding::Unbound);
        Ok(())
    }
}

/// Handle-based access to a [`Registry`].
#[derive(Debug, Clone)]
pub struct ControlPlane {
    registry: Arc<Registry>,
}

impl ControlPlane {
    /// Create a control plane over a registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Open a new, unbound handle.
    pub fn open(&self) -> HandleId {
        let mut state = self.registry.lock();
        let handle = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(handle, Binding::Unbound);
        handle
    }

    /// Detach (if bound) and forget a handle.
    pub fn close(&self, handle: HandleId) -> Result<()> {
        let mut state = self.registry.lock();
        if state.binding(handle)? != Binding::Unbound {
            state.release(handle)?;
        }
        state.handles.remove(&handle);
        Ok(())
    }

    /// Current binding of a handle.
    pub fn binding(&self, handle: HandleId) -> Result<Binding> {
        self.registry.lock().binding(handle)
    }

    /// Create an interface and bind the handle to it as its first client.
    pub fn new_unit(&self, handle: HandleId, hint: UnitHint) -> Result<u32> {
        let mut state = self.registry.lock();
        state.check_unbound(handle)?;
        let unit = state.new_unit(hint, self.registry.config(), self.registry.vj_factory())?;
        state.handles.insert(handle, Binding::Interface(unit));
        Ok(unit)
    }

    /// Bind the handle to an existing interface.
    pub fn attach(&self, handle: HandleId, unit: u32) -> Result<()> {
        let mut state = self.registry.lock();
        state.check_unbound(handle)?;
        state.attach_client(unit)?;
        state.handles.insert(handle, Binding::Interface(unit));
        Ok(())
    }

    /// Bind the handle to a registered link.
    pub fn attach_link(&self, handle: HandleId, link: LinkId) -> Result<()> {
        let mut state = self.registry.lock();
        state.check_unbound(handle)?;
        if !state.links.contains_key(&link) {
            return Err(link_not_found(link));
        }
        state.handles.insert(handle, Binding::Link(link));
        Ok(())
    }

    /// Unbind the handle. An interface loses one client reference.
    pub fn detach(&self, handle: HandleId) -> Result<()> {
        self.registry.lock().release(handle)
    }

    /// Run a command against whatever the handle is bound to.
    pub fn ioctl(&self, handle: HandleId, cmd: &IoctlCmd) -> Result<IoctlReply> {
        let mut state = self.registry.lock();
        match state.binding(handle)? {
            Binding::Unbound => Err(unbound(handle)),
            Binding::Interface(unit) => state.unit_ioctl(
                unit,
                cmd,
                self.registry.compressors(),
                self.registry.vj_factory(),
            ),
            Binding::Link(link) => state.link_ioctl(link, cmd),
        }
    }

    /// Write a frame that starts with its protocol field.
    ///
    /// Interface handles send through the interface with no mode check; link
    /// handles send directly on the link.
    pub fn send(&self, handle: HandleId, frame: Packet) -> Result<()> {
        let mut state = self.registry.lock();
        match state.binding(handle)? {
            Binding::Unbound => Err(unbound(handle)),
            Binding::Interface(unit) => {
                let State {
                    interfaces, links, ..
                } = &mut *state;
                let iface = interfaces
                    .get_mut(&unit)
                    .ok_or_else(|| unit_not_found(unit))?;
                iface.send_control(frame, links)
            }
            Binding::Link(link) => state.link_write(link, frame),
        }
    }

    /// Next frame queued for the handle, protocol field first.
    pub fn recv(&self, handle: HandleId) -> Result<Option<Packet>> {
        let mut state = self.registry.lock();
        match state.binding(handle)? {
            Binding::Unbound => Err(unbound(handle)),
            Binding::Interface(unit) => {
                let iface = state
                    .interfaces
                    .get_mut(&unit)
                    .ok_or_else(|| unit_not_found(unit))?;
                Ok(iface.rx_queue.pop())
            }
            Binding::Link(link) => {
                let entry = state
                    .links
                    .get_mut(&link)
                    .ok_or_else(|| link_not_found(link))?;
                Ok(entry.rx_queue.pop())
            }
        }
    }

    /// JSON status of the interface the handle is bound to.
    pub fn report(&self, handle: HandleId) -> Result<Value> {
        let state = self.registry.lock();
        match state.binding(handle)? {
            Binding::Interface(unit) => {
                let iface = state
                    .interfaces
                    .get(&unit)
                    .ok_or_else(|| unit_not_found(unit))?;
                Ok(report::build_report(iface, &state.links))
            }
            Binding::Link(link) => Err(PppError::NotSupported(format!(
                "Handle {} is bound to link {}",
                handle, link
            ))),
            Binding::Unbound => Err(unbound(handle)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{InterfaceFlags, NpMode};
    use crate::link::{Link, LinkCaps, LinkFlags, SendOutcome};
    use crate::protocol::proto;
    use parking_lot::Mutex;

    struct WireLink(Arc<Mutex<Vec<Vec<u8>>>>);

    impl Link for WireLink {
        fn caps(&self) -> LinkCaps {
            LinkCaps::empty()
        }

        fn send(&mut self, frame: Packet, _priority: bool) -> SendOutcome {
            self.0.lock().push(frame.to_vec());
            SendOutcome::Sent
        }

        fn ioctl(&mut self, cmd: &IoctlCmd) -> Option<Result<IoctlReply>> {
            match cmd {
                IoctlCmd::Driver { code: 1, data } => Some(Ok(IoctlReply::Driver(data.clone()))),
                _ => None,
            }
        }
    }

    fn setup() -> (ControlPlane, LinkId, Arc<Mutex<Vec<Vec<u8>>>>) {
        let control = ControlPlane::new(Arc::new(Registry::new()));
        let wire = Arc::new(Mutex::new(Vec::new()));
        let link = control
            .registry()
            .register_link(Box::new(WireLink(wire.clone())));
        (control, link, wire)
    }

    #[test]
    fn test_unbound_handle_rejects_operations() {
        let (control, _, _) = setup();
        let handle = control.open();

        assert!(matches!(
            control.ioctl(handle, &IoctlCmd::GetFlags),
            Err(PppError::InvalidState(_))
        ));
        assert!(matches!(
            control.send(handle, Packet::from_slice(&[0xC0, 0x21])),
            Err(PppError::InvalidState(_))
        ));
        assert!(matches!(control.recv(handle), Err(PppError::InvalidState(_))));
        assert!(matches!(control.detach(handle), Err(PppError::InvalidState(_))));
    }

    #[test]
    fn test_bound_handle_cannot_rebind() {
        let (control, link, _) = setup();
        let handle = control.open();
        let unit = control.new_unit(handle, UnitHint::Auto).unwrap();

        assert!(matches!(
            control.attach(handle, unit),
            Err(PppError::InvalidState(_))
        ));
        assert!(matches!(
            control.attach_link(handle, link),
            Err(PppError::InvalidState(_))
        ));
        assert!(matches!(
            control.new_unit(handle, UnitHint::Auto),
            Err(PppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_last_detach_tears_down() {
        let (control, _, _) = setup();
        let creator = control.open();
        let unit = control.new_unit(creator, UnitHint::Auto).unwrap();
        let other = control.open();
        control.attach(other, unit).unwrap();

        control.detach(creator).unwrap();
        assert_eq!(control.registry().units(), vec![unit]);
        control.close(other).unwrap();
        assert!(control.registry().units().is_empty());
        assert!(matches!(
            control.binding(other),
            Err(PppError::NotFound(_))
        ));
    }

    #[test]
    fn test_handle_does_not_follow_reused_unit() {
        let (control, _, _) = setup();
        let old = control.open();
        let unit = control.new_unit(old, UnitHint::Auto).unwrap();

        // Torn down behind the handle's back, then the number is reused.
        control.registry().detach_client(unit).unwrap();
        assert_eq!(control.binding(old).unwrap(), Binding::Unbound);
        let fresh = control.open();
        assert_eq!(control.new_unit(fresh, UnitHint::Auto).unwrap(), unit);

        assert!(matches!(
            control.ioctl(old, &IoctlCmd::GetUnit),
            Err(PppError::InvalidState(_))
        ));
        assert!(matches!(
            control.send(old, Packet::from_slice(&[0x80, 0xFD, 1, 1, 0, 4])),
            Err(PppError::InvalidState(_))
        ));
        assert!(matches!(control.recv(old), Err(PppError::InvalidState(_))));
        assert!(matches!(control.report(old), Err(PppError::InvalidState(_))));
        assert!(matches!(control.detach(old), Err(PppError::InvalidState(_))));

        assert_eq!(control.registry().units(), vec![unit]);
        assert_eq!(control.binding(fresh).unwrap(), Binding::Interface(unit));
        control.close(old).unwrap();
        assert_eq!(control.registry().units(), vec![unit]);
    }

    #[test]
    fn test_interface_ioctls() {
        let (control, _, _) = setup();
        let handle = control.open();
        control.new_unit(handle, UnitHint::Auto).unwrap();

        control
            .ioctl(handle, &IoctlCmd::SetFlags(InterfaceFlags::COMP_TCP))
            .unwrap();
        assert_eq!(
            control.ioctl(handle, &IoctlCmd::GetFlags).unwrap(),
            IoctlReply::Flags(InterfaceFlags::COMP_TCP)
        );
        control
            .ioctl(handle, &IoctlCmd::SetNpMode(proto::IP, NpMode::Drop))
            .unwrap();
        assert_eq!(
            control.ioctl(handle, &IoctlCmd::GetNpMode(proto::IP)).unwrap(),
            IoctlReply::NpMode(NpMode::Drop)
        );
        assert!(matches!(
            control.ioctl(handle, &IoctlCmd::GetLinkMru),
            Err(PppError::NotSupported(_))
        ));
        assert!(matches!(
            control.ioctl(handle, &IoctlCmd::SetMaxCid(8)),
            Err(PppError::NotSupported(_))
        ));
    }

    #[test]
    fn test_link_handle_connect_and_commands() {
        let (control, link, _) = setup();
        let owner = control.open();
        let unit = control.new_unit(owner, UnitHint::Auto).unwrap();
        let handle = control.open();
        control.attach_link(handle, link).unwrap();

        assert!(matches!(
            control.ioctl(handle, &IoctlCmd::GetUnit),
            Err(PppError::InvalidState(_))
        ));
        control.ioctl(handle, &IoctlCmd::Connect(unit)).unwrap();
        assert_eq!(
            control.ioctl(handle, &IoctlCmd::GetUnit).unwrap(),
            IoctlReply::Unit(unit)
        );
        assert!(matches!(
            control.ioctl(handle, &IoctlCmd::Connect(unit)),
            Err(PppError::InvalidState(_))
        ));

        control
            .ioctl(handle, &IoctlCmd::SetLinkFlags(LinkFlags::COMP_AC))
            .unwrap();
        assert_eq!(
            control.ioctl(handle, &IoctlCmd::GetLinkFlags).unwrap(),
            IoctlReply::LinkFlags(LinkFlags::COMP_AC)
        );
        assert_eq!(
            control
                .ioctl(handle, &IoctlCmd::Driver { code: 1, data: vec![7] })
                .unwrap(),
            IoctlReply::Driver(vec![7])
        );
        assert!(matches!(
            control.ioctl(handle, &IoctlCmd::GetEscapeMap),
            Err(PppError::NotSupported(_))
        ));

        control.ioctl(handle, &IoctlCmd::Disconnect).unwrap();
        assert!(matches!(
            control.ioctl(handle, &IoctlCmd::Disconnect),
            Err(PppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_link_handle_send_and_recv() {
        let (control, link, wire) = setup();
        let handle = control.open();
        control.attach_link(handle, link).unwrap();

        control
            .send(handle, Packet::from_slice(&[0xC0, 0x21, 1, 1, 0, 4]))
            .unwrap();
        assert_eq!(
            *wire.lock(),
            vec![vec![0xFF, 0x03, 0xC0, 0x21, 1, 1, 0, 4]]
        );

        control
            .registry()
            .link_input(link, Packet::from_slice(&[0xFF, 0x03, 0xC0, 0x21, 2, 1, 0, 4]));
        let frame = control.recv(handle).unwrap().unwrap();
        assert_eq!(frame.to_vec(), vec![0xC0, 0x21, 2, 1, 0, 4]);
        assert_eq!(control.recv(handle).unwrap(), None);
    }

    #[test]
    fn test_interface_handle_send_and_recv() {
        let (control, link, wire) = setup();
        let handle = control.open();
        let unit = control.new_unit(handle, UnitHint::Auto).unwrap();
        control.registry().connect_link(link, unit).unwrap();

        control
            .ioctl(handle, &IoctlCmd::SetNpMode(proto::IP, NpMode::Error))
            .unwrap();
        // Control writes skip the mode check.
        control
            .send(handle, Packet::from_slice(&[0x00, 0x21, 0x45]))
            .unwrap();
        assert_eq!(*wire.lock(), vec![vec![0xFF, 0x03, 0x00, 0x21, 0x45]]);

        control
            .registry()
            .link_input(link, Packet::from_slice(&[0xFF, 0x03, 0x80, 0x21, 1, 1, 0, 4]));
        let frame = control.recv(handle).unwrap().unwrap();
        assert_eq!(frame.to_vec(), vec![0x80, 0x21, 1, 1, 0, 4]);
    }

    #[test]
    fn test_report() {
        let (control, link, _) = setup();
        let handle = control.open();
        let unit = control.new_unit(handle, UnitHint::Explicit(4)).unwrap();
        control.registry().connect_link(link, unit).unwrap();

        let report = control.report(handle).unwrap();
        assert_eq!(report["unit"], 4);
        assert_eq!(report["links"][0]["id"], link);

        let link_handle = control.open();
        control.attach_link(link_handle, link).unwrap();
        assert!(matches!(
            control.report(link_handle),
            Err(PppError::NotSupported(_))
        ));
    }
}
