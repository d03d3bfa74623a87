//! Adapter between an interface and a generic multi-protocol host stack.
//!
//! ```text
//!   HostStack ◄── input(unit, protocol, payload) ──┐
//!       │                                          │ consumer
//!       └── send(protocol, payload) ─► frame_out ─► output ─► Registry::send
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{PppError, Result};
use crate::interface::ProtocolConsumer;
use crate::packet::Packet;
use crate::protocol::{decode_protocol, is_valid_protocol, push_protocol, take_protocol};
use crate::registry::Registry;

/// The host networking layer sitting above an interface.
pub trait HostStack: Send + Sync {
    /// A payload for an attached protocol arrived on `unit`.
    fn input(&self, unit: u32, protocol: u16, packet: Packet);
}

/// Read the discriminator at the front of a frame.
///
/// One byte if its low bit is set, otherwise two bytes Big Endian.
pub fn demux(frame: &Packet) -> Option<u16> {
    decode_protocol(frame).map(|(protocol, _)| protocol)
}

/// Prepend the two-byte discriminator to a payload.
pub fn frame_out(protocol: u16, mut payload: Packet) -> Result<Packet> {
    if !is_valid_protocol(protocol) {
        return Err(PppError::InvalidArgument(format!(
            "Invalid protocol {:#06x}",
            protocol
        )));
    }
    push_protocol(&mut payload, protocol);
    Ok(payload)
}

struct Forwarder(Arc<dyn HostStack>);

impl ProtocolConsumer for Forwarder {
    fn input(&self, unit: u32, protocol: u16, packet: Packet) {
        self.0.input(unit, protocol, packet);
    }
}

/// Binds one interface to a [`HostStack`].
pub struct FamilyShim {
    registry: Arc<Registry>,
    unit: u32,
    forwarder: Arc<Forwarder>,
}

impl FamilyShim {
    /// Create a shim for `unit`. No protocol is attached yet.
    pub fn new(registry: Arc<Registry>, unit: u32, host: Arc<dyn HostStack>) -> Self {
        Self {
            registry,
            unit,
            forwarder: Arc::new(Forwarder(host)),
        }
    }

    #[inline]
    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// Start forwarding a protocol to the host.
    ///
    /// Fails `AlreadyExists` if the protocol already has a consumer.
    pub fn attach(&self, protocol: u16) -> Result<()> {
        self.registry
            .attach_protocol(self.unit, protocol, self.forwarder.clone())?;
        tracing::debug!("ppp{}: host attached protocol {:#06x}", self.unit, protocol);
        Ok(())
    }

    /// Stop forwarding a protocol. Unknown protocols are ignored.
    pub fn detach(&self, protocol: u16) -> Result<()> {
        if self.registry.detach_protocol(self.unit, protocol)? {
            tracing::debug!("ppp{}: host detached protocol {:#06x}", self.unit, protocol);
        }
        Ok(())
    }

    /// Hand a framed packet from the host to the interface.
    pub fn output(&self, mut frame: Packet) -> Result<()> {
        let protocol = take_protocol(&mut frame)?;
        self.registry.send(self.unit, protocol, frame)
    }

    /// Frame and send a host payload.
    pub fn send(&self, protocol: u16, payload: Packet) -> Result<()> {
        self.output(frame_out(protocol, payload)?)
    }
}

impl fmt::Debug for FamilyShim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyShim").field("unit", &self.unit).finish()
    }
}
