//! # pppmux
//!
//! PPP interface/link multiplexer with CCP compression negotiation and
//! pluggable codecs.
//!
//! An [`Interface`](crate::interface) presents one logical point-to-point
//! endpoint; one or more transport [`Link`]s are attached beneath it. The
//! core frames and dispatches packets by protocol number, keeps the CCP
//! running/error state, and calls out to compressor backends and an optional
//! Van Jacobson codec.
//!
//! ## Architecture
//!
//! - **Registry**: owns every interface, link and control handle behind one lock
//! - **ControlPlane**: handle-based create/attach/ioctl/send/recv
//! - **Link**: capability implemented by transport drivers
//! - **CompressorRegistry**: CCP option id to codec backend, Deflate built in
//! - **FamilyShim**: adapter towards a host networking stack
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use pppmux::{Link, LinkCaps, Packet, Registry, SendOutcome, UnitHint};
//! use pppmux::protocol::proto;
//!
//! struct Discard;
//!
//! impl Link for Discard {
//!     fn caps(&self) -> LinkCaps {
//!         LinkCaps::empty()
//!     }
//!
//!     fn send(&mut self, _frame: Packet, _priority: bool) -> SendOutcome {
//!         SendOutcome::Sent
//!     }
//! }
//!
//! let registry = Arc::new(Registry::new());
//! let unit = registry.new_unit(UnitHint::Auto).unwrap();
//! let link = registry.register_link(Box::new(Discard));
//! registry.connect_link(link, unit).unwrap();
//!
//! registry.send(unit, proto::IP, Packet::from_slice(&[0x45])).unwrap();
//! assert_eq!(registry.stats(unit).unwrap().tx_packets, 1);
//! ```

pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod family;
pub mod interface;
pub mod link;
pub mod packet;
pub mod protocol;
pub mod registry;
pub mod transport;
pub mod vj;

pub use codec::{CompressorRegistry, Direction};
pub use config::RegistryConfig;
pub use control::{Binding, ControlPlane, HandleId, IoctlCmd, IoctlReply};
pub use error::{PppError, Result};
pub use family::{FamilyShim, HostStack};
pub use interface::{
    CompressionStats, IdleTimes, InterfaceFlags, InterfaceStats, NpMode, ProtocolConsumer,
};
pub use link::{EscapeMap, Link, LinkCaps, LinkFlags, LinkId, SendOutcome};
pub use packet::Packet;
pub use registry::{Registry, RegistryBuilder, UnitHint};
pub use vj::{VjCodec, VjFactory};
