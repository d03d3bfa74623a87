//! Registry configuration.
//!
//! Every field has a default, so a config can be built in code, from the
//! [`RegistryBuilder`](crate::registry::RegistryBuilder) fluent methods, or from
//! a partial JSON document:
//!
//! ```
//! use pppmux::RegistryConfig;
//!
//! let config = RegistryConfig::from_json(r#"{ "output_queue_len": 8 }"#).unwrap();
//! assert_eq!(config.output_queue_len, 8);
//! assert_eq!(config.max_interfaces, pppmux::config::DEFAULT_MAX_INTERFACES);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{PppError, Result};
use crate::protocol::PPP_MRU;

/// Default upper bound on live interfaces.
pub const DEFAULT_MAX_INTERFACES: usize = 256;

/// Default interface output queue bound.
pub const DEFAULT_OUTPUT_QUEUE_LEN: usize = 50;

/// Default bound of each control-plane receive queue.
pub const DEFAULT_CLIENT_QUEUE_LEN: usize = 32;

/// Default VJ connection slots for new interfaces.
pub const DEFAULT_VJ_SLOTS: u8 = 16;

/// Tunables shared by every interface and link of one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Interfaces that may exist at once; `new_unit` fails beyond this.
    pub max_interfaces: usize,
    /// Frames an interface holds for its links before dropping.
    pub output_queue_len: usize,
    /// Frames each control-plane client may have waiting; the oldest is
    /// dropped when full.
    pub client_queue_len: usize,
    /// MRU assigned to new interfaces and links.
    pub default_mru: u16,
    /// VJ slots requested from the factory at interface creation.
    pub vj_slots: u8,
    /// Pass debug to codec state on initialization.
    pub debug: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_interfaces: DEFAULT_MAX_INTERFACES,
            output_queue_len: DEFAULT_OUTPUT_QUEUE_LEN,
            client_queue_len: DEFAULT_CLIENT_QUEUE_LEN,
            default_mru: PPP_MRU,
            vj_slots: DEFAULT_VJ_SLOTS,
            debug: false,
        }
    }
}

impl RegistryConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the registry unusable.
    pub fn validate(&self) -> Result<()> {
        if self.max_interfaces == 0 {
            return Err(PppError::InvalidArgument(
                "max_interfaces must be at least 1".into(),
            ));
        }
        if self.output_queue_len == 0 || self.client_queue_len == 0 {
            return Err(PppError::InvalidArgument(
                "Queue lengths must be at least 1".into(),
            ));
        }
        if self.vj_slots == 0 {
            return Err(PppError::InvalidArgument("vj_slots must be at least 1".into()));
        }
        Ok(())
    }
}
