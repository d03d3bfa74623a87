//! Per-network-protocol modes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PppError, Result};
use crate::protocol::{is_network_data, is_valid_protocol};

/// What an interface does with a network protocol's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpMode {
    /// Traffic flows normally.
    #[default]
    Pass,
    /// Traffic is silently discarded.
    Drop,
    /// Sends fail with [`PppError::ProtocolDisabled`]; input is discarded.
    Error,
    /// Accepted but never drained: traffic is discarded and counted.
    Queue,
}

/// Mode table; protocols without an entry are in [`NpMode::Pass`].
#[derive(Debug, Clone, Default)]
pub struct ModeTable {
    modes: BTreeMap<u16, NpMode>,
}

impl ModeTable {
    /// Create a table with every protocol passing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode of `protocol`.
    #[inline]
    pub fn get(&self, protocol: u16) -> NpMode {
        self.modes.get(&protocol).copied().unwrap_or_default()
    }

    /// Set the mode of a network-data protocol.
    pub fn set(&mut self, protocol: u16, mode: NpMode) -> Result<()> {
        if !is_valid_protocol(protocol) || !is_network_data(protocol) {
            return Err(PppError::InvalidArgument(format!(
                "{:#06x} is not a network protocol",
                protocol
            )));
        }
        if mode == NpMode::Pass {
            self.modes.remove(&protocol);
        } else {
            self.modes.insert(protocol, mode);
        }
        Ok(())
    }
}
