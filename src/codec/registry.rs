//! Compressor registry for looking up backends by CCP option id.
//!
//! The table is read on every `set_compressor` call and written only when a
//! backend is registered or removed, so it sits behind a reader/writer lock:
//! lookups proceed in parallel, registration is serialized against them.
//!
//! # Example
//!
//! ```
//! use pppmux::codec::{CompressorRegistry, DeflateBackend, CI_DEFLATE};
//! use std::sync::Arc;
//!
//! let registry = CompressorRegistry::new();
//! registry.register(Arc::new(DeflateBackend::new())).unwrap();
//!
//! let backend = registry.lookup(CI_DEFLATE).unwrap();
//! assert_eq!(backend.name(), "deflate");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{BackendOps, CompressorBackend, DeflateBackend, CI_DEFLATE_DRAFT};
use crate::error::{PppError, Result};

/// Registry mapping CCP option ids to backends.
///
/// Deregistering a backend does not touch interfaces: the caller guarantees
/// that no interface still holds codec state allocated by it. Interfaces keep
/// their own `Arc` to the backend while state is live, so a premature removal
/// only prevents new allocations.
#[derive(Default)]
pub struct CompressorRegistry {
    /// Backends by id.
    backends: RwLock<BTreeMap<u8, Arc<dyn CompressorBackend>>>,
}

impl CompressorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in Deflate backends (ids 26 and 24).
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let builtins: [Arc<dyn CompressorBackend>; 2] = [
            Arc::new(DeflateBackend::new()),
            Arc::new(DeflateBackend::with_id(CI_DEFLATE_DRAFT)),
        ];
        for backend in builtins {
            // Fresh registry: ids cannot collide.
            let _ = registry.register(backend);
        }
        registry
    }

    /// Register a backend.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the id is taken
    /// - `InvalidArgument` if the backend does not implement every operation
    pub fn register(&self, backend: Arc<dyn CompressorBackend>) -> Result<()> {
        let id = backend.id();
        let missing = BackendOps::REQUIRED.difference(backend.ops());
        if !missing.is_empty() {
            return Err(PppError::InvalidArgument(format!(
                "Backend {} (id {}) is missing operations {:?}",
                backend.name(),
                id,
                missing
            )));
        }

        let mut backends = self.backends.write();
        if backends.contains_key(&id) {
            return Err(PppError::AlreadyExists(format!(
                "Compressor id {} is already registered",
                id
            )));
        }
        tracing::debug!("Registered compressor {} (id {})", backend.name(), id);
        backends.insert(id, backend);
        Ok(())
    }

    /// Remove a backend and return it.
    pub fn deregister(&self, id: u8) -> Result<Arc<dyn CompressorBackend>> {
        self.backends
            .write()
            .remove(&id)
            .ok_or_else(|| PppError::NotFound(format!("Compressor id {}", id)))
    }

    /// Get a backend by id.
    pub fn lookup(&self, id: u8) -> Option<Arc<dyn CompressorBackend>> {
        self.backends.read().get(&id).cloned()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<u8> {
        self.backends.read().keys().copied().collect()
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    /// Check if no backend is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }
}

impl fmt::Debug for CompressorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressorRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
