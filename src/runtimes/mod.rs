//! Runtime client backends.
//!
//! Engine-specific clients (Docker API, CRI) live outside this crate and
//! plug in through [`RuntimeClient`]. The crate ships the in-memory
//! backend used for previews and tests.

pub mod memory;

pub use self::memory::{MemoryRuntime, RuntimeCall};

use crate::client::RuntimeClient;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Registry of runtime clients, looked up by name.
#[derive(Default)]
pub struct RuntimeRegistry {
    clients: Vec<Arc<dyn RuntimeClient>>,
}

impl RuntimeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client; a later client with the same name shadows earlier ones.
    pub fn register(&mut self, client: Arc<dyn RuntimeClient>) {
        self.clients.insert(0, client);
    }

    /// Returns all registered clients, most recent first.
    pub fn all(&self) -> &[Arc<dyn RuntimeClient>] {
        &self.clients
    }

    /// Gets a client by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn RuntimeClient>> {
        self.clients
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("unknown runtime backend: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let mut registry = RuntimeRegistry::new();
        assert!(registry.get("memory").is_err());

        let first: Arc<dyn RuntimeClient> = Arc::new(MemoryRuntime::new());
        let second: Arc<dyn RuntimeClient> = Arc::new(MemoryRuntime::new());
        registry.register(Arc::clone(&first));
        registry.register(Arc::clone(&second));

        assert_eq!(registry.all().len(), 2);
        let found = registry.get("memory").unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }
}
