use std::collections::HashMap;
use std::sync::Arc;

use crate::core::capability::Capability;

/// Immutable, process-wide lookup table of capabilities by name.
///
/// Built once through [`RegistryBuilder`]; afterwards it is only read, so
/// clones share the same table and concurrent lookups need no locking.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: Arc<HashMap<String, Arc<dyn Capability>>>,
}

impl CapabilityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}

/// Collects capabilities before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl RegistryBuilder {
    pub fn register<C: Capability>(self, capability: C) -> Self {
        self.register_arc(Arc::new(capability))
    }

    pub fn register_arc(mut self, capability: Arc<dyn Capability>) -> Self {
        let name = capability.name().to_string();
        if self.capabilities.contains_key(&name) {
            log::warn!(
                "Capability '{}' was already registered, overwriting.",
                name
            );
        }
        self.capabilities.insert(name, capability);
        self
    }

    pub fn build(self) -> CapabilityRegistry {
        log::debug!("Capability registry frozen with {} entries", self.capabilities.len());
        CapabilityRegistry {
            capabilities: Arc::new(self.capabilities),
        }
    }
}
