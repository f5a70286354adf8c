//! The set of discoveries one run talks to, keyed by name.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::discovery::{Discovery, PluggableDiscovery};

/// Mapping from discovery name to discovery.
///
/// Building a registry never starts or stops anything.
#[derive(Default)]
pub struct DiscoveryRegistry {
    discoveries: BTreeMap<String, Box<dyn Discovery>>,
}

impl DiscoveryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        DiscoveryRegistry {
            discoveries: BTreeMap::new(),
        }
    }

    /// One pluggable discovery per discovery the catalog declares.
    ///
    /// Entries with an unusable command line are skipped with a warning.
    pub fn from_catalog(catalog: &dyn Catalog) -> Self {
        let mut registry = DiscoveryRegistry::new();

        for (name, argv) in catalog.declared_discoveries() {
            match PluggableDiscovery::new(name.clone(), &argv) {
                Ok(discovery) => registry.register(Box::new(discovery)),
                Err(e) => tracing::warn!("Skipping discovery `{}`: {}", name, e),
            }
        }

        registry
    }

    /// Add a discovery under its own name, replacing any same-named entry.
    pub fn register(&mut self, discovery: Box<dyn Discovery>) {
        self.discoveries
            .insert(discovery.name().to_string(), discovery);
    }

    /// Add a builtin discovery under `name`. Builtins always replace
    /// catalog entries of the same name.
    pub fn register_builtin(&mut self, name: impl Into<String>, discovery: Box<dyn Discovery>) {
        let name = name.into();
        if self.discoveries.contains_key(&name) {
            tracing::debug!("Builtin discovery `{}` overrides the catalog entry", name);
        }
        self.discoveries.insert(name, discovery);
    }

    /// Combine catalog and builtin discoveries; builtins win on collision.
    pub fn merge(catalog: DiscoveryRegistry, builtin: DiscoveryRegistry) -> Self {
        let mut merged = catalog;
        for (name, discovery) in builtin.discoveries {
            merged.register_builtin(name, discovery);
        }
        merged
    }

    /// Registered names in order.
    pub fn names(&self) -> Vec<&str> {
        self.discoveries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.discoveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discoveries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Discovery> {
        self.discoveries.get(name).map(|d| d.as_ref())
    }

    /// Mutable access to every discovery, in name order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Box<dyn Discovery>)> {
        self.discoveries.iter_mut()
    }
}

impl std::fmt::Debug for DiscoveryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryRegistry")
            .field("discoveries", &self.names())
            .finish()
    }
}
