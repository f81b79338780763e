use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use super::backend::TagDetector;

/// Registry of detector backends keyed by name.
///
/// The capture loop is single-threaded, so backends are owned boxes; the
/// selected one is moved out with [`BackendRegistry::take`].
pub struct BackendRegistry {
    backends: BTreeMap<String, Box<dyn TagDetector>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: TagDetector + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!(
                "backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            ));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// Remove a backend by name and hand it to the caller.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn TagDetector>> {
        let backend = self
            .backends
            .remove(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        if self.default_name.as_deref() == Some(name) {
            self.default_name = self.backends.keys().next().cloned();
        }
        Ok(backend)
    }

    /// Remove the default backend and hand it to the caller.
    pub fn take_default(&mut self) -> Result<Box<dyn TagDetector>> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        self.take(&name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
