//! Provider registry
//!
//! Explicit object passed into the executor; there is no process-global
//! provider table. Lookups are lock-free reads on a `DashMap`.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::LlmProvider;
use crate::error::{FlowError, Result};

#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn LlmProvider>>,
    default: RwLock<Option<String>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `provider.name()`; the first registration becomes the default
    pub fn register(&self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        {
            let mut default = self.default.write();
            if default.is_none() {
                *default = Some(name.clone());
            }
        }
        tracing::debug!(provider = %name, "Registered provider");
        self.providers.insert(name, provider);
    }

    pub fn set_default(&self, name: &str) -> Result<()> {
        if !self.has(name) {
            return Err(FlowError::ProviderNotFound {
                provider: name.to_string(),
            });
        }
        *self.default.write() = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(name).map(|p| Arc::clone(p.value()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// The default provider
    pub fn default_provider(&self) -> Option<Arc<dyn LlmProvider>> {
        let name = self.default.read().clone()?;
        self.get(&name)
    }

    /// `name` if given, else the default; missing is `ProviderNotFound`
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>> {
        match name {
            Some(name) => self.get(name),
            None => self.default_provider(),
        }
        .ok_or_else(|| FlowError::ProviderNotFound {
            provider: name.unwrap_or("<default>").to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list())
            .field("default", &*self.default.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[test]
    fn first_registration_is_default() {
        let registry = ProviderRegistry::new();
        assert!(registry.default_provider().is_none());
        registry.register(Arc::new(MockProvider::new().named("a")));
        registry.register(Arc::new(MockProvider::new().named("b")));
        assert_eq!(registry.default_provider().unwrap().name(), "a");
        registry.set_default("b").unwrap();
        assert_eq!(registry.default_provider().unwrap().name(), "b");
        assert_eq!(registry.list(), vec!["a", "b"]);
    }

    #[test]
    fn resolve_reports_missing_provider() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.resolve(Some("claude")),
            Err(FlowError::ProviderNotFound { .. })
        ));
        assert!(registry.resolve(None).is_err());
        assert!(registry.set_default("nope").is_err());
    }

    #[test]
    fn re_registering_replaces() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new()));
        registry.register(Arc::new(MockProvider::new()));
        assert_eq!(registry.len(), 1);
        assert!(registry.has("mock"));
    }
}
