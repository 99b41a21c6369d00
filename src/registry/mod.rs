// Transformer configuration factory registry

use crate::error::{Error, Result};
use crate::transformer::TransformerConfigurationFactory;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable mapping from transformer type name to its configuration
/// factory.
///
/// Built once at startup and then only read, so it is safe to share
/// across arbitrary concurrent callers. The registry is passed explicitly
/// into the configuration parser and the pipeline; there is no global
/// registration point.
pub struct TransformerRegistry {
    factories: HashMap<String, Arc<dyn TransformerConfigurationFactory>>,
}

impl TransformerRegistry {
    pub fn builder() -> TransformerRegistryBuilder {
        TransformerRegistryBuilder {
            factories: HashMap::new(),
        }
    }

    /// Look up the factory for a transformer type name.
    pub fn lookup(&self, type_name: &str) -> Option<&Arc<dyn TransformerConfigurationFactory>> {
        self.factories.get(type_name)
    }

    /// Like `lookup`, but an unknown type is a configuration error
    /// carrying the offending name.
    pub fn require(&self, type_name: &str) -> Result<&Arc<dyn TransformerConfigurationFactory>> {
        self.lookup(type_name).ok_or_else(|| {
            Error::Configuration(format!("unknown result transformer type: {}", type_name))
        })
    }

    /// All installed transformer type names.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

pub struct TransformerRegistryBuilder {
    factories: HashMap<String, Arc<dyn TransformerConfigurationFactory>>,
}

impl TransformerRegistryBuilder {
    /// Register a factory. Registering the same type name twice is a
    /// startup bug and fails.
    pub fn register(mut self, factory: Arc<dyn TransformerConfigurationFactory>) -> Result<Self> {
        let name = factory.type_name().to_string();
        if self.factories.insert(name.clone(), factory).is_some() {
            return Err(Error::Configuration(format!(
                "duplicate transformer type registration: {}",
                name
            )));
        }
        Ok(self)
    }

    pub fn build(self) -> TransformerRegistry {
        TransformerRegistry {
            factories: self.factories,
        }
    }
}
