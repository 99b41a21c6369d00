// Named search configurations and their wire format

use crate::error::{Error, Result};
use crate::registry::TransformerRegistry;
use crate::transformer::TransformerConfiguration;
use serde_json::{Map, Value};
use std::sync::Arc;

const RESULT_TRANSFORMERS_FIELD: &str = "result_transformers";

/// One transformer selected by a search configuration, tagged with the
/// type name it was registered under.
#[derive(Debug, Clone)]
pub struct TransformerEntry {
    pub type_name: String,
    pub config: Arc<dyn TransformerConfiguration>,
}

/// A named, persisted set of transformer configurations applied to
/// matching search requests.
///
/// Transformers are kept in declaration order; the pipeline applies them
/// in exactly that order.
#[derive(Debug, Clone)]
pub struct SearchConfiguration {
    transformers: Vec<TransformerEntry>,
}

impl SearchConfiguration {
    pub fn new(transformers: Vec<TransformerEntry>) -> Self {
        Self { transformers }
    }

    pub fn transformers(&self) -> &[TransformerEntry] {
        &self.transformers
    }

    /// Parse the wire representation:
    ///
    /// ```json
    /// {"result_transformers": {"<type>": { ...settings... }, ...}}
    /// ```
    ///
    /// A transformer type absent from the registry fails with
    /// `Error::Configuration` naming the offending type.
    pub fn parse(body: &Value, registry: &TransformerRegistry) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::Configuration("configuration body must be an object".into()))?;

        let transformers_value = object.get(RESULT_TRANSFORMERS_FIELD).ok_or_else(|| {
            Error::Configuration(format!("missing field: {}", RESULT_TRANSFORMERS_FIELD))
        })?;
        let transformers_map = transformers_value.as_object().ok_or_else(|| {
            Error::Configuration(format!("{} must be an object", RESULT_TRANSFORMERS_FIELD))
        })?;
        if transformers_map.is_empty() {
            return Err(Error::Configuration(format!(
                "{} must select at least one transformer",
                RESULT_TRANSFORMERS_FIELD
            )));
        }

        let mut transformers = Vec::with_capacity(transformers_map.len());
        for (type_name, settings) in transformers_map {
            let factory = registry.require(type_name)?;
            let config = factory.parse(settings)?;
            transformers.push(TransformerEntry {
                type_name: type_name.clone(),
                config: Arc::from(config),
            });
        }
        Ok(Self { transformers })
    }

    /// Serialize to the wire representation stored in the configuration
    /// index.
    pub fn to_json(&self) -> Value {
        let mut transformers = Map::new();
        for entry in &self.transformers {
            transformers.insert(entry.type_name.clone(), entry.config.to_json());
        }
        let mut root = Map::new();
        root.insert(RESULT_TRANSFORMERS_FIELD.to_string(), Value::Object(transformers));
        Value::Object(root)
    }
}
