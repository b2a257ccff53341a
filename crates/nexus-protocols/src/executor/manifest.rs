//! Executor manifest types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Metadata, Version};

/// Immutable descriptor of an executor plugin.
///
/// Descriptor files declare metadata only; the code behind a manifest is
/// supplied through explicit factory registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorManifest {
    pub id: String,
    pub version: Version,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Opaque reference for the loading mechanism.
    #[serde(default, alias = "entry_point", skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

fn default_kind() -> String {
    "executors".to_string()
}

impl ExecutorManifest {
    /// Create a new executor manifest.
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            kind: default_kind(),
            name: name.into(),
            description: String::new(),
            metadata: HashMap::new(),
            capabilities: Vec::new(),
            dependencies: Vec::new(),
            config: serde_json::Map::new(),
            entry: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the config table. Non-object values are ignored.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Check whether the manifest advertises a capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Check whether the manifest declares a dependency on `id`.
    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d == id)
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
