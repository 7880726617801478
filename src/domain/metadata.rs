//! Open recording metadata and the default-resolution table.
//!
//! The store keeps metadata exactly as captured. Consumers that need a
//! value (the upload client, the CLI) go through [`DeliveryFields`], which
//! substitutes the documented defaults for missing or blank keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const KEY_PROTAGONIST: &str = "protagonist";
pub const KEY_LANGUAGE: &str = "language";
pub const KEY_PRIORITY: &str = "priority";
pub const KEY_DURATION: &str = "duration";

pub const DEFAULT_PROTAGONIST: &str = "Usuario";
pub const DEFAULT_LANGUAGE: &str = "es";
pub const DEFAULT_PRIORITY: &str = "normal";

/// String-to-string metadata attached to a recording
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => v,
            _ => default,
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Metadata fields sent to the remote sink, with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFields {
    pub protagonist: String,
    pub language: String,
    pub priority: String,
}

impl DeliveryFields {
    /// Resolve delivery fields, falling back to defaults for missing or blank keys
    pub fn resolve(metadata: &Metadata) -> Self {
        Self {
            protagonist: metadata.get_or(KEY_PROTAGONIST, DEFAULT_PROTAGONIST).to_string(),
            language: metadata.get_or(KEY_LANGUAGE, DEFAULT_LANGUAGE).to_string(),
            priority: metadata.get_or(KEY_PRIORITY, DEFAULT_PRIORITY).to_string(),
        }
    }
}
