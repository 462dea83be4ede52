//! Type definitions for `.atomic` configuration.
//!
//! `AtomicFileData` is the raw view of a parsed file (loose header pairs and
//! the three list sections). `CanonicalConfig` is the normalized record the
//! generator consumes, built fresh for every generation request.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_ENTITY_TYPE: &str = "IEntity";
pub const DEFAULT_NAMESPACE: &str = "Generated";
pub const DEFAULT_CLASS_NAME: &str = "AtomicExtensions";

/// Header keys the mapper recognizes (matched case-insensitively)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKey {
    EntityType,
    AggressiveInlining,
    Unsafe,
    Namespace,
    ClassName,
    Directory,
    Solution,
}

impl HeaderKey {
    pub const ALL: [HeaderKey; 7] = [
        HeaderKey::EntityType,
        HeaderKey::AggressiveInlining,
        HeaderKey::Unsafe,
        HeaderKey::Namespace,
        HeaderKey::ClassName,
        HeaderKey::Directory,
        HeaderKey::Solution,
    ];

    /// Match a raw header key, ignoring case
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "entitytype" => Some(Self::EntityType),
            "aggressiveinlining" => Some(Self::AggressiveInlining),
            "unsafe" => Some(Self::Unsafe),
            "namespace" => Some(Self::Namespace),
            "classname" => Some(Self::ClassName),
            "directory" => Some(Self::Directory),
            "solution" => Some(Self::Solution),
            _ => None,
        }
    }

    /// Field name as written in a well-formed file
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::EntityType => "entityType",
            Self::AggressiveInlining => "aggressiveInlining",
            Self::Unsafe => "unsafe",
            Self::Namespace => "namespace",
            Self::ClassName => "className",
            Self::Directory => "directory",
            Self::Solution => "solution",
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::AggressiveInlining | Self::Unsafe)
    }
}

/// A single `key: value` header line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderProperty {
    pub key: String,
    pub value: String,
}

impl HeaderProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A `- name: type` item of the values section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDef {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
}

impl ValueDef {
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
        }
    }
}

/// Raw data of a parsed `.atomic` file, before defaults are applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicFileData {
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub header_properties: Vec<HeaderProperty>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub values: Vec<ValueDef>,
}

impl AtomicFileData {
    /// Value of a recognized header key; the last occurrence wins
    pub fn header_value(&self, key: HeaderKey) -> Option<&str> {
        self.header_properties
            .iter()
            .rev()
            .find(|p| HeaderKey::from_key(&p.key) == Some(key))
            .map(|p| p.value.as_str())
    }

    pub fn has_tags_or_values(&self) -> bool {
        !self.tags.is_empty() || !self.values.is_empty()
    }
}

/// Normalized configuration consumed by the code generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalConfig {
    pub entity_type: String,
    pub namespace: String,
    pub class_name: String,
    pub directory: Option<String>,
    pub solution: Option<String>,
    pub aggressive_inlining: bool,
    pub unsafe_access: bool,
    pub imports: Vec<String>,
    pub tags: Vec<String>,
    pub values: Vec<ValueDef>,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            entity_type: DEFAULT_ENTITY_TYPE.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            class_name: DEFAULT_CLASS_NAME.to_string(),
            directory: None,
            solution: None,
            aggressive_inlining: false,
            unsafe_access: false,
            imports: Vec::new(),
            tags: Vec::new(),
            values: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_key_is_case_insensitive() {
        assert_eq!(HeaderKey::from_key("EntityType"), Some(HeaderKey::EntityType));
        assert_eq!(HeaderKey::from_key("CLASSNAME"), Some(HeaderKey::ClassName));
        assert_eq!(HeaderKey::from_key("header"), None);
    }

    #[test]
    fn test_header_value_last_wins() {
        let data = AtomicFileData {
            header_properties: vec![
                HeaderProperty::new("namespace", "First"),
                HeaderProperty::new("Namespace", "Second"),
            ],
            ..Default::default()
        };
        assert_eq!(data.header_value(HeaderKey::Namespace), Some("Second"));
        assert_eq!(data.header_value(HeaderKey::Directory), None);
    }

    #[test]
    fn test_canonical_defaults() {
        let config = CanonicalConfig::default();
        assert_eq!(config.entity_type, "IEntity");
        assert_eq!(config.namespace, "Generated");
        assert_eq!(config.class_name, "AtomicExtensions");
        assert!(!config.unsafe_access);
    }
}
