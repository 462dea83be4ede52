//! Normalizes raw file data into a [`CanonicalConfig`].

use crate::codegen::types::{
    AtomicFileData, CanonicalConfig, HeaderKey, DEFAULT_CLASS_NAME, DEFAULT_ENTITY_TYPE,
    DEFAULT_NAMESPACE,
};
use crate::error::{AtomicError, Result};
use tracing::trace;

/// Map raw header pairs and sections into the canonical configuration.
///
/// Unrecognized header keys are ignored. Boolean headers must be exactly
/// `true` or `false`; anything else aborts the mapping. Lists are copied in
/// file order without de-duplication.
pub fn map_to_config(data: &AtomicFileData) -> Result<CanonicalConfig> {
    let mut config = CanonicalConfig {
        class_name: String::new(),
        namespace: String::new(),
        ..Default::default()
    };

    for property in &data.header_properties {
        let Some(key) = HeaderKey::from_key(&property.key) else {
            trace!("Ignoring unrecognized header key '{}'", property.key);
            continue;
        };

        let value = property.value.clone();
        match key {
            HeaderKey::EntityType => config.entity_type = value,
            HeaderKey::AggressiveInlining => {
                config.aggressive_inlining = parse_bool(key, &value)?;
            }
            HeaderKey::Unsafe => config.unsafe_access = parse_bool(key, &value)?,
            HeaderKey::Namespace => config.namespace = value,
            HeaderKey::ClassName => config.class_name = value,
            HeaderKey::Directory => config.directory = non_empty(value),
            HeaderKey::Solution => config.solution = non_empty(value),
        }
    }

    config.imports = data.imports.clone();
    config.tags = data.tags.clone();
    config.values = data.values.clone();

    if config.entity_type.trim().is_empty() {
        config.entity_type = DEFAULT_ENTITY_TYPE.to_string();
    }
    if config.class_name.trim().is_empty() {
        config.class_name = DEFAULT_CLASS_NAME.to_string();
    }
    if config.namespace.trim().is_empty() {
        config.namespace = DEFAULT_NAMESPACE.to_string();
    }

    Ok(config)
}

/// Strict boolean parsing: only `true` and `false` are accepted
pub fn parse_bool(key: HeaderKey, value: &str) -> Result<bool> {
    value.parse::<bool>().map_err(|_| {
        AtomicError::config(format!(
            "Property '{}' must be 'true' or 'false', got '{}'",
            key.field_name(),
            value
        ))
    })
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
