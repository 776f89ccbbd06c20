//! YAML configuration files.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use super::ConfigError;

/// Reads the whole configuration file.
pub fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadConfig {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Decodes `contents` over the current state of `target`.
///
/// Every field the document addresses is overwritten, nested mappings are
/// merged key by key and everything else keeps its current value. An empty
/// document leaves `target` untouched.
pub fn decode_into<T>(path: &Path, contents: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let parse_error = |e| ConfigError::ParseConfig {
        path: path.to_path_buf(),
        source: e,
    };

    let overlay: Value = serde_yaml::from_str(contents).map_err(parse_error)?;
    if overlay.is_null() {
        tracing::debug!(path = %path.display(), "config file is empty");
        return Ok(());
    }

    let mut merged = serde_yaml::to_value(&*target).map_err(parse_error)?;
    deep_merge(&mut merged, overlay);
    *target = serde_yaml::from_value(merged).map_err(parse_error)?;
    Ok(())
}

/// Reads `path` and decodes it over `target`.
pub fn load_into<T>(path: &Path, target: &mut T) -> Result<(), ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let contents = read_config(path)?;
    decode_into(path, &contents, target)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(())
}

fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => merge_mapping(base_map, overlay_map),
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

fn merge_mapping(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) if existing.is_mapping() && value.is_mapping() => {
                deep_merge(existing, value);
            }
            _ => {
                base.insert(key, value);
            }
        }
    }
}
