//! Generates flags from a [`Configurable`] struct description.

use super::error::ConfigError;
use super::flags::FlagSet;
use super::schema::{Configurable, Field, FieldKind, Schema};

/// The tag key read for flag names when no override is given.
pub const DEFAULT_NAME_TAG: &str = "name";

/// Registers one flag per eligible field of `T` in `flags`.
///
/// Flag names are read from the `name_tag` annotation (`"name"` when empty)
/// and prefixed with `prefix`. Defaults are taken from `target`'s current
/// values. The first unsupported field aborts the walk; flags registered
/// before it stay registered.
pub fn generate_flags<T: Configurable>(
    name_tag: &str,
    flags: &mut FlagSet<T>,
    target: &T,
    prefix: &str,
) -> Result<(), ConfigError> {
    match T::schema() {
        Schema::Struct(fields) => process_fields(name_tag, flags, fields, target, prefix),
        Schema::Opaque(name) => Err(ConfigError::NotAStruct(name)),
    }
}

fn process_fields<T: 'static>(
    name_tag: &str,
    flags: &mut FlagSet<T>,
    fields: Vec<Field<T>>,
    target: &T,
    prefix: &str,
) -> Result<(), ConfigError> {
    let name_tag = if name_tag.is_empty() {
        DEFAULT_NAME_TAG
    } else {
        name_tag
    };

    for field in fields {
        if !field.is_exported() {
            continue;
        }

        let tags = field.tags();
        let name = tags.get(name_tag);
        let path = match name {
            Some(name) => qualify(prefix, name),
            None => prefix.to_string(),
        };

        if let FieldKind::Nested(schema) = field.kind() {
            match schema() {
                Schema::Struct(nested) => process_fields(name_tag, flags, nested, target, &path)?,
                Schema::Opaque(ty) => return Err(ConfigError::NotAStruct(ty)),
            }
            continue;
        }

        if name.is_none() {
            continue;
        }

        match field.kind() {
            FieldKind::Value { kind, accessor } => flags.add_field(
                &path,
                tags.get("short"),
                tags.get("description").unwrap_or_default(),
                *kind,
                accessor.clone(),
                target,
            )?,
            FieldKind::Ignored => {
                tracing::debug!(field = field.ident(), flag = %path, "no flag representation, skipping");
            }
            FieldKind::UnsupportedSlice(ty) => {
                return Err(ConfigError::UnsupportedSlice {
                    ty,
                    field: field.ident(),
                })
            }
            FieldKind::UnsupportedMap(ty) => {
                return Err(ConfigError::UnsupportedMap {
                    ty,
                    field: field.ident(),
                })
            }
            FieldKind::Unsupported(ty) => {
                return Err(ConfigError::UnsupportedFieldType {
                    ty,
                    field: field.ident(),
                })
            }
            FieldKind::Nested(_) => {}
        }
    }

    Ok(())
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
