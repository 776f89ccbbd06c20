//! Struct-to-flag binding and YAML configuration loading.

pub mod duration;
mod error;
pub mod file;
mod flags;
mod manager;
mod schema;
mod value;
mod walker;

pub use error::{ConfigError, DurationError, FlagError};
pub use flags::{Flag, FlagSet};
pub use manager::{Manager, CONFIG_FLAG, DEFAULT_CONFIG_FILE};
pub use schema::{Configurable, Field, FieldType, Lens, Schema, Shape, Tags};
pub use value::{Adapter, FlagKind, FlagValue};
pub use walker::{generate_flags, DEFAULT_NAME_TAG};
