//! Binds configuration structs to command-line flags and YAML files, and
//! provides a small tagged logging façade carried through a request context.

pub mod config;
pub mod context;
mod error;
pub mod logger;

pub use config::{duration, ConfigError, Configurable, Manager};
pub use context::Context;
pub use error::Error;
pub use logger::{Level, Logger};
