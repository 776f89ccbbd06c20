use thiserror::Error;

use crate::config::{ConfigError, DurationError, FlagError};
use crate::context::ContextError;
use crate::logger::LoggerError;

/// Top-level error type for the bindery library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("flag error: {0}")]
    Flag(#[from] FlagError),

    #[error("duration error: {0}")]
    Duration(#[from] DurationError),

    #[error("logger error: {0}")]
    Logger(#[from] LoggerError),

    #[error(transparent)]
    Context(#[from] ContextError),
}
