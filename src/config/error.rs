use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while generating flags or loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("expected struct, got {0}")]
    NotAStruct(&'static str),

    #[error("unsupported field type {ty} for field {field}")]
    UnsupportedFieldType { ty: &'static str, field: &'static str },

    #[error("unsupported slice type {ty} for field {field}")]
    UnsupportedSlice { ty: &'static str, field: &'static str },

    #[error("unsupported map type {ty} for field {field}")]
    UnsupportedMap { ty: &'static str, field: &'static str },

    #[error(transparent)]
    Flag(#[from] FlagError),

    #[error("could not read config file '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse config file '{path}': {source}")]
    ParseConfig {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("could not set flag {name}: {source}")]
    SetFlag { name: String, source: FlagError },
}

/// Errors raised by the flag registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlagError {
    #[error("flag redefined: {0}")]
    Redefined(String),

    #[error("unable to redefine {short:?} shorthand in flag {name}: already used for {existing}")]
    ShorthandRedefined {
        short: char,
        name: String,
        existing: String,
    },

    #[error("shorthand for flag {name} must be a single character, got {short:?}")]
    InvalidShorthand { name: String, short: String },

    #[error("no such flag --{0}")]
    NotFound(String),

    #[error("invalid argument {value:?} for --{name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Args(#[from] clap::Error),
}

/// Errors raised while parsing a textual duration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("negative duration {0:?}")]
    Negative(String),

    #[error("duration {0:?} overflows")]
    Overflow(String),
}
