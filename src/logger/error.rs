use thiserror::Error;

/// Errors raised by the logging façade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LoggerError {
    #[error("tags must be key/value pairs, got {0} values")]
    OddTagCount(usize),

    #[error("tag key at position {index} is not a string")]
    NonStringKey { index: usize },

    #[error("unknown log level {0:?}")]
    UnknownLevel(String),
}
