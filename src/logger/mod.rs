//! A small logging façade with level filtering and key/value tags.
//!
//! A [`Logger`] forwards rendered messages to a [`Log`] back-end. Tagged
//! loggers are derived with [`Logger::with_tag`] and [`Logger::with_tags`];
//! every derived logger owns its tags, so parents never see a child's tags.
//!
//! ## Example
//!
//! ```
//! use bindery::logger::{Level, Logger};
//!
//! let logger = Logger::builder().level(Level::Debug).build();
//! let request = logger.with_tag("request_id", 42);
//!
//! request.info("handled");
//! let tagged = request.with_tags(bindery::tags!["user", "alice", "retry", 2])?;
//! tagged.debug("cache miss");
//! # Ok::<(), bindery::logger::LoggerError>(())
//! ```

mod backend;
mod carrier;
mod error;

pub use backend::{BoxError, Log, TracingBackend};
pub use carrier::{from_context, new_context};
pub use error::LoggerError;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::level_filters::LevelFilter;
use tracing::Dispatch;

use crate::context::Context;

/// Log verbosity, from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    Error = 0,
    Warn = 1,
    #[default]
    Info = 2,
    Debug = 3,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            _ => Err(LoggerError::UnknownLevel(s.to_string())),
        }
    }
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => tracing::Level::ERROR,
            Level::Warn => tracing::Level::WARN,
            Level::Info => tracing::Level::INFO,
            Level::Debug => tracing::Level::DEBUG,
        }
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        LevelFilter::from_level(level.into())
    }
}

/// A tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => f.write_str(v),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! tag_value_from {
    ($variant:ident as $target:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for TagValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )*
    };
}

tag_value_from!(Int as i64: i8, i16, i32, i64);
tag_value_from!(Uint as u64: u8, u16, u32, u64);
tag_value_from!(Float as f64: f32, f64);

/// Builds a flat list of [`TagValue`]s for [`Logger::with_tags`].
#[macro_export]
macro_rules! tags {
    ($($value:expr),* $(,)?) => {
        ::std::vec![$($crate::logger::TagValue::from($value)),*]
    };
}

/// A key/value pair attached to every message of a logger.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: TagValue,
}

/// Which back-end a [`LoggerBuilder`] wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum BackendKind {
    #[default]
    Tracing,
    /// A caller-supplied implementation, see [`LoggerBuilder::custom`].
    Custom,
}

/// Builder for [`Logger`]. Settings apply in call order.
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct LoggerBuilder {
    level: Level,
    kind: BackendKind,
    dispatch: Option<Dispatch>,
    custom: Option<Arc<dyn Log>>,
}

impl LoggerBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sends events of the tracing back-end to `dispatch` instead of the
    /// default subscriber.
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Selects a caller-supplied back-end.
    pub fn custom(mut self, backend: Arc<dyn Log>) -> Self {
        self.kind = BackendKind::Custom;
        self.custom = Some(backend);
        self
    }

    /// Builds the logger.
    ///
    /// # Panics
    ///
    /// Panics if [`BackendKind::Custom`] is selected without an implementation.
    pub fn build(self) -> Logger {
        let backend: Arc<dyn Log> = match (self.kind, self.custom) {
            (BackendKind::Tracing, _) => Arc::new(match self.dispatch {
                Some(dispatch) => TracingBackend::with_dispatch(dispatch),
                None => TracingBackend::new(),
            }),
            (BackendKind::Custom, Some(custom)) => custom,
            (BackendKind::Custom, None) => {
                panic!("custom logging back-end selected without an implementation")
            }
        };

        Logger {
            level: self.level,
            backend,
            tags: Vec::new(),
        }
    }
}

/// Level-filtering, tag-carrying handle on a logging back-end.
///
/// Clones share the back-end.
#[derive(Debug, Clone)]
pub struct Logger {
    level: Level,
    backend: Arc<dyn Log>,
    tags: Vec<Tag>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// A logger writing through the dispatcher stored by [`new_context`].
    ///
    /// # Panics
    ///
    /// Panics if `ctx` holds no logger.
    pub fn from_context(ctx: &Context, level: Level) -> Self {
        Self::builder()
            .level(level)
            .dispatch(from_context(ctx).clone())
            .build()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.level >= level
    }

    pub fn info(&self, msg: &str) {
        if self.enabled(Level::Info) {
            self.backend.info(&self.render(msg));
        }
    }

    pub fn debug(&self, msg: &str) {
        if self.enabled(Level::Debug) {
            self.backend.debug(&self.render(msg));
        }
    }

    pub fn warn(&self, msg: &str) {
        if self.enabled(Level::Warn) {
            self.backend.warn(&self.render(msg));
        }
    }

    pub fn error(&self, msg: &str) {
        if self.enabled(Level::Error) {
            self.backend.error(&self.render(msg));
        }
    }

    /// Forwarded whatever the configured level.
    pub fn fatal(&self, msg: &str) {
        self.backend.fatal(&self.render(msg));
    }

    /// Returns a logger with `key=value` appended to the tags.
    #[must_use]
    pub fn with_tag(&self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        let mut tags = Vec::with_capacity(self.tags.len() + 1);
        tags.extend_from_slice(&self.tags);
        tags.push(Tag {
            key: key.into(),
            value: value.into(),
        });
        self.derive(tags)
    }

    /// Returns a logger with the alternating key/value `pairs` appended.
    ///
    /// Keys must be strings.
    pub fn with_tags<I>(&self, pairs: I) -> Result<Self, LoggerError>
    where
        I: IntoIterator<Item = TagValue>,
    {
        let pairs: Vec<TagValue> = pairs.into_iter().collect();
        if pairs.len() % 2 != 0 {
            return Err(LoggerError::OddTagCount(pairs.len()));
        }

        let mut tags = Vec::with_capacity(self.tags.len() + pairs.len() / 2);
        tags.extend_from_slice(&self.tags);
        let mut values = pairs.into_iter().enumerate();
        while let (Some((index, key)), Some((_, value))) = (values.next(), values.next()) {
            let TagValue::Str(key) = key else {
                return Err(LoggerError::NonStringKey { index });
            };
            tags.push(Tag { key, value });
        }
        Ok(self.derive(tags))
    }

    /// Shuts the back-end down, returning its error unchanged.
    pub fn shutdown(&self, ctx: &Context) -> Result<(), BoxError> {
        self.backend.shutdown(ctx)
    }

    fn derive(&self, tags: Vec<Tag>) -> Self {
        Self {
            level: self.level,
            backend: Arc::clone(&self.backend),
            tags,
        }
    }

    fn render(&self, msg: &str) -> String {
        let suffix: String = self
            .tags
            .iter()
            .map(|tag| format!(" {}={}", tag.key, tag.value))
            .collect();
        format!("{msg}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<(&'static str, String)>>,
        fail_shutdown: bool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("flush failed")]
    struct FlushError;

    impl Recorder {
        fn record(&self, level: &'static str, msg: &str) {
            self.calls.lock().unwrap().push((level, msg.to_string()));
        }

        fn levels(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().iter().map(|(l, _)| *l).collect()
        }

        fn messages(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
        }
    }

    impl Log for Recorder {
        fn info(&self, msg: &str) {
            self.record("info", msg);
        }

        fn debug(&self, msg: &str) {
            self.record("debug", msg);
        }

        fn warn(&self, msg: &str) {
            self.record("warn", msg);
        }

        fn error(&self, msg: &str) {
            self.record("error", msg);
        }

        fn fatal(&self, msg: &str) {
            self.record("fatal", msg);
        }

        fn shutdown(&self, _ctx: &Context) -> Result<(), BoxError> {
            if self.fail_shutdown {
                Err(Box::new(FlushError))
            } else {
                Ok(())
            }
        }
    }

    fn recording(level: Level) -> (Logger, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let logger = Logger::builder().level(level).custom(recorder.clone()).build();
        (logger, recorder)
    }

    fn log_everything(logger: &Logger) {
        logger.error("e");
        logger.warn("w");
        logger.info("i");
        logger.debug("d");
    }

    #[rstest]
    #[case(Level::Error, &["error"])]
    #[case(Level::Warn, &["error", "warn"])]
    #[case(Level::Info, &["error", "warn", "info"])]
    #[case(Level::Debug, &["error", "warn", "info", "debug"])]
    fn test_level_gating(#[case] level: Level, #[case] expected: &[&str]) {
        let (logger, recorder) = recording(level);
        log_everything(&logger);
        assert_eq!(recorder.levels(), expected);
    }

    #[rstest]
    #[case(Level::Error)]
    #[case(Level::Debug)]
    fn test_fatal_is_never_gated(#[case] level: Level) {
        let (logger, recorder) = recording(level);
        logger.fatal("boom");
        assert_eq!(recorder.levels(), ["fatal"]);
    }

    #[test]
    fn test_tags_are_rendered() {
        let (logger, recorder) = recording(Level::Info);
        logger
            .with_tag("port", 8080_u16)
            .with_tag("tls", false)
            .info("listening");
        assert_eq!(recorder.messages(), ["listening port=8080 tls=false"]);
    }

    #[test]
    fn test_untagged_message_is_unchanged() {
        let (logger, recorder) = recording(Level::Info);
        logger.info("plain");
        logger.with_tag("ratio", 0.5).warn("");
        assert_eq!(recorder.messages(), ["plain", " ratio=0.5"]);
    }

    #[test]
    fn test_child_tags_do_not_alias_parent() {
        let (root, _) = recording(Level::Info);
        let parent = root.with_tag("service", "api");
        let first = parent.with_tag("request", 1);
        let second = parent.with_tags(tags!["request", 2, "user", "bob"]).unwrap();

        assert_eq!(root.tags().len(), 0);
        assert_eq!(parent.tags().len(), 1);
        assert_eq!(first.tags().len(), 2);
        assert_eq!(second.tags().len(), 3);
        assert_eq!(first.tags()[1].value, TagValue::Int(1));
        assert_eq!(second.tags()[1].value, TagValue::Int(2));
        assert_eq!(parent.tags()[0].key, "service");
    }

    #[test]
    fn test_derived_logger_keeps_level_and_backend() {
        let (logger, recorder) = recording(Level::Warn);
        let child = logger.with_tag("k", "v");

        assert_eq!(child.level(), Level::Warn);
        child.info("dropped");
        child.warn("kept");
        assert_eq!(recorder.messages(), ["kept k=v"]);
    }

    #[test]
    fn test_with_tags_odd_count() {
        let (logger, _) = recording(Level::Info);
        let err = logger.with_tags(tags!["a", 1, "b"]).unwrap_err();
        assert_eq!(err, LoggerError::OddTagCount(3));
    }

    #[test]
    fn test_with_tags_non_string_key() {
        let (logger, _) = recording(Level::Info);
        let err = logger.with_tags(tags!["a", 1, 2, "b"]).unwrap_err();
        assert_eq!(err, LoggerError::NonStringKey { index: 2 });
    }

    #[test]
    fn test_with_tags_empty() {
        let (logger, _) = recording(Level::Info);
        let same = logger.with_tags(Vec::new()).unwrap();
        assert!(same.tags().is_empty());
    }

    #[test]
    fn test_shutdown_propagates_error_unchanged() {
        let recorder = Arc::new(Recorder {
            fail_shutdown: true,
            ..Default::default()
        });
        let logger = Logger::builder().custom(recorder).build();

        let err = logger.shutdown(&Context::background()).unwrap_err();
        assert!(err.downcast_ref::<FlushError>().is_some());
        assert_eq!(err.to_string(), "flush failed");
    }

    #[test]
    #[should_panic(expected = "without an implementation")]
    fn test_custom_backend_requires_implementation() {
        let _ = Logger::builder().backend(BackendKind::Custom).build();
    }

    #[test]
    fn test_builder_settings_apply_in_order() {
        let recorder = Arc::new(Recorder::default());
        let logger = Logger::builder()
            .custom(recorder.clone())
            .backend(BackendKind::Tracing)
            .level(Level::Debug)
            .level(Level::Error)
            .build();

        logger.error("to tracing");
        assert_eq!(logger.level(), Level::Error);
        assert!(recorder.levels().is_empty());
    }

    #[rstest]
    #[case("error", Level::Error)]
    #[case("WARN", Level::Warn)]
    #[case("warning", Level::Warn)]
    #[case(" info ", Level::Info)]
    #[case("debug", Level::Debug)]
    fn test_level_from_str(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(input.parse::<Level>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<Level>().unwrap(), expected);
    }

    #[test]
    fn test_level_from_str_unknown() {
        assert_eq!(
            "trace".parse::<Level>(),
            Err(LoggerError::UnknownLevel("trace".to_string()))
        );
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Info < Level::Debug);
        assert_eq!(Level::Debug as u8, 3);
        assert_eq!(LevelFilter::from(Level::Warn), LevelFilter::WARN);
    }

    #[test]
    fn test_from_context_logs_through_carrier() {
        use std::io;

        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Buffer {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let ctx = new_context(move || writer.clone(), Level::Debug);

        let logger = Logger::from_context(&ctx, Level::Info).with_tag("job", "sync");
        logger.info("started");
        logger.debug("not forwarded");

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("started job=sync"));
    }
}
