//! Logging back-ends.

use std::fmt;

use tracing::Dispatch;

use crate::context::Context;

/// Error returned by a back-end's shutdown hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The contract every logging back-end fulfils.
///
/// Messages arrive fully rendered, tags included. The façade has already
/// applied level filtering; a back-end should emit what it receives.
pub trait Log: Send + Sync + fmt::Debug {
    fn info(&self, msg: &str);
    fn debug(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);

    /// Logs an unrecoverable condition. Implementations must not exit the
    /// process; that decision stays with the caller.
    fn fatal(&self, msg: &str);

    /// Flushes and releases the back-end, giving up once `ctx` is done.
    fn shutdown(&self, ctx: &Context) -> Result<(), BoxError>;
}

/// Emits `tracing` events.
///
/// Without a dispatcher events go to the thread's default subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingBackend {
    dispatch: Option<Dispatch>,
}

impl TracingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every event through `dispatch`.
    pub fn with_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    fn emit(&self, event: impl FnOnce()) {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, event),
            None => event(),
        }
    }
}

impl Log for TracingBackend {
    fn info(&self, msg: &str) {
        self.emit(|| tracing::info!("{msg}"));
    }

    fn debug(&self, msg: &str) {
        self.emit(|| tracing::debug!("{msg}"));
    }

    fn warn(&self, msg: &str) {
        self.emit(|| tracing::warn!("{msg}"));
    }

    fn error(&self, msg: &str) {
        self.emit(|| tracing::error!("{msg}"));
    }

    fn fatal(&self, msg: &str) {
        self.emit(|| tracing::error!(fatal = true, "{msg}"));
    }

    fn shutdown(&self, ctx: &Context) -> Result<(), BoxError> {
        match ctx.err() {
            Some(err) => Err(Box::new(err)),
            None => Ok(()),
        }
    }
}
