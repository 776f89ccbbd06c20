//! Carries a structured logger inside a [`Context`].

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

use super::Level;
use crate::context::Context;

struct LoggerKey;

/// Returns a background context holding a JSON logger that writes to
/// `writer` and drops events more verbose than `level`.
///
/// Call this once at the start of the program and derive every other
/// context from the result.
pub fn new_context<W>(writer: W, level: Level) -> Context
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(writer)
        .with_max_level(tracing::Level::from(level))
        .finish();
    Context::background().with_value::<LoggerKey, _>(Dispatch::new(subscriber))
}

/// The logger stored by [`new_context`].
///
/// # Panics
///
/// Panics if `ctx` holds no logger.
pub fn from_context(ctx: &Context) -> &Dispatch {
    match ctx.value_as::<LoggerKey, Dispatch>() {
        Some(dispatch) => dispatch,
        None => panic!("no logger in context"),
    }
}
