//! Request-scoped context: values keyed by type, a deadline and cancellation.
//!
//! A [`Context`] is immutable. Every `with_*` call returns a child that sees
//! everything its parent sees plus the new entry; the parent is never touched.
//! Clones are cheap and can be sent across threads.
//!
//! ## Example
//!
//! ```
//! use bindery::context::Context;
//! use std::time::Duration;
//!
//! struct RequestId;
//!
//! let ctx = Context::background().with_value::<RequestId, _>(42_u64);
//! let (ctx, cancel) = ctx.with_timeout(Duration::from_secs(5)).with_cancel();
//!
//! assert_eq!(ctx.value_as::<RequestId, u64>(), Some(&42));
//! assert!(ctx.err().is_none());
//!
//! cancel.cancel();
//! assert!(ctx.is_done());
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

type Value = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<TypeId, (&'static str, Value)>>,
    deadline: Option<Instant>,
    cancels: Arc<Vec<Arc<AtomicBool>>>,
}

impl Context {
    /// An empty context that is never done.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a child carrying `value` under the key type `K`.
    ///
    /// A value already stored under `K` is shadowed in the child only.
    #[must_use]
    pub fn with_value<K: 'static, V: Any + Send + Sync>(&self, value: V) -> Self {
        let value: Value = Arc::new(value);
        let mut child = self.clone();
        Arc::make_mut(&mut child.values).insert(TypeId::of::<K>(), (type_name::<K>(), value));
        child
    }

    /// The value stored under the key type `K`, whatever its type.
    pub fn value<K: 'static>(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.values.get(&TypeId::of::<K>()).map(|(_, value)| value.as_ref())
    }

    /// The value stored under `K` if it is a `V`.
    pub fn value_as<K: 'static, V: Any>(&self) -> Option<&V> {
        self.value::<K>().and_then(|value| value.downcast_ref::<V>())
    }

    /// Returns a child that is done once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Returns a child that is done at `deadline`, or earlier if the parent's
    /// deadline comes first.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        child
    }

    /// Returns a child and the handle that cancels it.
    ///
    /// Cancelling the child does not affect the parent. Cancelling a parent
    /// created with `with_cancel` also cancels every child derived from it.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let mut child = self.clone();
        Arc::make_mut(&mut child.cancels).push(Arc::clone(&flag));
        (child, CancelHandle { flag })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `None` while the context is live, otherwise the reason it is done.
    /// Cancellation takes priority over an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancels.iter().any(|flag| flag.load(Ordering::Acquire)) {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.values().map(|(name, _)| *name).collect();
        keys.sort_unstable();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("deadline", &self.deadline)
            .field("err", &self.err())
            .finish()
    }
}

/// Cancels the context returned alongside it by [`Context::with_cancel`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}
