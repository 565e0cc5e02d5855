//! Handler results that may or may not be settled yet.

use crate::error::{panic_message, ListenerFailure};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type HandlerResult = std::result::Result<Value, anyhow::Error>;

/// What a listener method returns: a settled result or a future of one.
pub enum Deferred {
    Ready(HandlerResult),
    Pending(BoxFuture<'static, HandlerResult>),
}

impl Deferred {
    pub fn ok(value: Value) -> Self {
        Deferred::Ready(Ok(value))
    }

    /// Settled with no value.
    pub fn done() -> Self {
        Deferred::Ready(Ok(Value::Null))
    }

    pub fn err(error: impl Into<anyhow::Error>) -> Self {
        Deferred::Ready(Err(error.into()))
    }

    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Deferred::Pending(future.boxed())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    /// Drives the result to completion and hands it to `on_settled`.
    ///
    /// Ready results settle inline. Outside a runtime a pending result is
    /// blocked on, start to finish, inside a temporary runtime so it can use
    /// timers and I/O. Inside one it is polled once inline and, if still
    /// pending, finished on that runtime. Panics while polling settle as
    /// [`ListenerFailure::Panicked`].
    pub(crate) fn settle<F>(self, on_settled: F)
    where
        F: FnOnce(Result<Value, ListenerFailure>) + Send + 'static,
    {
        let mut future = match self {
            Deferred::Ready(result) => {
                on_settled(result.map_err(ListenerFailure::Handler));
                return;
            }
            Deferred::Pending(future) => future,
        };

        if !core_async::runtime::in_runtime() {
            let settled = core_async::runtime::block_on(AssertUnwindSafe(future).catch_unwind());
            let outcome = match settled {
                Ok(Ok(result)) => result.map_err(ListenerFailure::Handler),
                Ok(Err(payload)) => Err(ListenerFailure::Panicked(panic_message(payload.as_ref()))),
                Err(err) => Err(ListenerFailure::Runtime(err)),
            };
            on_settled(outcome);
            return;
        }

        match catch_unwind(AssertUnwindSafe(|| (&mut future).now_or_never())) {
            Ok(Some(result)) => {
                on_settled(result.map_err(ListenerFailure::Handler));
                return;
            }
            Ok(None) => {}
            Err(payload) => {
                on_settled(Err(ListenerFailure::Panicked(panic_message(payload.as_ref()))));
                return;
            }
        }

        core_async::spawn(async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result.map_err(ListenerFailure::Handler),
                Err(payload) => Err(ListenerFailure::Panicked(panic_message(payload.as_ref()))),
            };
            on_settled(outcome);
        });
    }
}

impl From<HandlerResult> for Deferred {
    fn from(result: HandlerResult) -> Self {
        Deferred::Ready(result)
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Deferred::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Deferred::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
