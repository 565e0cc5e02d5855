//! Task spawning and execution abstractions.
//!
//! - `spawn`: runs a future concurrently on the current Tokio runtime
//! - `detach`: fire-and-forget execution that works with or without a runtime
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     let result = handle.await.unwrap();
//!     assert_eq!(result, 42);
//! }
//! ```

use std::future::Future;

use crate::runtime;

pub use tokio::task::{yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task using the Tokio runtime.
///
/// # Panics
///
/// Panics when called outside of a Tokio runtime, like `tokio::spawn`.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Drives `future` to completion without handing back a join handle.
///
/// Inside a runtime the future is spawned onto it and this returns
/// immediately. Outside of one (plain synchronous callers) the future is run
/// to completion on a temporary runtime before returning; the error case is
/// that runtime failing to start.
pub fn detach<F>(future: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if runtime::in_runtime() {
        spawn(future);
        Ok(())
    } else {
        runtime::block_on(future)
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
