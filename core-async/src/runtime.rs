//! Runtime utilities that abstract over the underlying async executor.
//!
//! We wrap Tokio's runtime primitives so that downstream crates never need to
//! depend on Tokio directly.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread runtime.
///
/// Timers and I/O are enabled, so the future may use Tokio resources from its
/// very first poll. Fails only when the runtime itself cannot be built.
///
/// Must not be called from within an async context; callers that may already
/// be inside a runtime should check [`in_runtime`] first.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Returns `true` when called from inside a Tokio runtime.
pub fn in_runtime() -> bool {
    Handle::try_current().is_ok()
}
