//! Runtime-agnostic async abstraction layer for the component core.
//!
//! Every other crate in the workspace depends on this crate instead of reaching
//! for Tokio directly. The surface is intentionally small:
//!
//! - `task`: spawning work, and `detach` for callers that may lack a runtime
//! - `runtime`: runtime discovery (`Handle::try_current`) and `block_on`
//! - `sync`: the broadcast channel backing typed event buses
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;

pub use task::{detach, spawn};
