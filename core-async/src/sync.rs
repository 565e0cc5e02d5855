//! Synchronization primitives.
//!
//! Re-exports the Tokio broadcast channel backing the event buses, plus the
//! async mutex, so that callers never import Tokio directly.

pub use tokio::sync::{broadcast, Mutex};
