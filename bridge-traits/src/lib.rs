//! # Host Bridge Traits
//!
//! Capability traits the component core requires from its host.
//!
//! ## Overview
//!
//! The core never walks directories or writes log lines to a host console on
//! its own. Those concerns differ per platform, so they are expressed here as
//! traits and implemented by a bridge crate (`bridge-desktop` for desktop
//! targets) or by the embedding application.
//!
//! ## Traits
//!
//! - [`SourceDiscovery`](discovery::SourceDiscovery) - Enumerate the sources a store loads
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and include the offending path or
//! key in the message.
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync` so implementations can be shared through
//! `Arc` between the client and every store.

pub mod discovery;
pub mod error;
pub mod logging;

pub use error::BridgeError;

pub use discovery::SourceDiscovery;
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
