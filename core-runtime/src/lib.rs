//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the component core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Named-event emitters and typed event buses
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the component crates depend on.
//! It establishes the logging conventions, the configuration builder, and the
//! event primitives listeners bind to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
