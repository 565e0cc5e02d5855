//! Workspace placeholder crate.
//!
//! Re-exports the component core and exposes the shared feature flags.
//! Host applications can depend on `blade-workspace` and enable
//! `desktop-shims` to get filesystem source discovery without wiring
//! `core-runtime` and `bridge-desktop` themselves.

pub use core_components::*;
