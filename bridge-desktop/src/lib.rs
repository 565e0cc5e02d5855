//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `SourceDiscovery` using `tokio::fs` directory walking
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::FsSourceDiscovery;
//! use bridge_traits::SourceDiscovery;
//!
//! #[tokio::main]
//! async fn main() {
//!     let discovery = FsSourceDiscovery::new("./components").with_extensions(["toml"]);
//!     let sources = discovery.discover("listeners").await.unwrap();
//! }
//! ```

mod discovery;

pub use discovery::FsSourceDiscovery;
