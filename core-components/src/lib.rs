//! # Core Components
//!
//! Component lifecycle and event binding.
//!
//! - [`ComponentStore`]: discovers sources for one component kind, resolves
//!   them to definitions, checks their capability lineage and constructs them
//! - [`Listener`]: a component that binds handler methods to named events and
//!   isolates their failures from the emitter
//! - [`ListenerHandler`]: owns the listener store and the named emitters
//! - [`Client`]: shared handle given to every store and component; the
//!   default event source listeners bind to
//!
//! ## Example
//!
//! ```ignore
//! let client = Client::new(config);
//! let resolver = RegistryResolver::new().with(
//!     "ready",
//!     ListenerDefinition::new("ready", ["ready"]).run(|_| Deferred::done()),
//! );
//! let handler = ListenerHandler::new(client.clone(), Arc::new(resolver));
//!
//! handler.load_all().await?;
//! client.emit("ready", &[]);
//! ```

pub mod capability;
pub mod client;
pub mod component;
pub mod definition;
pub mod error;
pub mod listener;
pub mod store;

pub use capability::Capability;
pub use client::Client;
pub use component::{Component, ComponentBase, ComponentDefaults, ComponentOptions};
pub use definition::{ComponentDefinition, RegistryResolver, Resolution, SourceResolver};
pub use error::{ComponentError, ListenerFailure, Result};
pub use listener::{
    AttachSummary, Deferred, EmitterRef, HandlerEvent, Listener, ListenerDefinition,
    ListenerHandler, ListenerMethod, ListenerOwner,
};
pub use store::{ComponentStore, LoadOutcome, LoadSummary, Store, StoreEvent, StoreOptions};
