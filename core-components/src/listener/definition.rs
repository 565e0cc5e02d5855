use super::{Deferred, EmitterRef, Listener, ListenerMethod};
use crate::capability::Capability;
use crate::component::ComponentOptions;
use crate::definition::ComponentDefinition;
use crate::error::Result;
use crate::store::ComponentStore;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const LISTENER_LINEAGE: [Capability; 3] = [
    Capability::COMPONENT,
    Capability::MODULE,
    Capability::LISTENER,
];

/// Configuration of a listener, as declared by its definition.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    pub component: ComponentOptions,
    pub events: Vec<String>,
    pub once: bool,
    pub emitter: EmitterRef,
    /// Event → method name overrides, consulted only with several events.
    pub map: HashMap<String, String>,
}

/// Declares a listener: its options plus the methods that handle its events.
///
/// ```ignore
/// let definition = ListenerDefinition::new("presence", ["online", "offline"])
///     .map("offline", "onGone")
///     .method("onOnline", |args| Deferred::ok(args[0].clone()))
///     .method("onGone", |_| Deferred::done());
/// ```
#[derive(Clone)]
pub struct ListenerDefinition {
    options: ListenerOptions,
    run: ListenerMethod,
    methods: HashMap<String, ListenerMethod>,
}

impl ListenerDefinition {
    pub fn new<I, S>(name: impl Into<String>, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: ListenerOptions {
                component: ComponentOptions::new(name),
                events: events.into_iter().map(Into::into).collect(),
                once: false,
                emitter: EmitterRef::Client,
                map: HashMap::new(),
            },
            run: Arc::new(|_| Deferred::done()),
            methods: HashMap::new(),
        }
    }

    pub fn once(mut self, once: bool) -> Self {
        self.options.once = once;
        self
    }

    pub fn emitter(mut self, emitter: EmitterRef) -> Self {
        self.options.emitter = emitter;
        self
    }

    pub fn map(mut self, event: impl Into<String>, method: impl Into<String>) -> Self {
        self.options.map.insert(event.into(), method.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.options.component.enabled = Some(enabled);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.options.component.category = Some(category.into());
        self
    }

    /// The handler used when exactly one event is configured.
    pub fn run<F>(mut self, run: F) -> Self
    where
        F: Fn(&[Value]) -> Deferred + Send + Sync + 'static,
    {
        self.run = Arc::new(run);
        self
    }

    /// A named handler method, picked up by convention (`on<Event>`) or through `map`.
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&[Value]) -> Deferred + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn options(&self) -> &ListenerOptions {
        &self.options
    }

    pub(crate) fn run_method(&self) -> &ListenerMethod {
        &self.run
    }

    pub(crate) fn methods(&self) -> &HashMap<String, ListenerMethod> {
        &self.methods
    }
}

impl ComponentDefinition<Listener> for ListenerDefinition {
    fn name(&self) -> &str {
        &self.options.component.name
    }

    fn lineage(&self) -> &[Capability] {
        &LISTENER_LINEAGE
    }

    fn construct(&self, store: &Arc<ComponentStore<Listener>>) -> Result<()> {
        Listener::new(store, self).map(|_| ())
    }
}

impl fmt::Debug for ListenerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("ListenerDefinition")
            .field("options", &self.options)
            .field("methods", &methods)
            .finish_non_exhaustive()
    }
}
