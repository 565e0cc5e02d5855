//! Event to handler method resolution.

use super::ListenerMethod;
use crate::error::{ComponentError, Result};
use std::collections::HashMap;

/// Name of the method handling `event` by convention: `ready` → `onReady`.
pub fn conventional_method_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// The handler for each configured event, fixed when the listener is built.
#[derive(Clone, Default)]
pub(crate) struct MethodTable {
    methods: HashMap<String, ListenerMethod>,
}

impl MethodTable {
    /// A single event is always handled by `run`. With several events each one
    /// uses the method named by `map` if it exists, otherwise the conventional
    /// `on<Event>` method.
    pub(crate) fn resolve(
        listener: &str,
        events: &[String],
        map: &HashMap<String, String>,
        run: &ListenerMethod,
        methods: &HashMap<String, ListenerMethod>,
    ) -> Result<Self> {
        if let [event] = events {
            let mut table = HashMap::with_capacity(1);
            table.insert(event.clone(), run.clone());
            return Ok(Self { methods: table });
        }

        let mut table = HashMap::with_capacity(events.len());
        for event in events {
            let mapped = map.get(event).and_then(|name| methods.get(name));

            let method = match mapped {
                Some(method) => method.clone(),
                None => {
                    let name = conventional_method_name(event);
                    methods
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| ComponentError::MissingMethod {
                            listener: listener.to_string(),
                            event: event.clone(),
                            method: name,
                        })?
                }
            };
            table.insert(event.clone(), method);
        }

        Ok(Self { methods: table })
    }

    pub(crate) fn get(&self, event: &str) -> Option<&ListenerMethod> {
        self.methods.get(event)
    }
}
