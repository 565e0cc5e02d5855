use std::fmt;

/// A named kind a component definition can claim to be.
///
/// Definitions declare their full lineage (e.g. component → module →
/// listener). A store only constructs definitions whose lineage contains the
/// capability it handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability(&'static str);

impl Capability {
    pub const COMPONENT: Capability = Capability("component");
    pub const MODULE: Capability = Capability("module");
    pub const LISTENER: Capability = Capability("listener");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
