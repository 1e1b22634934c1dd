//! Scripting namespace seam
//!
//! Every group exposes its loaders to an embedded scripting layer. The layer
//! itself lives outside this crate; loaders only see [`ScriptNamespace`].

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Functions every loader binding exposes by default
pub const LOADER_FUNCTIONS: [&str; 5] = ["get", "has", "load", "unload", "reload"];

/// A named table of callables registered into a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBinding {
    /// Resource type the table operates on
    pub type_name: &'static str,
    /// Callable names in the table
    pub functions: SmallVec<[&'static str; 8]>,
}

impl ScriptBinding {
    /// Empty table for `type_name`
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            functions: SmallVec::new(),
        }
    }

    /// Standard loader table: `get`, `has`, `load`, `unload`, `reload`
    #[must_use]
    pub fn loader(type_name: &'static str) -> Self {
        Self {
            type_name,
            functions: LOADER_FUNCTIONS.into_iter().collect(),
        }
    }

    /// Add a callable
    #[must_use]
    pub fn with_function(mut self, name: &'static str) -> Self {
        if !self.functions.contains(&name) {
            self.functions.push(name);
        }
        self
    }
}

/// Sink a group's loaders register themselves into
pub trait ScriptNamespace {
    /// Register (or replace) the table called `name`
    fn register(&mut self, name: &str, binding: ScriptBinding);
}

/// In-memory namespace; the default when no scripting layer is injected
#[derive(Debug, Default, Clone)]
pub struct ScriptTable {
    bindings: FxHashMap<String, ScriptBinding>,
}

impl ScriptTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding registered under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScriptBinding> {
        self.bindings.get(name)
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl ScriptNamespace for ScriptTable {
    fn register(&mut self, name: &str, binding: ScriptBinding) {
        if self.bindings.insert(name.to_owned(), binding).is_some() {
            log::debug!("Replaced script binding '{name}'");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_binding() {
        let binding = ScriptBinding::loader("Texture").with_function("load");
        assert_eq!(binding.type_name, "Texture");
        assert_eq!(binding.functions.as_slice(), &LOADER_FUNCTIONS);

        let binding = binding.with_function("atlas");
        assert_eq!(binding.functions.len(), 6);
    }

    #[test]
    fn test_table_register() {
        let mut table = ScriptTable::new();
        table.register("Texture", ScriptBinding::loader("Texture"));
        table.register("Font", ScriptBinding::new("Font"));
        table.register("Font", ScriptBinding::loader("Font"));

        assert_eq!(table.len(), 2);
        assert_eq!(table.names(), vec!["Font", "Texture"]);
        assert_eq!(table.get("Font").unwrap().functions.len(), 5);
        assert!(!table.contains("Sound"));
    }
}
