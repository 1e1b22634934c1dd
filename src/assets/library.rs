//! Top-level resource library
//!
//! Owns every [`Group`] and fans lifecycle calls out to them. The rest of the
//! engine talks to resources through here: mount groups at startup, load and
//! unload them as scenes change, and call [`Library::update`] once per tick.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use super::group::Group;
use super::handle::Handle;
use super::script::{ScriptNamespace, ScriptTable};
use super::state::StateCounts;
use crate::core::config::{DEFAULT_SCRIPT_EXTENSION, LibraryConfig};

/// Builds the script namespace for a newly mounted group
pub type NamespaceFactory = Box<dyn Fn(&str) -> Box<dyn ScriptNamespace>>;

/// Registry of resource groups
pub struct Library {
    groups: FxHashMap<String, Group>,
    script_extension: String,
    namespace_factory: NamespaceFactory,
}

impl Library {
    /// Create an empty library
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: FxHashMap::default(),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            namespace_factory: Box::new(|_| Box::new(ScriptTable::new())),
        }
    }

    /// Create a library and mount every group listed in `config`
    #[must_use]
    pub fn from_config(config: &LibraryConfig) -> Self {
        let mut library = Self::new();
        library.script_extension = config.script_extension.clone();
        for mount in &config.mounts {
            library.mount(&mount.group, mount.path.clone());
        }
        library
    }

    /// Use `factory` to build the script namespace of each new group
    #[must_use]
    pub fn with_namespace_factory(
        mut self,
        factory: impl Fn(&str) -> Box<dyn ScriptNamespace> + 'static,
    ) -> Self {
        self.namespace_factory = Box::new(factory);
        self
    }

    /// Mount `group` at `path`, creating the group if needed.
    ///
    /// Scans the mount point for scripts and returns the group so loaders
    /// can be registered on it.
    pub fn mount(&mut self, group: &str, path: impl Into<PathBuf>) -> &mut Group {
        let factory = &self.namespace_factory;
        let entry = self
            .groups
            .entry(group.to_owned())
            .or_insert_with(|| Group::with_namespace(group, factory(group)));

        entry.set_script_extension(self.script_extension.as_str());
        entry.mount(path);
        entry.scan_for_scripts();
        log::info!(
            "Mounted group '{}' at {}",
            group,
            entry.mount_point().display()
        );
        entry
    }

    /// Group by name
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Group by name, mutably
    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.get_mut(name)
    }

    /// Names of all groups, sorted
    #[must_use]
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Load every group, in name order
    pub fn load_all_groups(&mut self) {
        for name in self.sorted_names() {
            self.load_group(&name);
        }
    }

    /// Load one group. Unknown names are a no-op.
    pub fn load_group(&mut self, name: &str) {
        match self.groups.get_mut(name) {
            Some(group) => {
                group.load();
            }
            None => log::debug!("load_group: no group named '{name}'"),
        }
    }

    /// Unload every group, in name order
    pub fn unload_all_groups(&mut self) {
        for name in self.sorted_names() {
            self.unload_group(&name);
        }
    }

    /// Unload one group. Unknown names are a no-op.
    pub fn unload_group(&mut self, name: &str) {
        match self.groups.get_mut(name) {
            Some(group) => group.unload(),
            None => log::debug!("unload_group: no group named '{name}'"),
        }
    }

    /// Per-tick hook: update every group
    pub fn update(&mut self) {
        for group in self.groups.values_mut() {
            group.update();
        }
    }

    /// Handle for `name` of type `T` in `group`.
    ///
    /// An unknown group, a group without a loader for `T`, and an unknown
    /// name all give the same invalid handle.
    #[must_use]
    pub fn get<T: 'static>(&self, group: &str, name: &str) -> Handle<T> {
        match self.groups.get(group) {
            Some(group) => group.get(name),
            None => {
                log::warn!("No group named '{group}'");
                Handle::invalid()
            }
        }
    }

    /// Whether `group` holds a `T` named `name`
    #[must_use]
    pub fn has<T: 'static>(&self, group: &str, name: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|group| group.has::<T>(name))
    }

    /// Per-state counts across every group
    #[must_use]
    pub fn resource_state(&self) -> StateCounts {
        let mut counts = StateCounts::new();
        for group in self.groups.values() {
            counts.merge(&group.resource_state());
        }
        counts
    }

    fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("groups", &self.group_names())
            .field("script_extension", &self.script_extension)
            .finish_non_exhaustive()
    }
}
