//! Resource groups
//!
//! A group bundles one loader per resource type behind a shared mount point
//! and drives them through the same lifecycle:
//!
//! ```text
//! Unmounted --mount()--> Mounted --load()--> Loaded --unload()--> Mounted
//! ```
//!
//! `load()` is a two-pass barrier: every loader finishes its Loading phase
//! before any loader starts Preparing, so a loader that wires
//! cross-references (an atlas over raw images) sees the whole group's raw
//! resources.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::handle::Handle;
use super::loader::{ErasedLoader, Loader, LoaderRef, Phase, ResourceLoader, short_type_name};
use super::mount;
use super::script::{ScriptNamespace, ScriptTable};
use super::state::StateCounts;
use crate::core::config::DEFAULT_SCRIPT_EXTENSION;
use crate::core::error::{ResourceError, ResourceResult};

/// Where a group is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupState {
    /// No mount point assigned yet
    #[default]
    Unmounted,
    /// Mounted, nothing loaded
    Mounted,
    /// `load()` completed
    Loaded,
}

/// A registered loader, kept both type-erased and as `dyn Any` for typed access
struct LoaderEntry {
    erased: Rc<RefCell<dyn ErasedLoader>>,
    typed: Rc<dyn Any>,
}

/// Named bundle of loaders sharing a mount point and lifecycle
pub struct Group {
    name: String,
    mount_point: PathBuf,
    state: GroupState,
    /// Loaders in registration order
    loaders: Vec<LoaderEntry>,
    /// Resource type to index in `loaders`
    by_type: FxHashMap<TypeId, usize>,
    scripts: Vec<PathBuf>,
    script_extension: String,
    namespace: Box<dyn ScriptNamespace>,
}

impl Group {
    /// Create an unmounted group with an in-memory script namespace
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_namespace(name, Box::new(ScriptTable::new()))
    }

    /// Create an unmounted group that registers loaders into `namespace`
    #[must_use]
    pub fn with_namespace(name: impl Into<String>, namespace: Box<dyn ScriptNamespace>) -> Self {
        Self {
            name: name.into(),
            mount_point: PathBuf::new(),
            state: GroupState::Unmounted,
            loaders: Vec::new(),
            by_type: FxHashMap::default(),
            scripts: Vec::new(),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            namespace,
        }
    }

    /// Group name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory or archive the group reads from
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Script files found by the last [`scan_for_scripts`](Self::scan_for_scripts)
    #[must_use]
    pub fn scripts(&self) -> &[PathBuf] {
        &self.scripts
    }

    /// Number of registered loaders
    #[must_use]
    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }

    /// Set the extension `scan_for_scripts` looks for
    pub fn set_script_extension(&mut self, extension: impl Into<String>) {
        self.script_extension = extension.into();
    }

    /// Assign the mount point and rebind every loader to it
    pub fn mount(&mut self, path: impl Into<PathBuf>) {
        self.mount_point = path.into();
        for entry in &self.loaders {
            match entry.erased.try_borrow_mut() {
                Ok(mut loader) => loader.bind(&self.name, &self.mount_point),
                Err(_) => log::error!("Cannot rebind a busy loader in group '{}'", self.name),
            }
        }
        if self.state == GroupState::Unmounted {
            self.state = GroupState::Mounted;
        }
        log::debug!(
            "Mounted group '{}' at {}",
            self.name,
            self.mount_point.display()
        );
    }

    /// Register the loader for `L::Resource`.
    ///
    /// The loader is bound to this group's mount point and exposed to the
    /// script namespace. Only one loader per resource type is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DuplicateLoader`] if the resource type already
    /// has a loader in this group.
    pub fn register_loader<L: ResourceLoader>(&mut self, backend: L) -> ResourceResult<LoaderRef<L>> {
        let type_id = TypeId::of::<L::Resource>();
        let type_name = short_type_name::<L::Resource>();
        if self.by_type.contains_key(&type_id) {
            log::error!(
                "Group '{}' already has a loader for {}",
                self.name,
                type_name
            );
            return Err(ResourceError::DuplicateLoader {
                group: self.name.clone(),
                type_name,
            });
        }

        let loader = Loader::new(backend);
        {
            let mut borrowed = loader.borrow_mut();
            ErasedLoader::bind(&mut *borrowed, &self.name, &self.mount_point);
            ErasedLoader::register_wrapper(&*borrowed, self.namespace.as_mut());
        }

        let erased: Rc<RefCell<dyn ErasedLoader>> = loader.clone();
        let typed: Rc<dyn Any> = loader.clone();
        self.by_type.insert(type_id, self.loaders.len());
        self.loaders.push(LoaderEntry { erased, typed });
        log::debug!("Registered {} loader in group '{}'", type_name, self.name);

        Ok(loader)
    }

    /// The registered loader of concrete type `L`, if that is what handles
    /// `L::Resource` here
    #[must_use]
    pub fn loader<L: ResourceLoader>(&self) -> Option<LoaderRef<L>> {
        let index = *self.by_type.get(&TypeId::of::<L::Resource>())?;
        Rc::clone(&self.loaders[index].typed)
            .downcast::<RefCell<Loader<L>>>()
            .ok()
    }

    fn erased<T: 'static>(&self) -> Option<&Rc<RefCell<dyn ErasedLoader>>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|&index| &self.loaders[index].erased)
    }

    /// Handle for `name` of type `T`.
    ///
    /// Invalid if no loader handles `T` here or the name is unknown.
    #[must_use]
    pub fn get<T: 'static>(&self, name: &str) -> Handle<T> {
        let Some(loader) = self.erased::<T>() else {
            log::warn!(
                "Group '{}' has no loader for {}",
                self.name,
                short_type_name::<T>()
            );
            return Handle::invalid();
        };
        let Ok(loader) = loader.try_borrow() else {
            log::error!(
                "Cannot look up '{}': {} loader is busy",
                name,
                short_type_name::<T>()
            );
            return Handle::invalid();
        };

        match loader.get_untyped(name) {
            Some(boxed) => boxed
                .downcast::<Handle<T>>()
                .map(|handle| *handle)
                .unwrap_or_default(),
            None => {
                log::warn!(
                    "No {} named '{}' in group '{}'",
                    short_type_name::<T>(),
                    name,
                    self.name
                );
                Handle::invalid()
            }
        }
    }

    /// Whether a `T` named `name` exists in this group
    #[must_use]
    pub fn has<T: 'static>(&self, name: &str) -> bool {
        self.erased::<T>()
            .and_then(|loader| loader.try_borrow().ok().map(|loader| loader.has(name)))
            .unwrap_or(false)
    }

    /// Collect script files under the mount point; returns how many were found
    pub fn scan_for_scripts(&mut self) -> usize {
        self.scripts = mount::scan_files(&self.mount_point, &self.script_extension);
        log::debug!(
            "Found {} script(s) in group '{}'",
            self.scripts.len(),
            self.name
        );
        self.scripts.len()
    }

    /// Run Loading across all loaders, then Preparing across all loaders.
    ///
    /// Refused (returns `false`) while the group is unmounted.
    pub fn load(&mut self) -> bool {
        if self.state == GroupState::Unmounted {
            log::warn!("Cannot load group '{}': not mounted", self.name);
            return false;
        }

        log::info!(
            "Loading group '{}' from {}",
            self.name,
            self.mount_point.display()
        );
        self.run_phase(Phase::Loading);
        self.run_phase(Phase::Preparing);
        self.state = GroupState::Loaded;

        log::info!("Group '{}' loaded: {}", self.name, self.resource_state());
        true
    }

    /// Run the Unloading phase; every loader releases all its resources.
    ///
    /// Loaders are visited in reverse registration order.
    pub fn unload(&mut self) {
        log::info!("Unloading group '{}'", self.name);
        self.run_phase(Phase::Unloading);
        if self.state == GroupState::Loaded {
            self.state = GroupState::Mounted;
        }
    }

    /// Run the Updating phase; skipped unless the group is loaded
    pub fn update(&mut self) {
        if self.state == GroupState::Loaded {
            self.run_phase(Phase::Updating);
        }
    }

    /// Per-state counts merged across every loader
    #[must_use]
    pub fn resource_state(&self) -> StateCounts {
        let mut counts = StateCounts::new();
        for entry in &self.loaders {
            match entry.erased.try_borrow() {
                Ok(loader) => counts.merge(&loader.resource_state()),
                Err(_) => log::warn!(
                    "Group '{}': leaving a busy loader out of the resource counts",
                    self.name
                ),
            }
        }
        counts
    }

    fn run_phase(&self, phase: Phase) {
        log::debug!("Group '{}': {:?} phase", self.name, phase);

        let run = |entry: &LoaderEntry| match entry.erased.try_borrow_mut() {
            Ok(mut loader) => loader.run_phase(phase),
            Err(_) => log::error!(
                "Skipping {:?} for a busy loader in group '{}'",
                phase,
                self.name
            ),
        };

        if phase == Phase::Unloading {
            self.loaders.iter().rev().for_each(run);
        } else {
            self.loaders.iter().for_each(run);
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("mount_point", &self.mount_point)
            .field("state", &self.state)
            .field("loaders", &self.loaders.len())
            .field("scripts", &self.scripts.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::loader::{LoadContext, PhasePass};
    use crate::assets::script::ScriptBinding;
    use crate::assets::state::ResourceState;
    use std::fs;
    use std::marker::PhantomData;

    type CallLog = Rc<RefCell<Vec<String>>>;

    #[derive(Debug, Default)]
    struct Image(u32);

    #[derive(Debug, Default)]
    struct Atlas(u32);

    /// Creates and loads one resource per phase call, recording every hook
    struct Recorder<T> {
        label: &'static str,
        log: CallLog,
        _marker: PhantomData<T>,
    }

    impl<T> Recorder<T> {
        fn new(label: &'static str, log: &CallLog) -> Self {
            Self {
                label,
                log: Rc::clone(log),
                _marker: PhantomData,
            }
        }

        fn note(&self, event: &str) {
            self.log.borrow_mut().push(format!("{}:{event}", self.label));
        }
    }

    impl<T: Default + 'static> ResourceLoader for Recorder<T> {
        type Resource = T;

        fn do_load(&mut self, name: &str, _object: &mut T, _cx: &LoadContext<'_>) -> bool {
            self.note(&format!("load {name}"));
            true
        }

        fn do_unload(&mut self, handle: &Handle<T>, _greedy: bool, _pass: &mut PhasePass<'_, T>) {
            self.note(&format!("unload {}", handle.name().unwrap_or_default()));
        }

        fn on_loading(&mut self, pass: &mut PhasePass<'_, T>) {
            self.note("loading");
            pass.get_or_create("main", T::default);
            pass.load(self, "main");
        }

        fn on_preparing(&mut self, _pass: &mut PhasePass<'_, T>) {
            self.note("preparing");
        }

        fn on_unloading(&mut self, _pass: &mut PhasePass<'_, T>) {
            self.note("unloading");
        }

        fn on_updating(&mut self, _pass: &mut PhasePass<'_, T>) {
            self.note("updating");
        }
    }

    /// Packs every loaded image into one `sheet` while preparing
    struct AtlasBuilder {
        images: Rc<RefCell<Option<LoaderRef<Recorder<Image>>>>>,
    }

    impl ResourceLoader for AtlasBuilder {
        type Resource = Atlas;

        fn do_load(&mut self, _name: &str, _atlas: &mut Atlas, _cx: &LoadContext<'_>) -> bool {
            true
        }

        fn on_preparing(&mut self, pass: &mut PhasePass<'_, Atlas>) {
            let packed = self.images.borrow().as_ref().map_or(0, |images| {
                let images = images.borrow();
                images
                    .names()
                    .iter()
                    .filter(|name| images.get(name).is_loaded())
                    .count()
            });
            let sheet = pass.get_or_create("sheet", Atlas::default);
            sheet.with_mut(|atlas| atlas.0 = packed as u32);
            pass.load(self, "sheet");
        }
    }

    fn mounted_group(log: &CallLog) -> Group {
        let mut group = Group::new("level");
        group.mount("assets/level");
        group
            .register_loader(Recorder::<Image>::new("image", log))
            .unwrap();
        group
            .register_loader(Recorder::<Atlas>::new("atlas", log))
            .unwrap();
        group
    }

    #[test]
    fn test_loading_completes_before_preparing() {
        let log = CallLog::default();
        let mut group = mounted_group(&log);

        assert!(group.load());
        assert_eq!(group.state(), GroupState::Loaded);
        assert_eq!(
            *log.borrow(),
            vec![
                "image:loading",
                "image:load main",
                "atlas:loading",
                "atlas:load main",
                "image:preparing",
                "atlas:preparing",
            ]
        );
    }

    #[test]
    fn test_preparing_sees_raw_resources_of_later_loaders() {
        let log = CallLog::default();
        let images = Rc::new(RefCell::new(None));
        let mut group = Group::new("level");
        group.mount("assets/level");
        // Registered before the loader it reads from
        group
            .register_loader(AtlasBuilder {
                images: Rc::clone(&images),
            })
            .unwrap();
        let image_loader = group
            .register_loader(Recorder::<Image>::new("image", &log))
            .unwrap();
        *images.borrow_mut() = Some(image_loader);

        assert!(group.load());

        let sheet = group.get::<Atlas>("sheet");
        assert!(sheet.is_loaded());
        assert_eq!(sheet.with(|atlas| atlas.0), Some(1));
    }

    #[test]
    fn test_resource_state_skips_busy_loader() {
        let log = CallLog::default();
        let mut group = mounted_group(&log);
        group.load();
        assert_eq!(group.resource_state().total(), 2);

        let images = group.loader::<Recorder<Image>>().unwrap();
        let _busy = images.borrow_mut();
        assert_eq!(group.resource_state().total(), 1);
    }

    #[test]
    fn test_unload_reverse_order_releases_everything() {
        let log = CallLog::default();
        let mut group = mounted_group(&log);
        group.load();
        let image = group.get::<Image>("main");
        assert!(image.valid());
        log.borrow_mut().clear();

        group.unload();

        assert_eq!(group.state(), GroupState::Mounted);
        assert!(!image.valid());
        assert!(!group.has::<Image>("main"));
        assert_eq!(group.resource_state().total(), 0);
        assert_eq!(
            *log.borrow(),
            vec![
                "atlas:unloading",
                "atlas:unload main",
                "image:unloading",
                "image:unload main",
            ]
        );
    }

    #[test]
    fn test_update_only_while_loaded() {
        let log = CallLog::default();
        let mut group = mounted_group(&log);

        group.update();
        assert!(log.borrow().is_empty());

        group.load();
        log.borrow_mut().clear();
        group.update();
        assert_eq!(*log.borrow(), vec!["image:updating", "atlas:updating"]);
    }

    #[test]
    fn test_load_refused_while_unmounted() {
        let log = CallLog::default();
        let mut group = Group::new("floating");
        group
            .register_loader(Recorder::<Image>::new("image", &log))
            .unwrap();

        assert!(!group.load());
        assert_eq!(group.state(), GroupState::Unmounted);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_duplicate_loader_rejected() {
        let log = CallLog::default();
        let mut group = mounted_group(&log);

        let err = group
            .register_loader(Recorder::<Image>::new("again", &log))
            .err();
        assert_eq!(
            err,
            Some(ResourceError::DuplicateLoader {
                group: "level".to_string(),
                type_name: "Image",
            })
        );
        assert_eq!(group.loader_count(), 2);
    }

    #[test]
    fn test_lookup_failures_degrade_to_invalid() {
        let log = CallLog::default();
        let mut group = Group::new("ui");
        group.mount("ui");
        group
            .register_loader(Recorder::<Image>::new("image", &log))
            .unwrap();
        group.load();

        // No loader for the type
        assert!(!group.get::<Atlas>("main").valid());
        assert!(!group.has::<Atlas>("main"));
        // Unknown name
        assert!(!group.get::<Image>("missing").valid());
        assert!(!group.has::<Image>("missing"));
        // Known
        assert!(group.get::<Image>("main").valid());
        assert!(group.has::<Image>("main"));
    }

    #[test]
    fn test_typed_loader_access() {
        let log = CallLog::default();
        let group = mounted_group(&log);

        let loader = group.loader::<Recorder<Image>>().unwrap();
        assert_eq!(loader.borrow().group(), "level");
        assert_eq!(loader.borrow().mount_point(), Path::new("assets/level"));

        let handle = loader
            .borrow_mut()
            .get_or_create("extra", || Image(3));
        assert_eq!(group.get::<Image>("extra"), handle);
        assert_eq!(group.resource_state().get(ResourceState::Created), 1);
    }

    #[test]
    fn test_remount_rebinds_loaders() {
        let log = CallLog::default();
        let mut group = mounted_group(&log);
        group.mount("elsewhere");

        let loader = group.loader::<Recorder<Atlas>>().unwrap();
        assert_eq!(loader.borrow().mount_point(), Path::new("elsewhere"));
        assert_eq!(group.state(), GroupState::Mounted);
    }

    #[test]
    fn test_register_wrapper_reaches_namespace() {
        struct Shared(Rc<RefCell<Vec<(String, ScriptBinding)>>>);

        impl ScriptNamespace for Shared {
            fn register(&mut self, name: &str, binding: ScriptBinding) {
                self.0.borrow_mut().push((name.to_string(), binding));
            }
        }

        let registered = Rc::new(RefCell::new(Vec::new()));
        let log = CallLog::default();
        let mut group = Group::with_namespace("ui", Box::new(Shared(Rc::clone(&registered))));
        group
            .register_loader(Recorder::<Image>::new("image", &log))
            .unwrap();
        group
            .register_loader(Recorder::<Atlas>::new("atlas", &log))
            .unwrap();

        let registered = registered.borrow();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered[0].0, "Image");
        assert_eq!(registered[1].1, ScriptBinding::loader("Atlas"));
    }

    #[test]
    fn test_scan_for_scripts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("menus")).unwrap();
        fs::write(dir.path().join("init.lua"), "print('hi')").unwrap();
        fs::write(dir.path().join("menus/pause.lua"), "").unwrap();
        fs::write(dir.path().join("menus/pause.rhai"), "").unwrap();

        let mut group = Group::new("ui");
        group.mount(dir.path());
        assert_eq!(group.scan_for_scripts(), 2);
        assert!(group.scripts()[0].ends_with("init.lua"));

        group.set_script_extension("rhai");
        assert_eq!(group.scan_for_scripts(), 1);
    }
}
