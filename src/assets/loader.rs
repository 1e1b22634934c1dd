//! Per-type resource loaders
//!
//! A [`Loader`] owns every object of one resource type together with the
//! metadata records handed out as [`Handle`]s. The type-specific work
//! (decoding, uploading, releasing) is delegated to a [`ResourceLoader`]
//! implementation; the loader keeps the bookkeeping consistent around it.
//!
//! # Example
//!
//! ```ignore
//! struct FontLoader;
//!
//! impl ResourceLoader for FontLoader {
//!     type Resource = Font;
//!
//!     fn do_load(&mut self, name: &str, font: &mut Font, cx: &LoadContext<'_>) -> bool {
//!         font.parse(cx.resolve(name)).is_ok()
//!     }
//! }
//!
//! let loader = Loader::new(FontLoader);
//! let handle = loader.borrow_mut().get_or_create("mono", Font::default);
//! loader.borrow_mut().load("mono");
//! assert!(handle.is_loaded());
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::handle::{DeferredQueue, Handle, LoaderLink, Owner, Resource};
use super::script::{ScriptBinding, ScriptNamespace};
use super::state::{ResourceState, StateCounts};

/// Shared, mutable reference to a typed loader
pub type LoaderRef<L> = Rc<RefCell<Loader<L>>>;

/// The four lifecycle phases a group drives its loaders through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Create and load raw resources
    Loading,
    /// Wire cross-references once every loader finished `Loading`
    Preparing,
    /// Release everything
    Unloading,
    /// Per-tick periodic work
    Updating,
}

/// Where a loader reads from, as assigned by its group
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    /// Name of the owning group (empty for a standalone loader)
    pub group: &'a str,
    /// Mount point of the owning group
    pub mount_point: &'a Path,
}

impl LoadContext<'_> {
    /// Path of `name` below the mount point
    #[must_use]
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        self.mount_point.join(name)
    }
}

/// Type-specific behavior of a loader.
///
/// Only [`do_load`](ResourceLoader::do_load) is required. Every other hook
/// defaults to doing nothing, and reloading defaults to unsupported.
pub trait ResourceLoader: 'static {
    /// The resource type this loader manages
    type Resource: 'static;

    /// Load `name` into an object previously built by `get_or_create`.
    ///
    /// Returning `false` leaves the record `Created` so the load can be
    /// retried with a reload.
    fn do_load(&mut self, name: &str, object: &mut Self::Resource, cx: &LoadContext<'_>) -> bool;

    /// Release whatever is tied to the resource before it is erased.
    ///
    /// `greedy` asks the loader to also release resources that only this
    /// one depends on, e.g. with `pass.unload(self, dependency, true)`.
    /// Names already being released are skipped, so dependency cycles end.
    fn do_unload(
        &mut self,
        _handle: &Handle<Self::Resource>,
        _greedy: bool,
        _pass: &mut PhasePass<'_, Self::Resource>,
    ) {
    }

    /// Reload `name` in place. Unsupported unless overridden.
    fn do_reload(
        &mut self,
        _name: &str,
        _object: &mut Self::Resource,
        _cx: &LoadContext<'_>,
    ) -> bool {
        false
    }

    /// Loading phase of the owning group
    fn on_loading(&mut self, _pass: &mut PhasePass<'_, Self::Resource>) {}

    /// Preparing phase; runs after every loader in the group finished loading
    fn on_preparing(&mut self, _pass: &mut PhasePass<'_, Self::Resource>) {}

    /// Unloading phase; anything still managed afterwards is released
    fn on_unloading(&mut self, _pass: &mut PhasePass<'_, Self::Resource>) {}

    /// Called once per engine tick while the group is loaded
    fn on_updating(&mut self, _pass: &mut PhasePass<'_, Self::Resource>) {}

    /// Expose the loader to the group's scripting namespace
    fn register_wrapper(&self, namespace: &mut dyn ScriptNamespace) {
        let type_name = short_type_name::<Self::Resource>();
        namespace.register(type_name, ScriptBinding::loader(type_name));
    }
}

/// Last path segment of a type name, without generic arguments
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ============================================================================
// Resource Cache
// ============================================================================

/// The two lockstep maps: strong objects and their records.
///
/// A name is in `objects` iff it is in `records`. Records whose release is
/// queued stay in both maps until the loader drains the queue, but every
/// lookup treats them as gone.
struct ResourceCache<T> {
    objects: FxHashMap<String, Rc<RefCell<T>>>,
    records: FxHashMap<String, Rc<Resource<T>>>,
    owner: Owner,
    deferred: Rc<DeferredQueue>,
    /// Names whose `do_unload` is running
    releasing: SmallVec<[String; 4]>,
}

impl<T: 'static> ResourceCache<T> {
    fn new(loader: LoaderLink) -> Self {
        let deferred = Rc::new(DeferredQueue::default());
        Self {
            objects: FxHashMap::default(),
            records: FxHashMap::default(),
            owner: Owner {
                loader,
                deferred: Rc::downgrade(&deferred),
            },
            deferred,
            releasing: SmallVec::new(),
        }
    }

    fn live(&self) -> impl Iterator<Item = (&String, &Rc<Resource<T>>)> {
        self.records
            .iter()
            .filter(|(_, record)| !record.is_release_pending())
    }

    fn live_record(&self, name: &str) -> Option<&Rc<Resource<T>>> {
        self.records
            .get(name)
            .filter(|record| !record.is_release_pending())
    }

    fn has(&self, name: &str) -> bool {
        self.live_record(name).is_some()
    }

    fn get(&self, name: &str) -> Option<Handle<T>> {
        self.live_record(name).cloned().map(Handle::from_record)
    }

    fn get_or_create(&mut self, name: &str, init: impl FnOnce() -> T) -> Handle<T> {
        if let Some(record) = self.records.get(name) {
            // Asking for the name again keeps it.
            if record.take_release().is_some() {
                log::debug!("Cancelled queued release of '{name}'");
            }
            return Handle::from_record(Rc::clone(record));
        }

        let object = Rc::new(RefCell::new(init()));
        let record = Rc::new(Resource::owned(name, &object, self.owner.clone()));
        self.objects.insert(name.to_owned(), object);
        self.records.insert(name.to_owned(), Rc::clone(&record));
        log::debug!("Created {} '{}'", short_type_name::<T>(), name);

        Handle::from_record(record)
    }

    /// Erase a name from both maps, invalidating every outstanding handle
    fn remove(&mut self, name: &str) -> bool {
        let Some(record) = self.records.remove(name) else {
            return false;
        };
        record.take_release();
        record.set_state(ResourceState::Unloaded);
        self.objects.remove(name);
        true
    }

    /// Queued names, emptying the queue
    fn take_deferred(&self) -> Vec<String> {
        match self.deferred.try_borrow_mut() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.live().map(|(name, _)| name.clone()).collect();
        names.sort_unstable();
        names
    }

    fn len(&self) -> usize {
        self.live().count()
    }

    fn state_counts(&self) -> StateCounts {
        self.live().map(|(_, record)| record.state()).collect()
    }
}

fn load_entry<L: ResourceLoader>(
    backend: &mut L,
    cache: &ResourceCache<L::Resource>,
    cx: &LoadContext<'_>,
    name: &str,
) -> bool {
    let type_name = short_type_name::<L::Resource>();
    let (Some(object), Some(record)) = (cache.objects.get(name), cache.live_record(name)) else {
        log::warn!(
            "Cannot load unknown {} '{}' in group '{}'",
            type_name,
            name,
            cx.group
        );
        return false;
    };

    let loaded = match object.try_borrow_mut() {
        Ok(mut object) => backend.do_load(name, &mut object, cx),
        Err(_) => {
            log::error!("Cannot load {type_name} '{name}': object is borrowed");
            false
        }
    };

    if loaded {
        record.set_state(ResourceState::Loaded);
        log::debug!("Loaded {type_name} '{name}'");
    } else {
        log::warn!("Failed to load {type_name} '{name}'");
    }
    loaded
}

fn unload_entry<L: ResourceLoader>(
    backend: &mut L,
    cache: &mut ResourceCache<L::Resource>,
    cx: &LoadContext<'_>,
    name: &str,
    greedy: bool,
) {
    let type_name = short_type_name::<L::Resource>();
    if cache.releasing.iter().any(|releasing| releasing == name) {
        log::debug!("{type_name} '{name}' is already being unloaded");
        return;
    }
    let Some(handle) = cache.get(name) else {
        log::warn!(
            "Cannot unload unknown {} '{}' in group '{}'",
            type_name,
            name,
            cx.group
        );
        return;
    };

    cache.releasing.push(name.to_owned());
    let mut pass = PhasePass {
        cache: &mut *cache,
        cx: *cx,
    };
    backend.do_unload(&handle, greedy, &mut pass);
    cache.releasing.retain(|releasing| releasing != name);

    cache.remove(name);
    log::debug!("Unloaded {type_name} '{name}'");
}

fn reload_entry<L: ResourceLoader>(
    backend: &mut L,
    cache: &ResourceCache<L::Resource>,
    cx: &LoadContext<'_>,
    name: &str,
) -> bool {
    let type_name = short_type_name::<L::Resource>();
    let (Some(object), Some(record)) = (cache.objects.get(name), cache.live_record(name)) else {
        log::warn!("Cannot reload unknown {type_name} '{name}' in group '{}'", cx.group);
        return false;
    };

    let reloaded = match object.try_borrow_mut() {
        Ok(mut object) => backend.do_reload(name, &mut object, cx),
        Err(_) => {
            log::error!("Cannot reload {type_name} '{name}': object is borrowed");
            false
        }
    };

    if reloaded {
        record.set_state(ResourceState::Loaded);
        log::debug!("Reloaded {type_name} '{name}'");
    } else {
        log::debug!("{type_name} '{name}' was not reloaded");
    }
    reloaded
}

// ============================================================================
// Phase Pass
// ============================================================================

/// What a phase hook may do to its loader's resources.
///
/// Hooks receive the loader's own behavior as `&mut self`; pass it back in to
/// load, unload or reload through the regular bookkeeping:
///
/// ```ignore
/// fn on_loading(&mut self, pass: &mut PhasePass<'_, Texture>) {
///     pass.get_or_create("default", Texture::default);
///     pass.load(self, "default");
/// }
/// ```
pub struct PhasePass<'a, T> {
    cache: &'a mut ResourceCache<T>,
    cx: LoadContext<'a>,
}

impl<T: 'static> PhasePass<'_, T> {
    /// Group and mount point the loader works against
    #[must_use]
    pub fn context(&self) -> &LoadContext<'_> {
        &self.cx
    }

    /// Mount point of the owning group
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        self.cx.mount_point
    }

    /// Whether `name` is managed
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.cache.has(name)
    }

    /// Handle for `name`, invalid if unknown
    #[must_use]
    pub fn get(&self, name: &str) -> Handle<T> {
        self.cache.get(name).unwrap_or_default()
    }

    /// See [`Loader::get_or_create`]
    pub fn get_or_create(&mut self, name: &str, init: impl FnOnce() -> T) -> Handle<T> {
        self.cache.get_or_create(name, init)
    }

    /// Managed names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.cache.names()
    }

    /// Load `name` with `backend`
    pub fn load<L: ResourceLoader<Resource = T>>(&mut self, backend: &mut L, name: &str) -> bool {
        load_entry(backend, self.cache, &self.cx, name)
    }

    /// Unload `name` with `backend`
    pub fn unload<L: ResourceLoader<Resource = T>>(
        &mut self,
        backend: &mut L,
        name: &str,
        greedy: bool,
    ) {
        unload_entry(backend, self.cache, &self.cx, name, greedy);
    }

    /// Reload `name` with `backend`
    pub fn reload<L: ResourceLoader<Resource = T>>(&mut self, backend: &mut L, name: &str) -> bool {
        reload_entry(backend, self.cache, &self.cx, name)
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Cache and factory for every resource of one type.
///
/// Owns the strong objects. Records created here point back at the loader,
/// so a [`Handle`] can unload or reload through it.
pub struct Loader<L: ResourceLoader> {
    backend: L,
    cache: ResourceCache<L::Resource>,
    group: String,
    mount_point: PathBuf,
}

impl<L: ResourceLoader> Loader<L> {
    /// Create a standalone loader.
    ///
    /// It reads relative to the current directory until a group binds it.
    #[must_use]
    pub fn new(backend: L) -> LoaderRef<L> {
        Rc::new_cyclic(|this: &Weak<RefCell<Self>>| {
            let this: Weak<RefCell<Self>> = Weak::clone(this);
            let owner: LoaderLink = this;
            RefCell::new(Self {
                backend,
                cache: ResourceCache::new(owner),
                group: String::new(),
                mount_point: PathBuf::new(),
            })
        })
    }

    /// Type-specific behavior
    #[must_use]
    pub fn backend(&self) -> &L {
        &self.backend
    }

    /// Type-specific behavior, mutably
    pub fn backend_mut(&mut self) -> &mut L {
        &mut self.backend
    }

    /// Name of the owning group (empty when standalone)
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Mount point the loader reads from
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Whether `name` is managed
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.cache.has(name)
    }

    /// Handle for `name`, or an invalid handle if unknown.
    ///
    /// Never triggers loading.
    #[must_use]
    pub fn get(&self, name: &str) -> Handle<L::Resource> {
        self.cache.get(name).unwrap_or_else(|| {
            log::warn!(
                "No {} named '{}' in group '{}'",
                short_type_name::<L::Resource>(),
                name,
                self.group
            );
            Handle::invalid()
        })
    }

    /// Get the handle for `name`, constructing the object on first use.
    ///
    /// Construction happens once per name: when `name` already exists the
    /// existing handle is returned and `init` is not called, so whatever it
    /// would have built is ignored. The new record starts out `Created`.
    pub fn get_or_create(
        &mut self,
        name: &str,
        init: impl FnOnce() -> L::Resource,
    ) -> Handle<L::Resource> {
        self.cache.get_or_create(name, init)
    }

    /// Load `name` through the backend.
    ///
    /// Returns `false` (and logs) for unknown names. On failure the record
    /// stays `Created`.
    pub fn load(&mut self, name: &str) -> bool {
        let cx = LoadContext {
            group: &self.group,
            mount_point: &self.mount_point,
        };
        let loaded = load_entry(&mut self.backend, &self.cache, &cx, name);
        self.release_deferred();
        loaded
    }

    /// Unload `name` and erase it, invalidating every handle to it.
    ///
    /// Unknown names are logged and ignored.
    pub fn unload(&mut self, name: &str, greedy: bool) {
        self.unload_now(name, greedy);
        self.release_deferred();
    }

    /// Reload `name` in place; `false` when unknown or unsupported
    pub fn reload(&mut self, name: &str) -> bool {
        let cx = LoadContext {
            group: &self.group,
            mount_point: &self.mount_point,
        };
        let reloaded = reload_entry(&mut self.backend, &self.cache, &cx, name);
        self.release_deferred();
        reloaded
    }

    /// Erase every name whose handle was unloaded while this loader was busy.
    ///
    /// Runs after each load, unload, reload and phase; call it directly after
    /// unloading handles while holding a borrow of the loader.
    pub fn release_deferred(&mut self) {
        loop {
            let names = self.cache.take_deferred();
            if names.is_empty() {
                break;
            }
            for name in names {
                let greedy = self.cache.records.get(&name).and_then(|record| record.take_release());
                if let Some(greedy) = greedy {
                    self.unload_now(&name, greedy);
                }
            }
        }
    }

    fn unload_now(&mut self, name: &str, greedy: bool) {
        let cx = LoadContext {
            group: &self.group,
            mount_point: &self.mount_point,
        };
        unload_entry(&mut self.backend, &mut self.cache, &cx, name, greedy);
    }

    /// Unload every managed resource
    pub fn unload_all(&mut self, greedy: bool) {
        for name in self.cache.names() {
            self.unload(&name, greedy);
        }
    }

    /// Managed names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.cache.names()
    }

    /// Number of managed resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing is managed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of managed records per state
    #[must_use]
    pub fn resource_state(&self) -> StateCounts {
        self.cache.state_counts()
    }

    fn run_hook(&mut self, phase: Phase) {
        let mut pass = PhasePass {
            cache: &mut self.cache,
            cx: LoadContext {
                group: &self.group,
                mount_point: &self.mount_point,
            },
        };
        match phase {
            Phase::Loading => self.backend.on_loading(&mut pass),
            Phase::Preparing => self.backend.on_preparing(&mut pass),
            Phase::Unloading => self.backend.on_unloading(&mut pass),
            Phase::Updating => self.backend.on_updating(&mut pass),
        }
        self.release_deferred();
    }
}

// ============================================================================
// Type Erasure
// ============================================================================

/// Object-safe view of a loader, used by groups to hold loaders of any type.
pub trait ErasedLoader: Any {
    /// `TypeId` of the managed resource type
    fn resource_type(&self) -> TypeId;

    /// Short name of the managed resource type
    fn type_name(&self) -> &'static str;

    /// Assign the owning group and its mount point
    fn bind(&mut self, group: &str, mount_point: &Path);

    /// Whether `name` is managed
    fn has(&self, name: &str) -> bool;

    /// Boxed `Handle<Resource>` for `name`, or `None` if unknown
    fn get_untyped(&self, name: &str) -> Option<Box<dyn Any>>;

    /// See [`Loader::load`]
    fn load(&mut self, name: &str) -> bool;

    /// See [`Loader::unload`]
    fn unload(&mut self, name: &str, greedy: bool);

    /// See [`Loader::reload`]
    fn reload(&mut self, name: &str) -> bool;

    /// See [`Loader::resource_state`]
    fn resource_state(&self) -> StateCounts;

    /// Run one lifecycle phase
    fn run_phase(&mut self, phase: Phase);

    /// Expose the loader to a scripting namespace
    fn register_wrapper(&self, namespace: &mut dyn ScriptNamespace);
}

impl<L: ResourceLoader> ErasedLoader for Loader<L> {
    fn resource_type(&self) -> TypeId {
        TypeId::of::<L::Resource>()
    }

    fn type_name(&self) -> &'static str {
        short_type_name::<L::Resource>()
    }

    fn bind(&mut self, group: &str, mount_point: &Path) {
        self.group = group.to_owned();
        self.mount_point = mount_point.to_path_buf();
    }

    fn has(&self, name: &str) -> bool {
        Loader::has(self, name)
    }

    fn get_untyped(&self, name: &str) -> Option<Box<dyn Any>> {
        self.cache
            .get(name)
            .map(|handle| Box::new(handle) as Box<dyn Any>)
    }

    fn load(&mut self, name: &str) -> bool {
        Loader::load(self, name)
    }

    fn unload(&mut self, name: &str, greedy: bool) {
        Loader::unload(self, name, greedy);
    }

    fn reload(&mut self, name: &str) -> bool {
        Loader::reload(self, name)
    }

    fn resource_state(&self) -> StateCounts {
        Loader::resource_state(self)
    }

    fn run_phase(&mut self, phase: Phase) {
        self.run_hook(phase);
        if phase == Phase::Unloading {
            self.unload_all(false);
        }
    }

    fn register_wrapper(&self, namespace: &mut dyn ScriptNamespace) {
        self.backend.register_wrapper(namespace);
    }
}
