//! Resource records and handles
//!
//! A [`Resource`] is the per-name metadata a loader keeps next to the object
//! it owns. A [`Handle`] shares the record, never the object, so any number of
//! subsystems can reference an asset without keeping it alive. Validity is
//! recomputed on every access: when the loader erases the object, every handle
//! observes it the next time it asks.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use super::loader::ErasedLoader;
use super::state::ResourceState;

/// Non-owning link from a record back to the loader that manages it
pub(crate) type LoaderLink = Weak<RefCell<dyn ErasedLoader>>;

/// Names whose release was requested while their loader was busy
pub(crate) type DeferredQueue = RefCell<Vec<String>>;

/// Back-links from an owned record to its loader
#[derive(Clone)]
pub(crate) struct Owner {
    pub(crate) loader: LoaderLink,
    pub(crate) deferred: Weak<DeferredQueue>,
}

/// Metadata record for one named resource.
///
/// Holds a weak reference to the object; the strong reference lives in the
/// owning loader.
pub struct Resource<T> {
    /// Name the resource is registered under
    name: String,
    /// Liveness reference to the object
    object: Weak<RefCell<T>>,
    /// Owning loader, if any
    owner: Option<Owner>,
    /// Current lifecycle state
    state: Cell<ResourceState>,
    /// Release queued on a busy loader, with its `greedy` flag
    release: Cell<Option<bool>>,
}

impl<T> Resource<T> {
    /// Create a record that no loader owns.
    ///
    /// The caller keeps the strong reference; unloading such a record only
    /// flips its state.
    #[must_use]
    pub fn detached(name: impl Into<String>, object: &Rc<RefCell<T>>) -> Self {
        Self {
            name: name.into(),
            object: Rc::downgrade(object),
            owner: None,
            state: Cell::new(ResourceState::Created),
            release: Cell::new(None),
        }
    }

    pub(crate) fn owned(name: impl Into<String>, object: &Rc<RefCell<T>>, owner: Owner) -> Self {
        Self {
            name: name.into(),
            object: Rc::downgrade(object),
            owner: Some(owner),
            state: Cell::new(ResourceState::Created),
            release: Cell::new(None),
        }
    }

    /// Name of the resource
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw lifecycle state as last set by the loader
    #[must_use]
    pub fn state(&self) -> ResourceState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: ResourceState) {
        self.state.set(state);
    }

    /// Whether a loader manages this record
    #[must_use]
    pub fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// Whether an unload is queued on the owning loader
    #[must_use]
    pub fn is_release_pending(&self) -> bool {
        self.release.get().is_some()
    }

    /// The record is usable: not unloaded or queued for release, and the
    /// object is still alive
    #[must_use]
    pub fn valid(&self) -> bool {
        !self.is_release_pending()
            && self.state.get() != ResourceState::Unloaded
            && self.object.strong_count() > 0
    }

    /// Temporary strong pointer to the object, if it is still alive
    #[must_use]
    pub fn object(&self) -> Option<Rc<RefCell<T>>> {
        if self.is_release_pending() || self.state.get() == ResourceState::Unloaded {
            return None;
        }
        self.object.upgrade()
    }

    /// Clear a queued release, returning its `greedy` flag
    pub(crate) fn take_release(&self) -> Option<bool> {
        self.release.take()
    }

    /// Queue this record's release on the owning loader.
    ///
    /// Repeated requests merge; a greedy request wins.
    fn defer_release(&self, greedy: bool) {
        let queued = self.release.get();
        self.release.set(Some(greedy || queued.unwrap_or(false)));
        if queued.is_some() {
            return;
        }

        let Some(queue) = self.owner.as_ref().and_then(|owner| owner.deferred.upgrade()) else {
            return;
        };
        match queue.try_borrow_mut() {
            Ok(mut queue) => queue.push(self.name.clone()),
            Err(_) => log::error!("Cannot queue release of '{}'", self.name),
        }
    }

    fn owner(&self) -> Option<Rc<RefCell<dyn ErasedLoader>>> {
        self.owner.as_ref().and_then(|owner| owner.loader.upgrade())
    }
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .field("alive", &(self.object.strong_count() > 0))
            .field("owned", &self.owner.is_some())
            .field("release_pending", &self.is_release_pending())
            .finish()
    }
}

/// Cheap clonable reference to a resource record.
///
/// Handles never extend the life of the object. A handle can also be
/// invalid from the start: that is what lookups of unknown names return.
pub struct Handle<T> {
    record: Option<Rc<Resource<T>>>,
}

impl<T> Handle<T> {
    /// A handle that refers to nothing
    #[must_use]
    pub const fn invalid() -> Self {
        Self { record: None }
    }

    /// Wrap a caller-owned object in a detached record
    #[must_use]
    pub fn detached(name: impl Into<String>, object: &Rc<RefCell<T>>) -> Self {
        Self::from_record(Rc::new(Resource::detached(name, object)))
    }

    pub(crate) fn from_record(record: Rc<Resource<T>>) -> Self {
        Self {
            record: Some(record),
        }
    }

    /// The shared record, if this handle refers to one
    #[must_use]
    pub fn record(&self) -> Option<&Resource<T>> {
        self.record.as_deref()
    }

    /// Name of the referenced resource
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.record.as_deref().map(Resource::name)
    }

    /// Whether the referenced resource is alive and not unloaded
    #[must_use]
    pub fn valid(&self) -> bool {
        self.record.as_deref().is_some_and(Resource::valid)
    }

    /// Current state; anything that is not valid reports `Unloaded`
    #[must_use]
    pub fn state(&self) -> ResourceState {
        match self.record.as_deref() {
            Some(record) if record.valid() => record.state(),
            _ => ResourceState::Unloaded,
        }
    }

    /// Whether the record has reached `Loaded`
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state() == ResourceState::Loaded
    }

    /// Temporary strong pointer to the object.
    ///
    /// Do not store the returned pointer: the loader is meant to be the only
    /// long-lived owner. Prefer [`Handle::with`] for scoped access.
    #[must_use]
    pub fn object(&self) -> Option<Rc<RefCell<T>>> {
        self.record.as_deref().and_then(Resource::object)
    }

    /// Run `f` against the object if it is alive and not mutably borrowed
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let object = self.object()?;
        let borrowed: Ref<'_, T> = object.try_borrow().ok()?;
        Some(f(&borrowed))
    }

    /// Run `f` against the object mutably if it is alive and not borrowed
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let object = self.object()?;
        let mut borrowed: RefMut<'_, T> = object.try_borrow_mut().ok()?;
        Some(f(&mut borrowed))
    }

    /// Unload the resource.
    ///
    /// Owned records forward to their loader, which erases the object and
    /// the record; detached records just become `Unloaded`. With `greedy`,
    /// the loader also releases what the resource exclusively depends on.
    ///
    /// When the loader is busy (this is called from one of its own hooks),
    /// the handle becomes invalid at once and the loader erases the name as
    /// soon as its current operation returns.
    pub fn unload(&self, greedy: bool) {
        let Some(record) = self.record.as_deref() else {
            return;
        };

        // Already erased; the loader may hold a newer record under this name.
        if !record.valid() {
            if !record.is_release_pending() {
                record.set_state(ResourceState::Unloaded);
            }
            return;
        }

        let Some(owner) = record.owner() else {
            record.set_state(ResourceState::Unloaded);
            return;
        };
        match owner.try_borrow_mut() {
            Ok(mut loader) => loader.unload(record.name(), greedy),
            Err(_) => {
                log::debug!(
                    "Loader of '{}' is busy, queueing its release",
                    record.name()
                );
                record.defer_release(greedy);
            }
        }

        debug_assert!(!self.valid(), "'{}' still valid after unload", record.name());
    }

    /// Ask the owning loader to reload the resource.
    ///
    /// Returns `false` for detached records, invalid handles, and loaders that
    /// do not support reloading.
    pub fn reload(&self) -> bool {
        let Some(record) = self.record.as_deref() else {
            return false;
        };
        if !record.valid() {
            return false;
        }
        let Some(owner) = record.owner() else {
            return false;
        };

        let Ok(mut loader) = owner.try_borrow_mut() else {
            log::error!(
                "Cannot reload '{}': its loader is already in use",
                record.name()
            );
            return false;
        };
        let reloaded = loader.reload(record.name());
        drop(loader);
        reloaded
    }

    /// Whether both handles alias the same record
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.record, &other.record) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.record
            .as_ref()
            .map(|record| Rc::as_ptr(record).cast::<()>())
            .hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.record.as_deref() {
            Some(record) => f
                .debug_tuple("Handle")
                .field(&record.name())
                .field(&self.state())
                .finish(),
            None => f.write_str("Handle(invalid)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handle() {
        let handle = Handle::<u32>::invalid();
        assert!(!handle.valid());
        assert_eq!(handle.state(), ResourceState::Unloaded);
        assert!(handle.name().is_none());
        assert!(handle.object().is_none());
        assert!(!handle.reload());
        handle.unload(false);
        assert_eq!(handle, Handle::default());
    }

    #[test]
    fn test_detached_unload_flips_state() {
        let object = Rc::new(RefCell::new(7_u32));
        let handle = Handle::detached("seven", &object);
        assert!(handle.valid());
        assert_eq!(handle.state(), ResourceState::Created);
        assert!(!handle.record().unwrap().has_owner());

        handle.unload(false);
        assert!(!handle.valid());
        assert_eq!(handle.state(), ResourceState::Unloaded);
        // The caller still owns the object
        assert_eq!(*object.borrow(), 7);
        assert!(handle.object().is_none());
    }

    #[test]
    fn test_detached_reload_unsupported() {
        let object = Rc::new(RefCell::new(String::from("x")));
        let handle = Handle::detached("x", &object);
        assert!(!handle.reload());
    }

    #[test]
    fn test_clones_share_one_record() {
        let object = Rc::new(RefCell::new(1_i32));
        let first = Handle::detached("one", &object);
        let second = first.clone();
        assert!(first.ptr_eq(&second));

        first.unload(false);
        assert!(!second.valid());
    }

    #[test]
    fn test_dropping_object_invalidates() {
        let object = Rc::new(RefCell::new(vec![1_u8, 2, 3]));
        let handle = Handle::detached("bytes", &object);
        assert_eq!(handle.with(Vec::len), Some(3));

        drop(object);
        assert!(!handle.valid());
        assert_eq!(handle.with(Vec::len), None);
    }

    #[test]
    fn test_with_mut() {
        let object = Rc::new(RefCell::new(10_u32));
        let handle = Handle::detached("counter", &object);
        handle.with_mut(|value| *value += 5);
        assert_eq!(*object.borrow(), 15);

        // Already borrowed elsewhere
        let _guard = object.borrow_mut();
        assert!(handle.with(|value| *value).is_none());
    }
}
