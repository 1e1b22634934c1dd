//! Asset and resource management system
//!
//! Provides the resource lifecycle shared by every asset type:
//! - Handles that observe a resource without keeping it alive
//! - Per-type loaders owning the objects and their records
//! - Groups driving loaders through Loading, Preparing, Unloading and Updating
//! - A library of groups, updated once per engine tick

mod group;
mod handle;
mod library;
mod loader;
pub mod mount;
mod script;
mod state;

pub use group::{Group, GroupState};
pub use handle::{Handle, Resource};
pub use library::{Library, NamespaceFactory};
pub use loader::{
    ErasedLoader, LoadContext, Loader, LoaderRef, Phase, PhasePass, ResourceLoader,
    short_type_name,
};
pub use script::{LOADER_FUNCTIONS, ScriptBinding, ScriptNamespace, ScriptTable};
pub use state::{ResourceState, StateCounts};
