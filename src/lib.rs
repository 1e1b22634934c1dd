//! Resource lifecycle subsystem for the engine
//!
//! This crate provides:
//! - A type-erased registry of named resources, grouped by mount point
//! - Weak handles whose validity is checked on every access
//! - A four-phase lifecycle shared by every loader in a group
//! - Stock texture and RON data loaders

pub mod assets;
pub mod core;
pub mod loaders;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{
        Group, Handle, LoadContext, Library, PhasePass, ResourceLoader, ResourceState,
        StateCounts,
    };
    pub use crate::core::{LibraryConfig, ResourceError, ResourceResult};
    pub use crate::loaders::{RonLoader, Texture, TextureLoader};
}
