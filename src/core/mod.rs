//! Core module
//!
//! Configuration and error types shared by the resource subsystem

pub mod config;
pub mod error;

pub use config::{DEFAULT_SCRIPT_EXTENSION, LibraryConfig, MountConfig};
pub use error::{ResourceError, ResourceResult};
