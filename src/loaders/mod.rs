//! Stock loaders
//!
//! Ready-made [`ResourceLoader`](crate::assets::ResourceLoader)
//! implementations for common resource kinds.

mod data;
mod texture;

pub use data::{RonLoader, read_ron};
pub use texture::{DEFAULT_TEXTURE, Texture, TextureLoader};
