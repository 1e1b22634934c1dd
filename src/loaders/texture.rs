//! Texture loader
//!
//! Decodes images from the group's mount point into RGBA8 pixel data. GPU
//! upload happens elsewhere: whoever holds a `Handle<Texture>` reads the
//! pixels and uploads them.

use std::path::{Path, PathBuf};

use smallvec::SmallVec;

use crate::assets::{LoadContext, PhasePass, ResourceLoader};
use crate::assets::mount;
use crate::core::error::{ResourceError, ResourceResult};

/// Name of the built-in fallback texture every texture loader provides
pub const DEFAULT_TEXTURE: &str = "default";

/// CPU-side texture in RGBA8
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Texture {
    /// Texture filled with a single color; `None` if the size overflows
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Option<Self> {
        let count = byte_len(width, height)? / 4;
        Some(Self {
            width,
            height,
            pixels: rgba.repeat(count),
        })
    }

    /// Wrap raw RGBA8 pixels; `None` if the length does not match
    #[must_use]
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (byte_len(width, height)? == pixels.len()).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decode an image file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded
    pub fn decode(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let image = image::open(path.as_ref()).map_err(|e| match e {
            image::ImageError::IoError(io) => ResourceError::IoError(io.to_string()),
            other => ResourceError::DecodeError(other.to_string()),
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixel data
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Whether the texture has no pixels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// RGBA8 byte length of a `width` x `height` image
fn byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
}

/// Loads every image under the mount point, plus the built-in `default`
pub struct TextureLoader {
    extensions: SmallVec<[&'static str; 4]>,
    default_color: [u8; 4],
    decoded: usize,
}

impl TextureLoader {
    /// Loader for `png`, `jpg` and `jpeg` files with a white default texture
    #[must_use]
    pub fn new() -> Self {
        Self {
            extensions: SmallVec::from_slice(&["png", "jpg", "jpeg"]),
            default_color: [255, 255, 255, 255],
            decoded: 0,
        }
    }

    /// Color of the 1x1 built-in default texture
    #[must_use]
    pub fn with_default_color(mut self, rgba: [u8; 4]) -> Self {
        self.default_color = rgba;
        self
    }

    /// Number of image files decoded so far
    #[must_use]
    pub fn decoded_count(&self) -> usize {
        self.decoded
    }

    /// Image file for `name`: the exact path, or `name` plus a known extension
    fn find_file(&self, name: &str, cx: &LoadContext<'_>) -> Option<PathBuf> {
        let exact = cx.resolve(name);
        if exact.is_file() {
            return Some(exact);
        }
        self.extensions
            .iter()
            .map(|ext| cx.resolve(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLoader for TextureLoader {
    type Resource = Texture;

    fn do_load(&mut self, name: &str, texture: &mut Texture, cx: &LoadContext<'_>) -> bool {
        let Some(path) = self.find_file(name, cx) else {
            if name == DEFAULT_TEXTURE {
                *texture = Texture::solid(1, 1, self.default_color).unwrap_or_default();
                return true;
            }
            log::error!(
                "No image for texture '{}' under {}",
                name,
                cx.mount_point.display()
            );
            return false;
        };

        self.decoded += 1;
        match Texture::decode(&path) {
            Ok(decoded) => {
                *texture = decoded;
                true
            }
            Err(err) => {
                log::error!("Failed to load texture {}: {err}", path.display());
                false
            }
        }
    }

    fn do_reload(&mut self, name: &str, texture: &mut Texture, cx: &LoadContext<'_>) -> bool {
        self.do_load(name, texture, cx)
    }

    fn on_loading(&mut self, pass: &mut PhasePass<'_, Texture>) {
        pass.get_or_create(DEFAULT_TEXTURE, Texture::default);
        pass.load(self, DEFAULT_TEXTURE);

        let mount_point = pass.mount_point().to_path_buf();
        let extensions = self.extensions.clone();
        for ext in extensions {
            for path in mount::scan_files(&mount_point, ext) {
                let Some(name) = mount::resource_name(&mount_point, &path, ext) else {
                    continue;
                };
                // `a.png` and `a.jpg` share the name `a`; the first one wins.
                if pass.get_or_create(&name, Texture::default).is_loaded() {
                    log::debug!("Texture '{}' already loaded, skipping {}", name, path.display());
                    continue;
                }
                pass.load(self, &name);
            }
        }
    }
}
