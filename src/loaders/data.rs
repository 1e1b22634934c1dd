//! RON data loader
//!
//! Loads any `serde` type from `<name>.<suffix>` files under the mount point,
//! for resources described as data (materials, sound banks, font metrics).

use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::assets::{LoadContext, PhasePass, ResourceLoader};
use crate::assets::mount;
use crate::core::error::{ResourceError, ResourceResult};

/// Read and deserialize one RON file
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialization fails
pub fn read_ron<T: DeserializeOwned>(path: impl AsRef<Path>) -> ResourceResult<T> {
    let content = fs::read_to_string(path).map_err(|e| ResourceError::IoError(e.to_string()))?;
    ron::from_str(&content).map_err(|e| ResourceError::DeserializeError(e.to_string()))
}

/// Loader for `T` values stored as RON files ending in `.{suffix}`
pub struct RonLoader<T> {
    suffix: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RonLoader<T> {
    /// Load files named `*.{suffix}`, e.g. `"material.ron"`
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into().trim_start_matches('.').to_string(),
            _marker: PhantomData,
        }
    }

    /// File suffix this loader reads
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl<T> Default for RonLoader<T> {
    fn default() -> Self {
        Self::new("ron")
    }
}

impl<T: DeserializeOwned + Default + 'static> ResourceLoader for RonLoader<T> {
    type Resource = T;

    fn do_load(&mut self, name: &str, object: &mut T, cx: &LoadContext<'_>) -> bool {
        let path = cx.resolve(format!("{name}.{}", self.suffix));
        match read_ron(&path) {
            Ok(value) => {
                *object = value;
                true
            }
            Err(err) => {
                log::error!("Failed to load {}: {err}", path.display());
                false
            }
        }
    }

    fn do_reload(&mut self, name: &str, object: &mut T, cx: &LoadContext<'_>) -> bool {
        self.do_load(name, object, cx)
    }

    fn on_loading(&mut self, pass: &mut PhasePass<'_, T>) {
        let mount_point = pass.mount_point().to_path_buf();
        for path in mount::scan_files(&mount_point, &self.suffix) {
            let Some(name) = mount::resource_name(&mount_point, &path, &self.suffix) else {
                continue;
            };
            pass.get_or_create(&name, T::default);
            pass.load(self, &name);
        }
    }
}
