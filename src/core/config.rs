//! Library configuration
//!
//! Describes which groups to mount and where, in RON or JSON form.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{ResourceError, ResourceResult};

/// Default extension of script files discovered under a mount point
pub const DEFAULT_SCRIPT_EXTENSION: &str = "lua";

/// A single group mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Group name
    pub group: String,
    /// Directory or archive the group reads from
    pub path: PathBuf,
}

/// Resource library configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Groups to mount, in order
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
    /// Extension of script files collected by `Group::scan_for_scripts`
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
}

fn default_script_extension() -> String {
    DEFAULT_SCRIPT_EXTENSION.to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            mounts: Vec::new(),
            script_extension: default_script_extension(),
        }
    }
}

impl LibraryConfig {
    /// Add a group mount
    #[must_use]
    pub fn with_mount(mut self, group: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.mounts.push(MountConfig {
            group: group.into(),
            path: path.into(),
        });
        self
    }

    /// Set the script file extension (without the leading dot)
    #[must_use]
    pub fn with_script_extension(mut self, extension: impl Into<String>) -> Self {
        self.script_extension = extension.into();
        self
    }

    /// Parse a configuration from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid configuration
    pub fn from_ron_str(source: &str) -> ResourceResult<Self> {
        ron::from_str(source).map_err(|e| ResourceError::DeserializeError(e.to_string()))
    }

    /// Load a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| ResourceError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the configuration to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> ResourceResult<()> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ResourceError::SerializeError(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| ResourceError::IoError(e.to_string()))
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| ResourceError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ResourceError::DeserializeError(e.to_string()))
    }

    /// Save the configuration to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> ResourceResult<()> {
        let json_string = serde_json::to_string_pretty(self)
            .map_err(|e| ResourceError::SerializeError(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| ResourceError::IoError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LibraryConfig::default();
        assert!(config.mounts.is_empty());
        assert_eq!(config.script_extension, "lua");
    }

    #[test]
    fn test_ron_missing_fields_use_defaults() {
        let config = LibraryConfig::from_ron_str("(mounts: [(group: \"ui\", path: \"./ui\")])")
            .unwrap();
        assert_eq!(config.mounts.len(), 1);
        assert_eq!(config.mounts[0].group, "ui");
        assert_eq!(config.script_extension, "lua");
    }

    #[test]
    fn test_ron_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.ron");

        let config = LibraryConfig::default()
            .with_mount("ui", "./ui.zip")
            .with_mount("levels", "./levels")
            .with_script_extension("rhai");
        config.save_ron(&path).unwrap();

        let loaded = LibraryConfig::load_ron(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");

        let config = LibraryConfig::default().with_mount("audio", "./sfx");
        config.save_json(&path).unwrap();

        let loaded = LibraryConfig::load_json(&path).unwrap();
        assert_eq!(loaded.mounts[0].path, PathBuf::from("./sfx"));
    }

    #[test]
    fn test_bad_ron_is_deserialize_error() {
        let err = LibraryConfig::from_ron_str("(mounts: 12)").unwrap_err();
        assert!(matches!(err, ResourceError::DeserializeError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = LibraryConfig::load_ron("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ResourceError::IoError(_)));
    }
}
