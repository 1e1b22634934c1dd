//! Mount point scanning
//!
//! Groups and loaders discover their files by walking the mount point. Only
//! directory mounts can be walked; anything else (an archive path, a missing
//! directory) scans as empty.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Whether `path`'s file name ends in `.{suffix}` (ASCII case-insensitive)
#[must_use]
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let suffix = suffix.trim_start_matches('.');
    let Some(split) = file_name.len().checked_sub(suffix.len()) else {
        return false;
    };
    if split == 0 || !file_name.is_char_boundary(split) {
        return false;
    }
    let (stem, tail) = file_name.split_at(split);
    stem.ends_with('.') && tail.eq_ignore_ascii_case(suffix)
}

/// Every file below `root` whose name ends in `.{suffix}`, sorted by path
#[must_use]
pub fn scan_files(root: &Path, suffix: &str) -> Vec<PathBuf> {
    if !root.is_dir() {
        log::warn!(
            "Mount point {} is not a directory, nothing to scan",
            root.display()
        );
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && has_suffix(entry.path(), suffix) {
                    files.push(entry.into_path());
                }
            }
            Err(err) => log::error!("Failed to scan {}: {err}", root.display()),
        }
    }
    files
}

/// Resource name of `path`: relative to `root`, `/`-separated, without `.{suffix}`
#[must_use]
pub fn resource_name(root: &Path, path: &Path, suffix: &str) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    let joined = parts.join("/");

    let suffix = suffix.trim_start_matches('.');
    let name = if has_suffix(relative, suffix) {
        &joined[..joined.len() - suffix.len() - 1]
    } else {
        joined.as_str()
    };
    (!name.is_empty()).then(|| name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_has_suffix() {
        assert!(has_suffix(Path::new("menu/main.lua"), "lua"));
        assert!(has_suffix(Path::new("MAIN.LUA"), ".lua"));
        assert!(has_suffix(Path::new("stone.material.ron"), "material.ron"));
        assert!(!has_suffix(Path::new("stone.ron"), "material.ron"));
        assert!(!has_suffix(Path::new("lua"), "lua"));
        assert!(!has_suffix(Path::new("main.luac"), "lua"));
    }

    #[test]
    fn test_scan_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("menu")).unwrap();
        fs::write(dir.path().join("boot.lua"), "").unwrap();
        fs::write(dir.path().join("menu/main.lua"), "").unwrap();
        fs::write(dir.path().join("menu/readme.txt"), "").unwrap();

        let files = scan_files(dir.path(), "lua");
        let names: Vec<_> = files
            .iter()
            .filter_map(|path| resource_name(dir.path(), path, "lua"))
            .collect();
        assert_eq!(names, vec!["boot", "menu/main"]);
    }

    #[test]
    fn test_scan_non_directory() {
        assert!(scan_files(Path::new("./definitely-missing.zip"), "lua").is_empty());
    }

    #[test]
    fn test_resource_name_without_suffix() {
        let root = Path::new("assets");
        assert_eq!(
            resource_name(root, Path::new("assets/ui/button.png"), "ron"),
            Some("ui/button.png".to_string())
        );
        assert_eq!(resource_name(root, Path::new("other/x.ron"), "ron"), None);
    }
}
