//! Path normalization for wire messages and digest keys.
//!
//! Every path that leaves the process (or keys the digest store) is
//! normalized to a project-relative, forward-slash form so that clients on
//! any platform see the same strings.

use std::path::{Path, PathBuf};

/// Normalize a path for the wire: backslashes become forward slashes, and
/// absolute paths under `root` are made relative to it.
pub fn wire_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    forward_slashes(relative)
}

/// Render a path with forward slashes regardless of platform.
pub fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`). Falls back
/// to joining with the current directory if relative.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// The extension of a path, lowercased. Empty string when absent.
pub fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_path_strips_root() {
        let root = Path::new("/project");
        assert_eq!(
            wire_path(root, Path::new("/project/resources/public/js/app.js")),
            "resources/public/js/app.js"
        );
    }

    #[test]
    fn test_wire_path_outside_root_kept() {
        let root = Path::new("/project");
        assert_eq!(wire_path(root, Path::new("/elsewhere/x.js")), "/elsewhere/x.js");
    }

    #[test]
    fn test_wire_path_backslashes() {
        let root = Path::new("/project");
        assert_eq!(wire_path(root, Path::new("out\\goog\\deps.js")), "out/goog/deps.js");
    }

    #[test]
    fn test_normalize_path_relative_becomes_absolute() {
        let normalized = normalize_path(Path::new("relative/file.txt"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension(Path::new("src/app.cljs")), "cljs");
        assert_eq!(extension(Path::new("Makefile")), "");
        assert_eq!(extension(Path::new("style.CSS")), "css");
    }
}
