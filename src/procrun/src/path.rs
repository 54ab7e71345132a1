//! Lexical path normalization for working directories.

use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically without filesystem access.
///
/// Drops `.` components, collapses repeated separators, and resolves
/// `name/..` pairs. Leading `..` components of a relative path are kept,
/// `..` directly under the root is dropped, and an empty result becomes `.`.
/// Symlinks are not followed, so `a/link/..` becomes `a`.
pub fn clean_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let mut cleaned = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }

    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }

    cleaned
}
