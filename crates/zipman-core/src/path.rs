//! Entry naming and zip-slip protection.
//!
//! Everything here is lexical: paths are normalized without touching the
//! filesystem so that targets which do not exist yet can be checked before
//! anything is written.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::ArchiveError;
use crate::Result;

/// Resolves `.` and `..` segments of `path` without consulting the filesystem.
///
/// A `..` removes the previous normal segment. It is dropped at the root of
/// an absolute path and kept when a relative path has nothing left to pop,
/// so `a/../../b` normalizes to `../b`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use std::path::PathBuf;
/// use zipman_core::path::normalize_lexically;
///
/// assert_eq!(
///     normalize_lexically(Path::new("/out/./a/../b.txt")),
///     PathBuf::from("/out/b.txt")
/// );
/// assert_eq!(
///     normalize_lexically(Path::new("/out/../../etc/passwd")),
///     PathBuf::from("/etc/passwd")
/// );
/// ```
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => {
                    normalized.push(Component::ParentDir);
                }
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// Computes where `entry` lands under `dest` and rejects escapes.
///
/// `relative` is the entry name with the manager's internal prefix already
/// stripped; `entry` is the raw name used in the error. Both `/` and `\` are
/// treated as separators. The normalized candidate must stay inside the
/// normalized destination, compared component-wise.
///
/// # Errors
///
/// Returns `ArchiveError::PathTraversal` if the entry escapes `dest`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use zipman_core::path::resolve_destination;
///
/// let ok = resolve_destination(Path::new("/out"), "docs/a.txt", "docs/a.txt").unwrap();
/// assert_eq!(ok, Path::new("/out/docs/a.txt"));
///
/// let err = resolve_destination(Path::new("/out"), "../../etc/passwd", "../../etc/passwd");
/// assert!(err.is_err());
/// ```
pub fn resolve_destination(dest: &Path, relative: &str, entry: &str) -> Result<PathBuf> {
    let root = normalize_lexically(dest);
    let relative = relative.replace('\\', "/");
    let target = normalize_lexically(&dest.join(relative));

    if target == root || !target.starts_with(&root) {
        return Err(ArchiveError::PathTraversal {
            entry: entry.to_string(),
            target,
        });
    }
    Ok(target)
}

/// Renders a virtual folder with a trailing slash, or empty at the root.
///
/// # Examples
///
/// ```
/// use zipman_core::path::internal_prefix;
///
/// assert_eq!(internal_prefix(""), "");
/// assert_eq!(internal_prefix("foo/bar"), "foo/bar/");
/// ```
pub fn internal_prefix(folder: &str) -> String {
    if folder.is_empty() {
        String::new()
    } else {
        format!("{folder}/")
    }
}

/// Appends `segment` to a virtual folder.
pub fn join_folder(folder: &str, segment: &str) -> String {
    if folder.is_empty() {
        segment.to_string()
    } else {
        format!("{folder}/{segment}")
    }
}

/// Returns the last path component as a string, the name an added file
/// receives when no explicit name is given.
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
