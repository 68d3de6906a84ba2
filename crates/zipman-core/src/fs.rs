//! Filesystem collaborator used by the manager.
//!
//! The manager never calls `std::fs` directly. Everything it needs from the
//! disk goes through [`Filesystem`], so tests can substitute a scripted
//! implementation and production code uses [`LocalFilesystem`].

use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use walkdir::WalkDir;

/// Side-effecting filesystem operations the manager depends on.
pub trait Filesystem {
    /// Returns `true` if `path` exists (following symlinks).
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a regular file (following symlinks).
    fn is_file(&self, path: &Path) -> bool;

    /// Returns `true` if `path` itself is a symbolic link.
    fn is_symlink(&self, path: &Path) -> bool;

    /// Returns `true` if the current process may create files in `path`.
    fn is_writable(&self, path: &Path) -> bool;

    /// Creates `path`, including missing parents when `recursive` is set.
    ///
    /// `mode` is applied on Unix and ignored elsewhere.
    fn make_directory(&self, path: &Path, mode: u32, recursive: bool) -> std::io::Result<()>;

    /// Lists the regular files directly inside `dir`, sorted by name.
    fn files(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>>;

    /// Lists the subdirectories directly inside `dir`, sorted by name.
    ///
    /// Symbolic links pointing at directories are included; callers decide
    /// whether to follow them.
    fn directories(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>>;

    /// Writes everything from `content` to `path`, replacing any existing
    /// file, and returns the number of bytes written.
    fn put(&self, path: &Path, content: &mut dyn Read) -> std::io::Result<u64>;

    /// Removes the file at `path`.
    fn delete(&self, path: &Path) -> std::io::Result<()>;
}

/// [`Filesystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Creates a new local filesystem handle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn children(dir: &Path) -> impl Iterator<Item = std::io::Result<walkdir::DirEntry>> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.map_err(std::io::Error::from))
    }
}

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn is_writable(&self, path: &Path) -> bool {
        #[cfg(unix)]
        {
            use std::ffi::CString;
            use std::os::unix::ffi::OsStrExt;

            let Ok(path_cstring) = CString::new(path.as_os_str().as_bytes()) else {
                return false;
            };

            // SAFETY: access() only reads the NUL-terminated string, which
            // outlives the call.
            #[allow(unsafe_code)]
            let result = unsafe { libc::access(path_cstring.as_ptr(), libc::W_OK) };
            result == 0
        }

        #[cfg(not(unix))]
        {
            std::fs::metadata(path).is_ok_and(|m| !m.permissions().readonly())
        }
    }

    fn make_directory(&self, path: &Path, mode: u32, recursive: bool) -> std::io::Result<()> {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(recursive);

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        builder.create(path)
    }

    fn files(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in Self::children(dir) {
            let entry = entry?;
            // walkdir does not follow links here, so check the target.
            if entry.path().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn directories(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in Self::children(dir) {
            let entry = entry?;
            if entry.path().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }

    fn put(&self, path: &Path, content: &mut dyn Read) -> std::io::Result<u64> {
        let mut writer = BufWriter::new(File::create(path)?);
        let written = std::io::copy(content, &mut writer)?;
        writer.flush()?;
        Ok(written)
    }

    fn delete(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }
}
