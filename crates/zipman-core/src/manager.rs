//! Folder-aware archive manager.
//!
//! [`ArchiveManager`] owns at most one open codec and a virtual folder
//! cursor. Adds are named relative to the cursor; extraction is scoped to
//! it, filtered through a [`Selector`] or an [`EntryPattern`], and every
//! target is checked against the destination before anything is written.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ArchiveConfig;
use crate::ArchiveError;
use crate::ExtractionReport;
use crate::Result;
use crate::codec::ArchiveCodec;
use crate::codec::CodecRegistry;
use crate::codec::CodecSource;
use crate::fs::Filesystem;
use crate::fs::LocalFilesystem;
use crate::path::base_name;
use crate::path::internal_prefix;
use crate::path::join_folder;
use crate::path::resolve_destination;
use crate::selection::EntryPattern;
use crate::selection::ExtractMode;
use crate::selection::Selector;

/// What to add to the archive.
///
/// Built through `From` so `add` accepts paths, `(name, path)` pairs,
/// ordered lists and name-to-path maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddSource {
    /// A file, added under its base name, or a directory, added recursively.
    Path(PathBuf),
    /// A file added under an explicit entry name.
    Named(String, PathBuf),
    /// Several sources processed in order.
    List(Vec<AddSource>),
}

impl From<&str> for AddSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<String> for AddSource {
    fn from(path: String) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<&Path> for AddSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for AddSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&PathBuf> for AddSource {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl<N: Into<String>, P: Into<PathBuf>> From<(N, P)> for AddSource {
    fn from((name, path): (N, P)) -> Self {
        Self::Named(name.into(), path.into())
    }
}

impl<T: Into<Self>> From<Vec<T>> for AddSource {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<N: Into<String>, P: Into<PathBuf>> From<BTreeMap<N, P>> for AddSource {
    fn from(items: BTreeMap<N, P>) -> Self {
        Self::List(
            items
                .into_iter()
                .map(|(name, path)| Self::Named(name.into(), path.into()))
                .collect(),
        )
    }
}

/// Manages one archive at a time behind a virtual folder cursor.
///
/// The manager is closed until [`make`](Self::make) opens an archive; most
/// operations return [`ArchiveError::ArchiveClosed`] until then.
///
/// # Examples
///
/// ```no_run
/// use zipman_core::ArchiveManager;
/// use zipman_core::CodecKind;
/// use zipman_core::ExtractMode;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = ArchiveManager::new();
/// manager
///     .make("/tmp/out/site.zip", CodecKind::Zip)?
///     .folder("assets")
///     .add("/var/www/assets")?
///     .home()
///     .add_string("README.txt", "generated")?;
/// manager.close()?;
///
/// manager.make("/tmp/out/site.zip", CodecKind::Zip)?.folder("assets");
/// let report = manager.extract_to("/tmp/restore", &["css"], ExtractMode::WHITELIST)?;
/// println!("extracted {} files", report.files_extracted);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ArchiveManager<F: Filesystem = LocalFilesystem> {
    codec: Option<Box<dyn ArchiveCodec>>,
    file_path: PathBuf,
    current_folder: String,
    fs: F,
    config: ArchiveConfig,
    registry: CodecRegistry,
}

impl ArchiveManager {
    /// Creates a closed manager on the local filesystem with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ArchiveConfig::default())
    }

    /// Creates a closed manager on the local filesystem with `config`.
    #[must_use]
    pub fn with_config(config: ArchiveConfig) -> Self {
        Self::with_filesystem(LocalFilesystem::new(), config)
    }
}

impl Default for ArchiveManager {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Filesystem> ArchiveManager<F> {
    /// Creates a closed manager that performs disk access through `fs`.
    #[must_use]
    pub fn with_filesystem(fs: F, config: ArchiveConfig) -> Self {
        Self {
            codec: None,
            file_path: PathBuf::new(),
            current_folder: String::new(),
            fs,
            config,
            registry: CodecRegistry::default(),
        }
    }

    /// Replaces the codec registry used by [`make`](Self::make).
    #[must_use]
    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Returns the filesystem collaborator.
    #[must_use]
    pub const fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Opens the archive at `path`, creating it if it does not exist.
    ///
    /// For a new archive, a missing parent directory is created recursively
    /// and an existing one must be writable. An existing archive is opened
    /// as-is, so archives in read-only locations can still be read. Any
    /// previously held codec is dropped without being closed; call
    /// [`close`](Self::close) first to flush it.
    ///
    /// # Errors
    ///
    /// - `FolderCreation` if the parent directory cannot be created
    /// - `NotWritable` if the parent exists but is not writable
    /// - `InvalidArgument` if the codec kind is not registered
    /// - `Open` if the codec cannot open or create the file
    pub fn make(
        &mut self,
        path: impl AsRef<Path>,
        source: impl Into<CodecSource>,
    ) -> Result<&mut Self> {
        let path = path.as_ref();
        let existed = self.fs.exists(path);

        if !existed {
            self.prepare_parent(path)?;
        }

        let codec = match source.into() {
            CodecSource::Kind(kind) => self.registry.open(kind, path, !existed, &self.config)?,
            CodecSource::Instance(codec) => codec,
        };

        if let Some(previous) = self.codec.replace(codec) {
            debug!(codec = previous.name(), "dropping previously open codec");
        }
        self.file_path = path.to_path_buf();
        info!(
            path = %path.display(),
            codec = self.archive_type().unwrap_or_default(),
            created = !existed,
            "opened archive"
        );
        Ok(self)
    }

    /// Adds files and directories under the current folder.
    ///
    /// A file is added under its base name; a directory is walked
    /// recursively, each subdirectory becoming a nested folder. Symbolic
    /// links to directories are skipped.
    ///
    /// Codec failures on individual files are not returned; check
    /// [`status`](Self::status) afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open, `InvalidArgument` for
    /// a file path without a name, or an I/O error if a directory cannot be
    /// listed.
    pub fn add(&mut self, source: impl Into<AddSource>) -> Result<&mut Self> {
        self.add_source(source.into())?;
        Ok(self)
    }

    /// Adds the file at `path` under `name` in the current folder.
    ///
    /// A directory ignores `name` and is added as with [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn add_as(&mut self, path: impl AsRef<Path>, name: &str) -> Result<&mut Self> {
        self.add_path(path.as_ref(), Some(name))?;
        Ok(self)
    }

    /// Creates an empty directory entry in the current folder.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open.
    pub fn add_empty_dir(&mut self, name: &str) -> Result<&mut Self> {
        let entry = format!("{}{name}", self.internal_path());
        debug!(entry = %entry, "adding empty directory");
        self.codec_mut()?.add_empty_directory(&entry);
        Ok(self)
    }

    /// Creates an entry in the current folder from in-memory content.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open.
    pub fn add_string(&mut self, name: &str, content: impl AsRef<[u8]>) -> Result<&mut Self> {
        let entry = format!("{}{name}", self.internal_path());
        debug!(entry = %entry, "adding entry from content");
        self.codec_mut()?.add_from_bytes(&entry, content.as_ref());
        Ok(self)
    }

    /// Removes the entry with exactly this name. Absent names are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open.
    pub fn remove(&mut self, name: &str) -> Result<&mut Self> {
        debug!(entry = name, "removing entry");
        self.codec_mut()?.remove_entry(name);
        Ok(self)
    }

    /// Removes every file entry whose full name is in `names`.
    ///
    /// Membership is exact equality. Directory markers are not enumerated
    /// and therefore never removed here.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open.
    pub fn remove_many<S: AsRef<str>>(&mut self, names: &[S]) -> Result<&mut Self> {
        let codec = self.codec_mut()?;
        let doomed: Vec<String> = codec
            .entries()
            .map(|stat| stat.name)
            .filter(|name| names.iter().any(|n| n.as_ref() == name))
            .collect();

        for name in &doomed {
            debug!(entry = %name, "removing entry");
            codec.remove_entry(name);
        }
        Ok(self)
    }

    /// Returns the content of the entry with this full name.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the archive has no such entry, or
    /// `ArchiveClosed` if no archive is open.
    pub fn file_content(&mut self, name: &str) -> Result<Vec<u8>> {
        let codec = self.codec_mut()?;
        if !codec.entry_exists(name) {
            return Err(ArchiveError::EntryNotFound {
                name: name.to_string(),
            });
        }
        codec.read_entry(name)
    }

    /// Returns `true` if an entry with exactly this name exists.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open.
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.codec_ref()?.entry_exists(name))
    }

    /// Lists file entry names in archive order.
    ///
    /// The folder cursor does not apply. With a non-empty `filter`, only
    /// names matching that regular expression are returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` naming the first entry tested if the filter
    /// does not compile, or `ArchiveClosed` if no archive is open.
    pub fn list_files(&self, filter: Option<&str>) -> Result<Vec<String>> {
        let codec = self.codec_ref()?;
        let Some(filter) = filter.filter(|f| !f.is_empty()) else {
            return Ok(codec.entries().map(|stat| stat.name).collect());
        };

        let mut pattern = EntryPattern::new(filter)?;
        let mut names = Vec::new();
        for stat in codec.entries() {
            if pattern.is_match(&stat.name)? {
                names.push(stat.name);
            }
        }
        Ok(names)
    }

    /// Extracts entries of the current folder to `dest`.
    ///
    /// Names are tested after the folder prefix is stripped. Without
    /// `EXACT_MATCH`, a name matches when it starts with any of `names`.
    /// `WHITELIST` extracts matching entries; otherwise matching entries are
    /// the ones left out. Existing files are overwritten.
    ///
    /// # Errors
    ///
    /// - `FolderCreation` if `dest` or a parent of a target cannot be created
    /// - `PathTraversal` if any selected entry would land outside `dest`;
    ///   nothing is written in that case
    /// - `ArchiveClosed` if no archive is open
    pub fn extract_to<S: AsRef<str>>(
        &mut self,
        dest: impl AsRef<Path>,
        names: &[S],
        mode: ExtractMode,
    ) -> Result<ExtractionReport> {
        let dest = dest.as_ref();
        self.ensure_directory(dest)?;

        let selector = Selector::new(names, mode);
        self.extract_selected(dest, |name| Ok(selector.selects(name)))
    }

    /// Same as [`extract_to`](Self::extract_to) with the configured default mode.
    ///
    /// # Errors
    ///
    /// Same as [`extract_to`](Self::extract_to).
    pub fn extract_to_default<S: AsRef<str>>(
        &mut self,
        dest: impl AsRef<Path>,
        names: &[S],
    ) -> Result<ExtractionReport> {
        let mode = self.config.default_mode;
        self.extract_to(dest, names, mode)
    }

    /// Extracts entries of the current folder whose stripped name matches
    /// `regex`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `regex` is empty
    /// - `InvalidPattern` naming the first entry tested if it does not compile
    /// - `PathTraversal` and `FolderCreation` as for [`extract_to`](Self::extract_to)
    pub fn extract_matching_regex(
        &mut self,
        dest: impl AsRef<Path>,
        regex: &str,
    ) -> Result<ExtractionReport> {
        let mut pattern = EntryPattern::new(regex)?;
        self.extract_selected(dest.as_ref(), |name| pattern.is_match(name))
    }

    /// Enables decryption of encrypted entries; returns whether the codec
    /// accepted the password. The zip codec reads ZipCrypto and AES entries.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open.
    pub fn use_password(&mut self, password: &str) -> Result<bool> {
        Ok(self.codec_mut()?.set_password(password))
    }

    /// Returns the codec's status string, `"No error"` when nothing failed.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open.
    pub fn status(&self) -> Result<String> {
        Ok(self.codec_ref()?.status())
    }

    /// Flushes pending changes and keeps the archive open.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveClosed` if no archive is open, or the codec's write
    /// error.
    pub fn save(&mut self) -> Result<&mut Self> {
        self.codec_mut()?.save()?;
        info!(path = %self.file_path.display(), "saved archive");
        Ok(self)
    }

    /// Flushes and releases the archive. Does nothing if none is open.
    ///
    /// # Errors
    ///
    /// Returns the codec's write error; the archive is released regardless.
    pub fn close(&mut self) -> Result<()> {
        let path = std::mem::take(&mut self.file_path);
        if let Some(mut codec) = self.codec.take() {
            codec.close()?;
            info!(path = %path.display(), "closed archive");
        }
        Ok(())
    }

    /// Closes the archive and removes its file.
    ///
    /// The file is removed even when closing fails.
    ///
    /// # Errors
    ///
    /// Returns the filesystem's delete error, otherwise the codec's close
    /// error.
    pub fn delete(&mut self) -> Result<()> {
        let path = self.file_path.clone();
        let closed = self.close();
        if !path.as_os_str().is_empty() && self.fs.exists(&path) {
            self.fs.delete(&path)?;
            info!(path = %path.display(), "deleted archive");
        }
        closed
    }

    /// Moves the folder cursor to `path`; trailing separators are dropped.
    pub fn folder(&mut self, path: &str) -> &mut Self {
        self.current_folder = path.trim_end_matches(['/', '\\']).to_string();
        self
    }

    /// Moves the folder cursor back to the archive root.
    pub fn home(&mut self) -> &mut Self {
        self.current_folder.clear();
        self
    }

    /// Returns the folder cursor, empty at the root.
    #[must_use]
    pub fn current_folder_path(&self) -> &str {
        &self.current_folder
    }

    /// Returns the prefix given to new entries: empty or `folder/`.
    #[must_use]
    pub fn internal_path(&self) -> String {
        internal_prefix(&self.current_folder)
    }

    /// Returns the path of the open archive, empty when closed.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Returns the name of the active codec, or `None` when closed.
    #[must_use]
    pub fn archive_type(&self) -> Option<&str> {
        self.codec.as_deref().map(ArchiveCodec::name)
    }

    /// Returns the active codec, or `None` when closed.
    #[must_use]
    pub fn codec(&self) -> Option<&dyn ArchiveCodec> {
        self.codec.as_deref()
    }

    fn codec_ref(&self) -> Result<&dyn ArchiveCodec> {
        self.codec.as_deref().ok_or(ArchiveError::ArchiveClosed)
    }

    fn codec_mut(&mut self) -> Result<&mut dyn ArchiveCodec> {
        match self.codec.as_deref_mut() {
            Some(codec) => Ok(codec),
            None => Err(ArchiveError::ArchiveClosed),
        }
    }

    fn add_source(&mut self, source: AddSource) -> Result<()> {
        match source {
            AddSource::Path(path) => self.add_path(&path, None),
            AddSource::Named(name, path) => self.add_path(&path, Some(&name)),
            AddSource::List(items) => items
                .into_iter()
                .try_for_each(|item| self.add_source(item)),
        }
    }

    fn add_path(&mut self, path: &Path, name: Option<&str>) -> Result<()> {
        let prefix = self.internal_path();
        let Some(codec) = self.codec.as_deref_mut() else {
            return Err(ArchiveError::ArchiveClosed);
        };

        if self.fs.is_file(path) {
            let name = match name {
                Some(name) => name.to_string(),
                None => base_name(path).ok_or_else(|| {
                    ArchiveError::InvalidArgument(format!(
                        "cannot derive an entry name from {}",
                        path.display()
                    ))
                })?,
            };
            let entry = format!("{prefix}{name}");
            debug!(source = %path.display(), entry = %entry, "adding file");
            codec.add_file(path, &entry);
            return Ok(());
        }

        add_directory(&self.fs, codec, path, &self.current_folder)
    }

    /// Creates the parent of a new archive, or checks that it is writable.
    fn prepare_parent(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !self.fs.exists(&parent) {
            return self
                .fs
                .make_directory(&parent, self.config.directory_mode, true)
                .map_err(|source| ArchiveError::FolderCreation {
                    path: parent.clone(),
                    source,
                });
        }
        if !self.fs.is_writable(&parent) {
            return Err(ArchiveError::NotWritable { path: parent });
        }
        Ok(())
    }

    fn ensure_directory(&self, dir: &Path) -> Result<()> {
        if self.fs.exists(dir) {
            return Ok(());
        }
        self.fs
            .make_directory(dir, self.config.directory_mode, true)
            .map_err(|source| ArchiveError::FolderCreation {
                path: dir.to_path_buf(),
                source,
            })
    }

    /// Resolves every selected entry first, then writes them in archive
    /// order, so a hostile name aborts the call before any file is created.
    fn extract_selected(
        &mut self,
        dest: &Path,
        mut select: impl FnMut(&str) -> Result<bool>,
    ) -> Result<ExtractionReport> {
        let started = Instant::now();
        let prefix = self.internal_path();
        let mut report = ExtractionReport::new();

        let codec = self.codec.as_deref_mut().ok_or(ArchiveError::ArchiveClosed)?;
        let mut targets = Vec::new();
        for stat in codec.entries() {
            let Some(relative) = scoped_name(&stat.name, &prefix) else {
                report.files_out_of_scope += 1;
                continue;
            };
            if !select(relative)? {
                report.files_skipped += 1;
                continue;
            }
            let target = resolve_destination(dest, relative, &stat.name)?;
            targets.push((stat.name, target));
        }

        for (entry, target) in targets {
            if let Some(parent) = target.parent() {
                if !self.fs.exists(parent) {
                    self.fs
                        .make_directory(parent, self.config.directory_mode, true)
                        .map_err(|source| ArchiveError::FolderCreation {
                            path: parent.to_path_buf(),
                            source,
                        })?;
                }
            }

            let mut content = codec.open_entry(&entry)?;
            let written = self.fs.put(&target, &mut *content)?;
            debug!(entry = %entry, target = %target.display(), bytes = written, "extracted entry");

            report.files_extracted += 1;
            report.bytes_written += written;
        }

        report.duration = started.elapsed();
        info!(
            dest = %dest.display(),
            extracted = report.files_extracted,
            skipped = report.files_skipped,
            "extraction finished"
        );
        Ok(report)
    }
}

/// Adds the regular files of `dir` under `folder`, then recurses into each
/// subdirectory with the folder extended by its name.
fn add_directory<F: Filesystem>(
    fs: &F,
    codec: &mut dyn ArchiveCodec,
    dir: &Path,
    folder: &str,
) -> Result<()> {
    let prefix = internal_prefix(folder);
    for file in fs.files(dir)? {
        let Some(name) = base_name(&file) else {
            continue;
        };
        let entry = format!("{prefix}{name}");
        debug!(source = %file.display(), entry = %entry, "adding file");
        codec.add_file(&file, &entry);
    }

    for subdir in fs.directories(dir)? {
        if fs.is_symlink(&subdir) {
            warn!(path = %subdir.display(), "skipping symbolic link to directory");
            continue;
        }
        let Some(name) = base_name(&subdir) else {
            continue;
        };
        add_directory(fs, codec, &subdir, &join_folder(folder, &name))?;
    }
    Ok(())
}

/// Strips the folder prefix from `name`, or returns `None` if the entry is
/// outside the folder. An empty prefix keeps every entry.
fn scoped_name<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        Some(name)
    } else {
        name.strip_prefix(prefix)
    }
}
