//! Archive codec adapters.
//!
//! An [`ArchiveCodec`] owns exactly one open archive. The manager only talks
//! to this trait; the zip format itself lives behind [`ZipCodec`], and
//! [`MemoryCodec`] provides a disk-free double for exercising manager logic.

pub mod memory;
pub mod zip;

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::ArchiveConfig;
use crate::ArchiveError;
use crate::Result;

pub use self::memory::MemoryCodec;
pub use self::zip::ZipCodec;

/// Status string reported by codecs that have not recorded a failure.
pub const STATUS_OK: &str = "No error";

/// Basic statistics for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    /// Full entry name, `/`-separated, without a leading slash.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// CRC-32 of the uncompressed content.
    pub crc32: u32,
}

impl EntryStat {
    /// Returns `true` for entries treated as directory markers.
    ///
    /// Markers are recognized by size 0 and checksum 0, which also covers
    /// empty regular files.
    #[must_use]
    pub const fn is_directory_marker(&self) -> bool {
        self.size == 0 && self.crc32 == 0
    }
}

/// Iterator over the non-directory entries of an archive.
pub type Entries<'a> = Box<dyn Iterator<Item = EntryStat> + 'a>;

/// Narrow interface over a concrete archive engine.
///
/// Additions and removals are fire-and-forget: failures are recorded and
/// reported through [`ArchiveCodec::status`] rather than returned.
pub trait ArchiveCodec {
    /// Short identifier of the implementation, e.g. `"zip"`.
    fn name(&self) -> &str;

    /// Adds the file at `source` under `entry`.
    fn add_file(&mut self, source: &Path, entry: &str);

    /// Creates or overwrites `entry` with `content`.
    fn add_from_bytes(&mut self, entry: &str, content: &[u8]);

    /// Creates a directory marker named `entry`.
    fn add_empty_directory(&mut self, entry: &str);

    /// Deletes `entry`; absent entries are ignored.
    fn remove_entry(&mut self, entry: &str);

    /// Returns `true` if an entry with exactly this name exists.
    fn entry_exists(&self, entry: &str) -> bool;

    /// Reads the whole content of `entry`.
    fn read_entry(&mut self, entry: &str) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        self.open_entry(entry)?.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Opens `entry` for streaming reads.
    fn open_entry(&mut self, entry: &str) -> Result<Box<dyn Read + '_>>;

    /// Enumerates non-directory entries in physical archive order.
    ///
    /// Each call starts a fresh pass.
    fn entries(&self) -> Entries<'_>;

    /// Enables decryption for subsequent reads; returns whether the password
    /// was accepted.
    fn set_password(&mut self, password: &str) -> bool;

    /// Human-readable status, `"No error"` when nothing failed.
    fn status(&self) -> String;

    /// Flushes pending changes while keeping the archive usable.
    fn save(&mut self) -> Result<()>;

    /// Flushes pending changes and releases the archive. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl fmt::Debug for dyn ArchiveCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveCodec")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Built-in codec implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// On-disk zip archive via the `zip` crate.
    Zip,
    /// In-memory table, never written to disk.
    Memory,
}

impl CodecKind {
    /// Returns the identifier reported by the codec's `name()`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constructor for a registered codec: `(path, create_if_missing, config)`.
pub type CodecFactory = fn(&Path, bool, &ArchiveConfig) -> Result<Box<dyn ArchiveCodec>>;

/// Mapping from [`CodecKind`] to the function that opens it.
///
/// # Examples
///
/// ```
/// use zipman_core::codec::CodecKind;
/// use zipman_core::codec::CodecRegistry;
///
/// let mut registry = CodecRegistry::default();
/// assert!(registry.contains(CodecKind::Zip));
///
/// registry.unregister(CodecKind::Zip);
/// assert!(!registry.contains(CodecKind::Zip));
/// ```
#[derive(Clone)]
pub struct CodecRegistry {
    factories: HashMap<CodecKind, CodecFactory>,
}

impl CodecRegistry {
    /// Creates a registry with no codecs.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers `factory` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: CodecKind, factory: CodecFactory) -> &mut Self {
        self.factories.insert(kind, factory);
        self
    }

    /// Removes the factory for `kind`.
    pub fn unregister(&mut self, kind: CodecKind) -> &mut Self {
        self.factories.remove(&kind);
        self
    }

    /// Returns `true` if `kind` can be opened.
    #[must_use]
    pub fn contains(&self, kind: CodecKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Opens `path` with the codec registered for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::InvalidArgument` if nothing is registered for
    /// `kind`, or whatever the factory fails with.
    pub fn open(
        &self,
        kind: CodecKind,
        path: &Path,
        create: bool,
        config: &ArchiveConfig,
    ) -> Result<Box<dyn ArchiveCodec>> {
        let factory = self.factories.get(&kind).ok_or_else(|| {
            ArchiveError::InvalidArgument(format!("no codec registered for '{kind}'"))
        })?;
        factory(path, create, config)
    }
}

impl Default for CodecRegistry {
    /// Registers [`ZipCodec`] and [`MemoryCodec`].
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(CodecKind::Zip, |path, create, config| {
                Ok(Box::new(ZipCodec::open(path, create, config)?))
            })
            .register(CodecKind::Memory, |path, create, _| {
                Ok(Box::new(MemoryCodec::open(path, create)))
            });
        registry
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// What `ArchiveManager::make` should open the archive with.
pub enum CodecSource {
    /// A registered built-in codec.
    Kind(CodecKind),
    /// An already constructed codec, used as-is.
    Instance(Box<dyn ArchiveCodec>),
}

impl Default for CodecSource {
    fn default() -> Self {
        Self::Kind(CodecKind::Zip)
    }
}

impl fmt::Debug for CodecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Instance(codec) => f.debug_tuple("Instance").field(&codec.name()).finish(),
        }
    }
}

impl From<CodecKind> for CodecSource {
    fn from(kind: CodecKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<Box<dyn ArchiveCodec>> for CodecSource {
    fn from(codec: Box<dyn ArchiveCodec>) -> Self {
        Self::Instance(codec)
    }
}

impl From<MemoryCodec> for CodecSource {
    fn from(codec: MemoryCodec) -> Self {
        Self::Instance(Box::new(codec))
    }
}

impl From<ZipCodec> for CodecSource {
    fn from(codec: ZipCodec) -> Self {
        Self::Instance(Box::new(codec))
    }
}
