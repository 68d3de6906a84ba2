//! In-memory codec.
//!
//! Keeps an ordered `name -> bytes` table and never touches the disk. Files
//! added with [`ArchiveCodec::add_file`] are not read; the entry stores its
//! own name as content so tests can observe how the manager named it.

use std::io::Cursor;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use super::ArchiveCodec;
use super::Entries;
use super::EntryStat;
use super::STATUS_OK;
use crate::ArchiveError;
use crate::Result;

#[derive(Debug, Clone)]
struct MemoryEntry {
    name: String,
    content: Vec<u8>,
}

impl MemoryEntry {
    fn stat(&self) -> EntryStat {
        EntryStat {
            name: self.name.clone(),
            size: self.content.len() as u64,
            crc32: crc32fast::hash(&self.content),
        }
    }
}

/// Archive codec holding every entry in memory.
///
/// # Examples
///
/// ```
/// use zipman_core::codec::ArchiveCodec;
/// use zipman_core::codec::MemoryCodec;
///
/// let mut codec = MemoryCodec::new();
/// codec.add_from_bytes("a.txt", b"hello");
/// assert!(codec.entry_exists("a.txt"));
/// assert_eq!(codec.read_entry("a.txt").unwrap(), b"hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCodec {
    path: PathBuf,
    entries: Vec<MemoryEntry>,
    password: Option<String>,
    closed: bool,
}

impl MemoryCodec {
    /// Creates an empty in-memory archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty in-memory archive labelled with `path`.
    ///
    /// The path is only recorded; nothing is read or written.
    #[must_use]
    pub fn open(path: &Path, _create: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Self::default()
        }
    }

    /// Returns the path the archive was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the password set through `set_password`, if any.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns `true` once `close` has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn upsert(&mut self, name: &str, content: Vec<u8>) {
        match self.position(name) {
            Some(index) => self.entries[index].content = content,
            None => self.entries.push(MemoryEntry {
                name: name.to_string(),
                content,
            }),
        }
    }
}

impl ArchiveCodec for MemoryCodec {
    fn name(&self) -> &str {
        "memory"
    }

    fn add_file(&mut self, _source: &Path, entry: &str) {
        self.upsert(entry, entry.as_bytes().to_vec());
    }

    fn add_from_bytes(&mut self, entry: &str, content: &[u8]) {
        self.upsert(entry, content.to_vec());
    }

    fn add_empty_directory(&mut self, entry: &str) {
        let name = if entry.ends_with('/') {
            entry.to_string()
        } else {
            format!("{entry}/")
        };
        self.upsert(&name, Vec::new());
    }

    fn remove_entry(&mut self, entry: &str) {
        if let Some(index) = self.position(entry) {
            self.entries.remove(index);
        }
    }

    fn entry_exists(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }

    fn open_entry(&mut self, entry: &str) -> Result<Box<dyn Read + '_>> {
        let index = self
            .position(entry)
            .ok_or_else(|| ArchiveError::EntryNotFound {
                name: entry.to_string(),
            })?;
        Ok(Box::new(Cursor::new(self.entries[index].content.as_slice())))
    }

    fn entries(&self) -> Entries<'_> {
        Box::new(
            self.entries
                .iter()
                .map(MemoryEntry::stat)
                .filter(|stat| !stat.is_directory_marker()),
        )
    }

    fn set_password(&mut self, password: &str) -> bool {
        self.password = Some(password.to_string());
        true
    }

    fn status(&self) -> String {
        STATUS_OK.to_string()
    }

    fn save(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
