//! Zip codec backed by the `zip` crate.
//!
//! The archive is read into an entry table on open. Additions and removals
//! only edit that table; `save` and `close` rebuild the archive into a
//! temporary sibling file, raw-copying entries that were not touched, and
//! then move it over the original path.

use std::fs::File;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use ::zip::CompressionMethod;
use ::zip::ZipArchive;
use ::zip::ZipWriter;
use ::zip::result::ZipError;
use ::zip::write::SimpleFileOptions;
use tempfile::Builder;
use tracing::debug;
use tracing::warn;

use super::ArchiveCodec;
use super::Entries;
use super::EntryStat;
use super::STATUS_OK;
use crate::ArchiveConfig;
use crate::ArchiveError;
use crate::Result;

/// Where the content of an entry comes from when the archive is written.
#[derive(Debug, Clone)]
enum Source {
    /// Entry at this index of the archive on disk.
    Archived(usize),
    /// File on the local filesystem, read at write time.
    File(PathBuf),
    /// In-memory content.
    Bytes(Vec<u8>),
    /// Directory marker.
    Directory,
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    size: u64,
    crc32: u32,
    source: Source,
}

impl Slot {
    fn stat(&self) -> EntryStat {
        EntryStat {
            name: self.name.clone(),
            size: self.size,
            crc32: self.crc32,
        }
    }
}

/// Archive codec for `.zip` files on disk.
pub struct ZipCodec {
    path: PathBuf,
    reader: Option<ZipArchive<File>>,
    slots: Vec<Slot>,
    options: SimpleFileOptions,
    password: Option<String>,
    status: String,
    dirty: bool,
    closed: bool,
}

impl ZipCodec {
    /// Opens the archive at `path`.
    ///
    /// An existing file is always opened. A missing file is only accepted
    /// when `create` is set; it is written on the first `save` or `close`.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Open` if the file is missing (and `create` is
    /// not set), cannot be read, or is not a zip archive.
    pub fn open(path: &Path, create: bool, config: &ArchiveConfig) -> Result<Self> {
        let options = file_options(config);

        if !path.exists() {
            if !create {
                return Err(ArchiveError::Open {
                    path: path.to_path_buf(),
                    status: "No such file".to_string(),
                });
            }
            debug!(path = %path.display(), "starting new zip archive");
            return Ok(Self {
                path: path.to_path_buf(),
                reader: None,
                slots: Vec::new(),
                options,
                password: None,
                status: STATUS_OK.to_string(),
                dirty: true,
                closed: false,
            });
        }

        let (reader, slots) = read_archive(path).map_err(|e| ArchiveError::Open {
            path: path.to_path_buf(),
            status: describe(&e),
        })?;
        debug!(path = %path.display(), entries = slots.len(), "opened zip archive");

        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(reader),
            slots,
            options,
            password: None,
            status: STATUS_OK.to_string(),
            dirty: false,
            closed: false,
        })
    }

    /// Returns the path of the archive file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if there are changes not yet written to disk.
    #[must_use]
    pub const fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    fn upsert(&mut self, slot: Slot) {
        match self.position(&slot.name) {
            Some(index) => self.slots[index] = slot,
            None => self.slots.push(slot),
        }
        self.dirty = true;
    }

    fn record_failure(&mut self, message: String) {
        warn!(path = %self.path.display(), "{message}");
        self.status = message;
    }

    /// Writes the entry table to a temporary file and moves it into place.
    fn write_archive(&mut self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut builder = Builder::new();
        // A new archive gets the usual umask-filtered mode, not 0600.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let mut temp = builder.tempfile_in(&parent)?;

        let skipped = write_entries(
            temp.as_file_mut(),
            &self.slots,
            self.reader.as_mut(),
            self.options,
        )?;
        for message in skipped {
            self.record_failure(message);
        }

        if let Some(existing) = std::fs::metadata(&self.path).ok().filter(|m| m.is_file()) {
            temp.as_file().set_permissions(existing.permissions())?;
        }

        // Windows cannot replace a file that is still open.
        #[cfg(windows)]
        {
            self.reader = None;
        }
        if let Err(e) = temp.persist(&self.path) {
            #[cfg(windows)]
            {
                self.reader = read_archive(&self.path).ok().map(|(reader, _)| reader);
            }
            return Err(e.error.into());
        }
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.slots.len(), "wrote zip archive");
        Ok(())
    }
}

impl std::fmt::Debug for ZipCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipCodec")
            .field("path", &self.path)
            .field("entries", &self.slots.len())
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ArchiveCodec for ZipCodec {
    fn name(&self) -> &str {
        "zip"
    }

    fn add_file(&mut self, source: &Path, entry: &str) {
        match checksum_file(source) {
            Ok((size, crc32)) => self.upsert(Slot {
                name: entry.to_string(),
                size,
                crc32,
                source: Source::File(source.to_path_buf()),
            }),
            Err(e) => self.record_failure(format!("Can't add {}: {e}", source.display())),
        }
    }

    fn add_from_bytes(&mut self, entry: &str, content: &[u8]) {
        self.upsert(Slot {
            name: entry.to_string(),
            size: content.len() as u64,
            crc32: crc32fast::hash(content),
            source: Source::Bytes(content.to_vec()),
        });
    }

    fn add_empty_directory(&mut self, entry: &str) {
        let name = if entry.ends_with('/') {
            entry.to_string()
        } else {
            format!("{entry}/")
        };
        self.upsert(Slot {
            name,
            size: 0,
            crc32: 0,
            source: Source::Directory,
        });
    }

    fn remove_entry(&mut self, entry: &str) {
        if let Some(index) = self.position(entry) {
            self.slots.remove(index);
            self.dirty = true;
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

        match &self.slots[index].source {
            Source::Archived(i) => {
                let reader = self.reader.as_mut().ok_or(ArchiveError::ArchiveClosed)?;
                let file = match &self.password {
                    Some(password) => reader.by_index_decrypt(*i, password.as_bytes())?,
                    None => reader.by_index(*i)?,
                };
                Ok(Box::new(file))
            }
            Source::File(path) => Ok(Box::new(File::open(path)?)),
            Source::Bytes(content) => Ok(Box::new(Cursor::new(content.as_slice()))),
            Source::Directory => Ok(Box::new(std::io::empty())),
        }
    }

    fn entries(&self) -> Entries<'_> {
        Box::new(
            self.slots
                .iter()
                .map(Slot::stat)
                .filter(|stat| !stat.is_directory_marker()),
        )
    }

    fn set_password(&mut self, password: &str) -> bool {
        self.password = Some(password.to_string());
        true
    }

    fn status(&self) -> String {
        self.status.clone()
    }

    fn save(&mut self) -> Result<()> {
        if self.closed {
            return Err(ArchiveError::ArchiveClosed);
        }
        if !self.dirty {
            return Ok(());
        }

        self.write_archive()?;
        let (reader, slots) = read_archive(&self.path)?;
        self.reader = Some(reader);
        self.slots = slots;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.dirty {
            self.write_archive()?;
        }
        self.reader = None;
        self.slots.clear();
        self.closed = true;
        debug!(path = %self.path.display(), "closed zip archive");
        Ok(())
    }
}

fn file_options(config: &ArchiveConfig) -> SimpleFileOptions {
    match config.deflate_level() {
        None => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        Some(level) => SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(level))),
    }
}

/// Opens `path` and builds the entry table in physical order.
fn read_archive(path: &Path) -> std::result::Result<(ZipArchive<File>, Vec<Slot>), ZipError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut slots = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i)?;
        slots.push(Slot {
            name: file.name().to_string(),
            size: file.size(),
            crc32: file.crc32(),
            source: Source::Archived(i),
        });
    }
    Ok((archive, slots))
}

/// Writes every slot to `out`. Returns messages for file sources that could
/// not be opened and were left out.
fn write_entries<W: Write + Seek>(
    out: W,
    slots: &[Slot],
    mut reader: Option<&mut ZipArchive<File>>,
    options: SimpleFileOptions,
) -> Result<Vec<String>> {
    let mut writer = ZipWriter::new(out);
    let mut skipped = Vec::new();

    for slot in slots {
        match &slot.source {
            Source::Archived(i) => {
                let archive = reader.as_deref_mut().ok_or(ArchiveError::ArchiveClosed)?;
                writer.raw_copy_file(archive.by_index_raw(*i)?)?;
            }
            Source::File(path) => {
                let mut file = match File::open(path) {
                    Ok(file) => file,
                    Err(e) => {
                        skipped.push(format!("Can't read {}: {e}", path.display()));
                        continue;
                    }
                };
                let file_options = options.large_file(slot.size >= u64::from(u32::MAX));
                writer.start_file(slot.name.as_str(), file_options)?;
                std::io::copy(&mut file, &mut writer)?;
            }
            Source::Bytes(content) => {
                writer.start_file(slot.name.as_str(), options)?;
                writer.write_all(content)?;
            }
            Source::Directory => {
                writer.add_directory(slot.name.as_str(), options)?;
            }
        }
    }

    writer.finish()?;
    Ok(skipped)
}

/// Size and CRC-32 of a file, read in 64 KB chunks.
fn checksum_file(path: &Path) -> std::io::Result<(u64, u32)> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = vec![0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }
    Ok((size, hasher.finalize()))
}

/// Human-readable reason for an open failure.
fn describe(err: &ZipError) -> String {
    match err {
        ZipError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => "No such file".to_string(),
        ZipError::Io(e) => format!("Read error: {e}"),
        ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
            format!("Not a zip archive: {err}")
        }
        other => other.to_string(),
    }
}
