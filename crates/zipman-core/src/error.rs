//! Error types for archive manipulation and extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ArchiveError`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors that can occur while manipulating or extracting an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller-supplied argument is unusable (unknown codec kind, empty
    /// pattern, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The codec could not open or create the archive file.
    #[error("failed to open {path}: {status}")]
    Open {
        /// Archive path that was being opened.
        path: PathBuf,
        /// Codec description of the failure.
        status: String,
    },

    /// Archive is corrupted or the codec failed while reading/writing it.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// A directory could not be created.
    #[error("failed to create folder {path}: {source}")]
    FolderCreation {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The directory that should hold the archive is not writable.
    #[error("the path \"{path}\" is not writable")]
    NotWritable {
        /// The read-only directory.
        path: PathBuf,
    },

    /// Requested entry does not exist in the archive.
    #[error("the file \"{name}\" cannot be found")]
    EntryNotFound {
        /// Entry name as requested by the caller.
        name: String,
    },

    /// Extraction target resolves outside the destination directory.
    #[error("path traversal detected: entry '{entry}' resolves to {target}")]
    PathTraversal {
        /// Raw entry name inside the archive.
        entry: String,
        /// Normalized destination the entry would have been written to.
        target: PathBuf,
    },

    /// Regular expression could not be used.
    #[error(
        "regular expression match on '{entry}' failed with error. Please check if pattern is valid regular expression: {reason}"
    )]
    InvalidPattern {
        /// First entry the pattern was tested against.
        entry: String,
        /// The pattern as supplied by the caller.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// No archive is open on the manager.
    #[error("no archive is open")]
    ArchiveClosed,
}

impl ArchiveError {
    /// Returns `true` if this error signals a potentially hostile archive.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use zipman_core::ArchiveError;
    ///
    /// let err = ArchiveError::PathTraversal {
    ///     entry: "../../etc/passwd".to_string(),
    ///     target: PathBuf::from("/etc/passwd"),
    /// };
    /// assert!(err.is_security_violation());
    ///
    /// let err = ArchiveError::ArchiveClosed;
    /// assert!(!err.is_security_violation());
    /// ```
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }

    /// Returns the archive entry name this error refers to, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use zipman_core::ArchiveError;
    ///
    /// let err = ArchiveError::EntryNotFound {
    ///     name: "baz".to_string(),
    /// };
    /// assert_eq!(err.entry_name(), Some("baz"));
    /// assert_eq!(ArchiveError::ArchiveClosed.entry_name(), None);
    /// ```
    #[must_use]
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Self::EntryNotFound { name } => Some(name),
            Self::PathTraversal { entry, .. } | Self::InvalidPattern { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            zip::result::ZipError::FileNotFound => Self::InvalidArchive("entry not found".into()),
            other => Self::InvalidArchive(other.to_string()),
        }
    }
}
