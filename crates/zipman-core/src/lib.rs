//! Folder-aware zip archive manipulation with safe extraction.
//!
//! `zipman-core` wraps an archive codec behind [`ArchiveManager`], which adds
//! a virtual folder cursor for naming entries, recursive directory adds,
//! regex listing, and extraction with whitelist/blacklist selection and
//! zip-slip protection.
//!
//! # Examples
//!
//! ```no_run
//! use zipman_core::ArchiveManager;
//! use zipman_core::CodecKind;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = ArchiveManager::new();
//! manager
//!     .make("/tmp/archive.zip", CodecKind::Zip)?
//!     .folder("docs")
//!     .add_string("hello.txt", "hello")?;
//! manager.close()?;
//!
//! manager.make("/tmp/archive.zip", CodecKind::Zip)?;
//! assert_eq!(manager.list_files(None)?, vec!["docs/hello.txt"]);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod fs;
pub mod manager;
pub mod path;
pub mod report;
pub mod selection;

// Re-export main API types
pub use codec::ArchiveCodec;
pub use codec::CodecKind;
pub use codec::CodecRegistry;
pub use codec::CodecSource;
pub use codec::EntryStat;
pub use codec::MemoryCodec;
pub use codec::ZipCodec;
pub use config::ArchiveConfig;
pub use error::ArchiveError;
pub use error::Result;
pub use fs::Filesystem;
pub use fs::LocalFilesystem;
pub use manager::AddSource;
pub use manager::ArchiveManager;
pub use report::ExtractionReport;
pub use selection::EntryPattern;
pub use selection::ExtractMode;
pub use selection::Selector;
