//! Extraction operation reporting.

use std::time::Duration;

/// Report of one extraction call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Number of entries written to the destination.
    pub files_extracted: usize,

    /// Number of in-scope entries the selection did not pick.
    pub files_skipped: usize,

    /// Number of entries ignored because they lie outside the current folder.
    pub files_out_of_scope: usize,

    /// Total bytes written to disk.
    pub bytes_written: u64,

    /// Duration of the extraction.
    pub duration: Duration,
}

impl ExtractionReport {
    /// Creates a new empty extraction report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries the selection was evaluated on.
    #[must_use]
    pub const fn files_considered(&self) -> usize {
        self.files_extracted + self.files_skipped
    }

    /// Returns `true` if nothing was written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.files_extracted == 0
    }
}
