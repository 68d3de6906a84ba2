//! Tunables for archive codecs and the manager.

use crate::selection::ExtractMode;

/// Configuration shared by the manager and the codecs it opens.
///
/// # Examples
///
/// ```
/// use zipman_core::ArchiveConfig;
///
/// let stored = ArchiveConfig {
///     compression_level: Some(0),
///     ..Default::default()
/// };
/// assert_eq!(stored.directory_mode, 0o755);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Compression level for newly written entries.
    ///
    /// `Some(0)` stores entries uncompressed, any other value selects
    /// Deflate at that level. `None` uses level 6.
    pub compression_level: Option<u8>,

    /// Permission bits for directories the manager creates (Unix only).
    pub directory_mode: u32,

    /// Selection mode used by `ArchiveManager::extract_to_default`.
    pub default_mode: ExtractMode,
}

impl Default for ArchiveConfig {
    /// Default values:
    /// - `compression_level`: `Some(6)`
    /// - `directory_mode`: `0o755`
    /// - `default_mode`: `ExtractMode::BLACKLIST`
    fn default() -> Self {
        Self {
            compression_level: Some(6),
            directory_mode: 0o755,
            default_mode: ExtractMode::BLACKLIST,
        }
    }
}

impl ArchiveConfig {
    /// Returns a configuration that stores entries without compression.
    #[must_use]
    pub fn stored() -> Self {
        Self {
            compression_level: Some(0),
            ..Self::default()
        }
    }

    /// Returns the effective Deflate level, or `None` when entries are stored.
    #[must_use]
    pub fn deflate_level(&self) -> Option<u8> {
        match self.compression_level {
            Some(0) => None,
            Some(level) => Some(level.min(9)),
            None => Some(6),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArchiveConfig::default();
        assert_eq!(config.compression_level, Some(6));
        assert_eq!(config.default_mode, ExtractMode::BLACKLIST);
        assert_eq!(config.deflate_level(), Some(6));
    }

    #[test]
    fn test_stored_config() {
        assert_eq!(ArchiveConfig::stored().deflate_level(), None);
    }

    #[test]
    fn test_level_is_clamped() {
        let config = ArchiveConfig {
            compression_level: Some(42),
            ..Default::default()
        };
        assert_eq!(config.deflate_level(), Some(9));
    }

    #[test]
    fn test_unset_level_uses_default() {
        let config = ArchiveConfig {
            compression_level: None,
            ..Default::default()
        };
        assert_eq!(config.deflate_level(), Some(6));
    }
}
