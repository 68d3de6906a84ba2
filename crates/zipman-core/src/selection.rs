//! Entry selection for listing and extraction.
//!
//! Two kinds of predicates exist: [`Selector`] tests an entry name against a
//! list of names (exact or prefix membership) and [`EntryPattern`] tests it
//! against a regular expression. Both operate on entry names that already had
//! the manager's internal folder prefix stripped.

use std::ops::BitOr;
use std::ops::BitOrAssign;

use regex::Regex;

use crate::ArchiveError;
use crate::Result;

/// Bit flags controlling how [`Selector`] treats its names.
///
/// `WHITELIST` extracts the matching entries, `BLACKLIST` extracts everything
/// else. `EXACT_MATCH` switches membership from "starts with" to equality.
/// When both `WHITELIST` and `BLACKLIST` are set, `WHITELIST` wins.
///
/// # Examples
///
/// ```
/// use zipman_core::ExtractMode;
///
/// let mode = ExtractMode::WHITELIST | ExtractMode::EXACT_MATCH;
/// assert!(mode.is_whitelist());
/// assert!(mode.is_exact_match());
/// assert_eq!(mode.bits(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtractMode(u8);

impl ExtractMode {
    /// Extract only the entries matched by the selector.
    pub const WHITELIST: Self = Self(1);
    /// Extract every entry not matched by the selector.
    pub const BLACKLIST: Self = Self(2);
    /// Compare names for equality instead of prefix.
    pub const EXACT_MATCH: Self = Self(4);

    /// Builds a mode from raw bits, ignoring unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// Returns the raw bit value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if matching entries are the ones extracted.
    #[must_use]
    pub const fn is_whitelist(self) -> bool {
        self.contains(Self::WHITELIST)
    }

    /// Returns `true` if names are compared for equality.
    #[must_use]
    pub const fn is_exact_match(self) -> bool {
        self.contains(Self::EXACT_MATCH)
    }
}

impl Default for ExtractMode {
    fn default() -> Self {
        Self::BLACKLIST
    }
}

impl BitOr for ExtractMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExtractMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Name-list predicate built for a single extraction call.
#[derive(Debug, Clone)]
pub struct Selector {
    names: Vec<String>,
    exact: bool,
    keep_matches: bool,
}

impl Selector {
    /// Builds a selector over `names` with the semantics of `mode`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zipman_core::ExtractMode;
    /// use zipman_core::selection::Selector;
    ///
    /// let prefix = Selector::new(&["foo"], ExtractMode::WHITELIST);
    /// assert!(prefix.selects("foo"));
    /// assert!(prefix.selects("foo/bar.txt"));
    /// assert!(prefix.selects("foobar"));
    ///
    /// let exact = Selector::new(&["foo"], ExtractMode::WHITELIST | ExtractMode::EXACT_MATCH);
    /// assert!(exact.selects("foo"));
    /// assert!(!exact.selects("foobar"));
    /// ```
    pub fn new<S: AsRef<str>>(names: &[S], mode: ExtractMode) -> Self {
        Self {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            exact: mode.is_exact_match(),
            keep_matches: mode.is_whitelist(),
        }
    }

    /// Returns `true` if `name` is in the selector's list.
    pub fn matches(&self, name: &str) -> bool {
        if self.exact {
            self.names.iter().any(|n| n == name)
        } else {
            self.names.iter().any(|n| name.starts_with(n.as_str()))
        }
    }

    /// Returns `true` if the entry should be extracted.
    pub fn selects(&self, name: &str) -> bool {
        self.matches(name) == self.keep_matches
    }
}

/// Regular expression that is compiled on first use.
///
/// Accepts plain `regex` syntax (`\.txt$`) as well as delimited patterns
/// with trailing flags (`/\.txt$/i`). Compilation is deferred until the
/// first entry is tested so that a malformed pattern is reported together
/// with the entry name it was applied to.
#[derive(Debug, Clone)]
pub struct EntryPattern {
    source: String,
    compiled: Option<Regex>,
}

/// Characters accepted as pattern delimiters.
const DELIMITERS: &[char] = &['/', '#', '~', '!', '@', '%', '|'];

impl EntryPattern {
    /// Creates a pattern from its textual form.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::InvalidArgument` if `pattern` is empty.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(ArchiveError::InvalidArgument(
                "a non-empty regular expression is required".to_string(),
            ));
        }
        Ok(Self {
            source: pattern.to_string(),
            compiled: None,
        })
    }

    /// Returns the pattern as supplied.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Tests `entry` against the pattern, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::InvalidPattern` naming `entry` if the pattern
    /// cannot be compiled.
    pub fn is_match(&mut self, entry: &str) -> Result<bool> {
        if let Some(regex) = &self.compiled {
            return Ok(regex.is_match(entry));
        }

        let regex = translate(&self.source)
            .and_then(|expr| Regex::new(&expr).map_err(|e| e.to_string()))
            .map_err(|reason| ArchiveError::InvalidPattern {
                entry: entry.to_string(),
                pattern: self.source.clone(),
                reason,
            })?;
        let matched = regex.is_match(entry);
        self.compiled = Some(regex);
        Ok(matched)
    }
}

/// Converts a possibly delimited pattern into `regex` syntax.
fn translate(pattern: &str) -> std::result::Result<String, String> {
    let Some((body, flags)) = split_delimited(pattern) else {
        return Ok(pattern.to_string());
    };

    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' | 'U' => inline.push(flag),
            // Unicode is always on; `$` already anchors at the very end.
            'u' | 'D' => {}
            other => return Err(format!("unknown modifier '{other}'")),
        }
    }

    if inline.is_empty() {
        Ok(body.to_string())
    } else {
        Ok(format!("(?{inline}){body}"))
    }
}

/// Splits `/body/flags` into its body and flags.
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let delimiter = pattern.chars().next().filter(|c| DELIMITERS.contains(c))?;
    let rest = &pattern[delimiter.len_utf8()..];
    let end = rest.rfind(delimiter)?;
    let flags = &rest[end + delimiter.len_utf8()..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((&rest[..end], flags))
}
