//! Per-line execution counts.
//!
//! Counts come from a gcov-derived `SQLite` table. The table keys files by a
//! flattened path (`src/foo.c` → `#src#foo.c.gcov`); [`CoverageKey`] owns
//! that transform so callers work with catalogue filenames only.

pub mod sqlite;

use crate::config::CoverageSection;
use crate::error::CoverageError;

/// Exact-match execution count lookup.
pub trait CoverageLookup: Send + Sync {
    /// Executions of `line` in `filename`; `0` when the store has no record.
    fn lookup(&self, filename: &str, line: u32) -> Result<u64, CoverageError>;
}

/// Maps a source-relative filename to the coverage store's file key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageKey {
    delimiter: String,
    suffix: String,
}

impl Default for CoverageKey {
    fn default() -> Self {
        Self::from_config(&CoverageSection::default())
    }
}

impl CoverageKey {
    pub fn new(delimiter: &str, suffix: &str) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            suffix: suffix.to_string(),
        }
    }

    pub fn from_config(section: &CoverageSection) -> Self {
        Self::new(&section.key_delimiter, &section.key_suffix)
    }

    pub fn key(&self, filename: &str) -> String {
        let rooted = if filename.starts_with('/') {
            filename.to_string()
        } else {
            format!("/{filename}")
        };
        let mut key = rooted.replace('/', &self.delimiter);
        key.push_str(&self.suffix);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_flattens_rooted_path() {
        let key = CoverageKey::default();
        assert_eq!(key.key("src/foo.c"), "#src#foo.c.gcov");
        assert_eq!(key.key("/src/foo.c"), "#src#foo.c.gcov");
        assert_eq!(key.key("main.c"), "#main.c.gcov");
    }

    #[test]
    fn key_uses_configured_format() {
        let key = CoverageKey::new("__", ".cov");
        assert_eq!(key.key("lib/util.c"), "__lib__util.c.cov");
    }
}
