use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::CoverageError;

use super::{CoverageKey, CoverageLookup};

const SCHEMA_SQL: &str =
    "CREATE TABLE IF NOT EXISTS line_coverage (filename TEXT, line INTEGER, num_executions INTEGER);
     CREATE INDEX IF NOT EXISTS idx_line_coverage_key ON line_coverage(filename, line);";

/// gcov marker for an instrumented line that never ran.
const NEVER_EXECUTED: &str = "#####";
/// gcov marker for a line without code.
const NOT_INSTRUMENTED: &str = "-";

/// Counts from a listing import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub records: u64,
    pub executed: u64,
    /// Distinct file keys in the listing; their previous rows were replaced.
    pub files: u64,
}

/// SQLite-backed line coverage store.
#[derive(Debug)]
pub struct SqliteCoverage {
    conn: Mutex<Connection>,
    key: CoverageKey,
}

impl SqliteCoverage {
    /// Open an existing store for lookups. Never creates or alters the file.
    pub fn open(path: &Path, key: CoverageKey) -> Result<Self, CoverageError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    /// Open (or create) a store for importing.
    pub fn create(path: &Path, key: CoverageKey) -> Result<Self, CoverageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory(key: CoverageKey) -> Result<Self, CoverageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    /// Record one count under a source-relative filename, replacing any previous count.
    pub fn insert(&self, filename: &str, line: u32, num_executions: u64) -> Result<(), CoverageError> {
        let key = self.key.key(filename);
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM line_coverage WHERE filename = ?1 AND line = ?2",
            params![key, line],
        )?;
        tx.execute(
            "INSERT INTO line_coverage (filename, line, num_executions) VALUES (?1, ?2, ?3)",
            params![key, line, clamp_count(num_executions)],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Load a `filename<TAB>line<TAB>count` listing in one transaction.
    ///
    /// Filenames are stored verbatim; the listing already uses the store's key format.
    /// Every file named in the listing loses the rows of earlier imports.
    pub fn import_listing<R: BufRead>(&self, reader: R) -> Result<ImportStats, CoverageError> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction()?;
        let mut stats = ImportStats::default();
        {
            let mut clear = tx.prepare("DELETE FROM line_coverage WHERE filename = ?1")?;
            let mut stmt = tx.prepare(
                "INSERT INTO line_coverage (filename, line, num_executions) VALUES (?1, ?2, ?3)",
            )?;
            let mut replaced: HashSet<String> = HashSet::new();
            for (idx, raw) in reader.lines().enumerate() {
                let raw = raw?;
                if raw.trim().is_empty() {
                    continue;
                }
                let (filename, line, count) = parse_listing_record(&raw, idx + 1)?;
                if replaced.insert(filename.to_string()) {
                    let removed = clear.execute(params![filename])?;
                    debug!(%filename, removed, "Replacing file coverage");
                    stats.files += 1;
                }
                stmt.execute(params![filename, line, clamp_count(count)])?;
                stats.records += 1;
                if count > 0 {
                    stats.executed += 1;
                }
            }
        }
        tx.commit()?;
        info!(
            records = stats.records,
            executed = stats.executed,
            files = stats.files,
            "Imported line coverage"
        );
        Ok(stats)
    }
}

impl CoverageLookup for SqliteCoverage {
    fn lookup(&self, filename: &str, line: u32) -> Result<u64, CoverageError> {
        let key = self.key.key(filename);
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut exact = conn.prepare_cached(
            "SELECT CAST(num_executions AS INTEGER) FROM line_coverage
             WHERE filename = ?1 AND line = ?2
             LIMIT 1",
        )?;
        let mut count: Option<i64> = exact
            .query_row(params![key, line], |row| row.get(0))
            .optional()?;
        if count.is_none() {
            // Stores written by older importers may hold `line` as padded text.
            let mut cast = conn.prepare_cached(
                "SELECT CAST(num_executions AS INTEGER) FROM line_coverage
                 WHERE filename = ?1 AND CAST(line AS INTEGER) = ?2
                 LIMIT 1",
            )?;
            count = cast
                .query_row(params![key, line], |row| row.get(0))
                .optional()?;
        }
        debug!(%key, line, ?count, "Coverage lookup");
        Ok(count.map_or(0, |c| u64::try_from(c).unwrap_or(0)))
    }
}

fn clamp_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn parse_listing_record(raw: &str, line_no: usize) -> Result<(&str, u32, u64), CoverageError> {
    let malformed = |message: String| CoverageError::MalformedRecord {
        line: line_no,
        message,
    };
    let fields: Vec<&str> = raw.trim_end_matches(['\r', '\n']).split('\t').collect();
    let [filename, line, count] = fields.as_slice() else {
        return Err(malformed(format!(
            "expected 3 tab-separated fields, found {}",
            fields.len()
        )));
    };
    let line = line
        .trim()
        .parse()
        .map_err(|_| malformed(format!("line {line:?} is not a number")))?;
    let count = match count.trim() {
        NEVER_EXECUTED | NOT_INSTRUMENTED => 0,
        other => other
            .parse()
            .map_err(|_| malformed(format!("count {other:?} is not a number")))?,
    };
    Ok((*filename, line, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteCoverage {
        SqliteCoverage::in_memory(CoverageKey::default()).unwrap()
    }

    #[test]
    fn lookup_hit_and_miss() {
        let store = store();
        store.insert("src/foo.c", 10, 42).unwrap();
        assert_eq!(store.lookup("src/foo.c", 10).unwrap(), 42);
        assert_eq!(store.lookup("src/foo.c", 11).unwrap(), 0);
        assert_eq!(store.lookup("src/bar.c", 10).unwrap(), 0);
    }

    #[test]
    fn lookup_is_exact_match() {
        let store = store();
        store.insert("src/foo.c", 10, 3).unwrap();
        assert_eq!(store.lookup("foo.c", 10).unwrap(), 0);
        assert_eq!(store.lookup("src/foo", 10).unwrap(), 0);
    }

    #[test]
    fn import_maps_gcov_markers_to_zero() {
        let store = store();
        let listing = "#src#foo.c.gcov\t10\t7\n#src#foo.c.gcov\t11\t#####\n\n#src#foo.c.gcov\t12\t-\n";
        let stats = store.import_listing(listing.as_bytes()).unwrap();
        assert_eq!(
            stats,
            ImportStats {
                records: 3,
                executed: 1,
                files: 1,
            }
        );
        assert_eq!(store.lookup("src/foo.c", 10).unwrap(), 7);
        assert_eq!(store.lookup("src/foo.c", 11).unwrap(), 0);
        assert_eq!(store.lookup("src/foo.c", 12).unwrap(), 0);
    }

    #[test]
    fn malformed_record_aborts_import() {
        let store = store();
        let listing = "#a.c.gcov\t1\t5\n#a.c.gcov\tone\t5\n";
        let err = store.import_listing(listing.as_bytes()).unwrap_err();
        assert!(matches!(err, CoverageError::MalformedRecord { line: 2, .. }));
        assert_eq!(store.lookup("a.c", 1).unwrap(), 0, "transaction rolled back");

        let err = store.import_listing("#a.c.gcov\t1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CoverageError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn text_typed_lines_still_match() {
        let store = store();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO line_coverage VALUES ('#src#old.c.gcov', '15', 4)",
                [],
            )
            .unwrap();
        }
        assert_eq!(store.lookup("src/old.c", 15).unwrap(), 4);
    }

    #[test]
    fn legacy_text_column_matches_exact_and_padded_lines() {
        let store = store();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute_batch(
                "DROP TABLE line_coverage;
                 CREATE TABLE line_coverage (filename TEXT, line TEXT, num_executions TEXT);
                 INSERT INTO line_coverage VALUES ('#src#old.c.gcov', '15', '4');
                 INSERT INTO line_coverage VALUES ('#src#old.c.gcov', ' 20', '6');",
            )
            .unwrap();
        }
        assert_eq!(store.lookup("src/old.c", 15).unwrap(), 4);
        assert_eq!(store.lookup("src/old.c", 20).unwrap(), 6);
        assert_eq!(store.lookup("src/old.c", 21).unwrap(), 0);
    }

    #[test]
    fn reimport_replaces_previous_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.db");
        {
            let store = SqliteCoverage::create(&path, CoverageKey::default()).unwrap();
            store
                .import_listing("#src#a.c.gcov\t10\t#####\n#src#a.c.gcov\t11\t3\n#src#b.c.gcov\t1\t8\n".as_bytes())
                .unwrap();
        }
        {
            let store = SqliteCoverage::create(&path, CoverageKey::default()).unwrap();
            let stats = store
                .import_listing("#src#a.c.gcov\t10\t42\n".as_bytes())
                .unwrap();
            assert_eq!(stats.files, 1);
        }

        let store = SqliteCoverage::open(&path, CoverageKey::default()).unwrap();
        assert_eq!(store.lookup("src/a.c", 10).unwrap(), 42);
        assert_eq!(store.lookup("src/a.c", 11).unwrap(), 0, "stale line dropped with its file");
        assert_eq!(store.lookup("src/b.c", 1).unwrap(), 8, "files absent from the listing are kept");
    }

    #[test]
    fn insert_overwrites_same_line() {
        let store = store();
        store.insert("src/a.c", 5, 1).unwrap();
        store.insert("src/a.c", 5, 9).unwrap();
        assert_eq!(store.lookup("src/a.c", 5).unwrap(), 9);
        let rows: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM line_coverage", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn open_is_read_only_and_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.db");
        assert!(SqliteCoverage::open(&path, CoverageKey::default()).is_err());

        {
            let store = SqliteCoverage::create(&path, CoverageKey::default()).unwrap();
            store.insert("src/x.c", 1, 9).unwrap();
        }
        let store = SqliteCoverage::open(&path, CoverageKey::default()).unwrap();
        assert_eq!(store.lookup("src/x.c", 1).unwrap(), 9);
        assert!(store.insert("src/x.c", 2, 1).is_err());
    }
}
