//! The persisted, ordered collection of conditionals.
//!
//! Saving always rewrites the whole catalogue: the previous file is copied to
//! a `~` backup, the new content goes to a temporary file in the same
//! directory, and the temporary file is renamed over the target.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CatalogueError;
use crate::types::{Conditional, Importance};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalogue {
    conditionals: Vec<Conditional>,
}

/// What a save touched on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    /// Set when a previous catalogue existed and was copied aside.
    pub backup: Option<PathBuf>,
}

/// Annotation counts, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogueStats {
    pub conditionals: usize,
    pub files: usize,
    pub highlighted: usize,
    pub ignored: usize,
}

impl Catalogue {
    /// Wrap records that are already in catalogue order.
    pub fn new(conditionals: Vec<Conditional>) -> Self {
        Self { conditionals }
    }

    /// Group by filename in first-encounter order, sorting each group by line.
    pub fn grouped(conditionals: Vec<Conditional>) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Conditional>> = HashMap::new();
        for conditional in conditionals {
            if !groups.contains_key(&conditional.filename) {
                order.push(conditional.filename.clone());
            }
            groups
                .entry(conditional.filename.clone())
                .or_default()
                .push(conditional);
        }

        let mut sorted = Vec::new();
        for filename in order {
            if let Some(mut group) = groups.remove(&filename) {
                group.sort_by_key(|c| c.line);
                sorted.extend(group);
            }
        }
        Self::new(sorted)
    }

    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Conditional> {
        self.conditionals.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Conditional> {
        self.conditionals.get_mut(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Conditional> {
        self.conditionals.iter()
    }

    pub fn stats(&self) -> CatalogueStats {
        let mut files: Vec<&str> = self.conditionals.iter().map(|c| c.filename.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        CatalogueStats {
            conditionals: self.conditionals.len(),
            files: files.len(),
            highlighted: self.count_importance(Importance::Highlight),
            ignored: self.count_importance(Importance::Ignore),
        }
    }

    fn count_importance(&self, importance: Importance) -> usize {
        self.conditionals
            .iter()
            .filter(|c| c.importance == importance)
            .count()
    }

    /// Read a whole catalogue.
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let file = File::open(path)?;
        let catalogue: Self = serde_json::from_reader(BufReader::new(file))?;
        debug!(path = %path.display(), conditionals = catalogue.len(), "Loaded catalogue");
        Ok(catalogue)
    }

    /// Back up the existing file, then atomically replace it with this catalogue.
    pub fn save(&self, path: &Path) -> Result<SaveReport, CatalogueError> {
        let backup = if path.exists() {
            let backup = backup_path(path);
            std::fs::copy(path, &backup)?;
            Some(backup)
        } else {
            None
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| CatalogueError::Io(e.error))?;

        info!(path = %path.display(), conditionals = self.len(), "Saved catalogue");
        Ok(SaveReport {
            path: path.to_path_buf(),
            backup,
        })
    }
}

impl<'a> IntoIterator for &'a Catalogue {
    type Item = &'a Conditional;
    type IntoIter = std::slice::Iter<'a, Conditional>;

    fn into_iter(self) -> Self::IntoIter {
        self.conditionals.iter()
    }
}

/// `catalogue.json` → `catalogue.json~`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("~");
    PathBuf::from(name)
}
