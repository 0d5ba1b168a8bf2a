//! Interactive triage of a saved catalogue.
//!
//! A [`ReviewSession`] walks the catalogue in order, shows each conditional
//! that passes the [`ReviewFilter`], and records the operator's annotation.
//! Every way out of the walk (end of catalogue, Ctrl-C, end of input) goes
//! through [`ReviewState::Saving`].

mod editor;
mod operator;

pub use editor::{CommandEditor, Editor, NullEditor};
pub use operator::{Decision, Operator, annotation_for};

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::catalogue::{Catalogue, SaveReport};
use crate::error::CatalogueError;
use crate::filter::{ReviewFilter, is_of_interest};
use crate::render::render_conditional;

/// Where the review loop is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Idle,
    /// Looking at the record at `cursor`.
    Reviewing { cursor: usize },
    /// The record at `cursor` failed the filter.
    Skipping { cursor: usize },
    /// The operator answered `input` for the record at `cursor`.
    Annotating { cursor: usize, input: String },
    Saving { interrupted: bool },
    Terminal,
}

/// Result of a completed session.
#[derive(Debug)]
pub struct ReviewOutcome {
    /// Records shown to the operator.
    pub surfaced: usize,
    /// Inputs that set an importance.
    pub annotated: usize,
    /// The operator stopped before the end of the catalogue.
    pub interrupted: bool,
    pub save: SaveReport,
    pub catalogue: Catalogue,
}

pub struct ReviewSession<'a> {
    catalogue: Catalogue,
    path: PathBuf,
    source_root: PathBuf,
    filter: ReviewFilter,
    operator: &'a mut dyn Operator,
    editor: &'a mut dyn Editor,
    state: ReviewState,
    opened: Option<PathBuf>,
    surfaced: usize,
    annotated: usize,
    interrupted: bool,
    save: Option<SaveReport>,
}

impl std::fmt::Debug for ReviewSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewSession")
            .field("path", &self.path)
            .field("source_root", &self.source_root)
            .field("filter", &self.filter)
            .field("state", &self.state)
            .field("surfaced", &self.surfaced)
            .field("annotated", &self.annotated)
            .finish_non_exhaustive()
    }
}

impl<'a> ReviewSession<'a> {
    /// `path` is where the catalogue was loaded from and is saved back to.
    pub fn new(
        catalogue: Catalogue,
        path: &Path,
        source_root: &Path,
        filter: ReviewFilter,
        operator: &'a mut dyn Operator,
        editor: &'a mut dyn Editor,
    ) -> Self {
        Self {
            catalogue,
            path: path.to_path_buf(),
            source_root: source_root.to_path_buf(),
            filter,
            operator,
            editor,
            state: ReviewState::Idle,
            opened: None,
            surfaced: 0,
            annotated: 0,
            interrupted: false,
            save: None,
        }
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    /// Drive the session to [`ReviewState::Terminal`].
    ///
    /// A failed save is returned as [`CatalogueError::Unsaved`].
    pub async fn run(mut self) -> Result<ReviewOutcome, CatalogueError> {
        info!(
            path = %self.path.display(),
            conditionals = self.catalogue.len(),
            "Starting review"
        );
        while self.state != ReviewState::Terminal {
            self.step().await?;
        }

        info!(
            surfaced = self.surfaced,
            annotated = self.annotated,
            interrupted = self.interrupted,
            "Review finished"
        );
        let save = self.save.take().ok_or_else(|| {
            CatalogueError::Io(std::io::Error::other("review ended without saving"))
        })?;
        Ok(ReviewOutcome {
            surfaced: self.surfaced,
            annotated: self.annotated,
            interrupted: self.interrupted,
            save,
            catalogue: self.catalogue,
        })
    }

    /// Advance by one transition.
    pub async fn step(&mut self) -> Result<(), CatalogueError> {
        let state = std::mem::replace(&mut self.state, ReviewState::Terminal);
        self.state = match state {
            ReviewState::Idle => ReviewState::Reviewing { cursor: 0 },
            ReviewState::Reviewing { cursor } => self.review(cursor).await,
            ReviewState::Skipping { cursor } => ReviewState::Reviewing { cursor: cursor + 1 },
            ReviewState::Annotating { cursor, input } => {
                self.annotate(cursor, &input);
                ReviewState::Reviewing { cursor: cursor + 1 }
            }
            ReviewState::Saving { interrupted } => {
                self.interrupted = interrupted;
                self.finish()?;
                ReviewState::Terminal
            }
            ReviewState::Terminal => ReviewState::Terminal,
        };
        Ok(())
    }

    async fn review(&mut self, cursor: usize) -> ReviewState {
        let Some(conditional) = self.catalogue.get(cursor) else {
            return ReviewState::Saving { interrupted: false };
        };
        if !is_of_interest(conditional, &self.filter) {
            debug!(index = conditional.index, "Not of interest");
            return ReviewState::Skipping { cursor };
        }

        let summary = render_conditional(conditional);
        let location = self.source_root.join(&conditional.filename);
        let line = conditional.line;
        self.surfaced += 1;

        if let Some(previous) = self.opened.take() {
            if let Err(e) = self.editor.close(&previous) {
                warn!(path = %previous.display(), error = %e, "Editor close failed");
            }
        }
        if let Err(e) = self.editor.open(&location, line) {
            warn!(path = %location.display(), error = %e, "Editor open failed");
        }
        self.opened = Some(location);

        match self.operator.decide(&summary).await {
            Decision::Input(input) => ReviewState::Annotating { cursor, input },
            Decision::Interrupt => ReviewState::Saving { interrupted: true },
        }
    }

    fn annotate(&mut self, cursor: usize, input: &str) {
        let Some(importance) = annotation_for(input) else {
            return;
        };
        if let Some(conditional) = self.catalogue.get_mut(cursor) {
            debug!(index = conditional.index, importance = importance.as_str(), "Annotated");
            conditional.importance = importance;
            self.annotated += 1;
        }
    }

    fn finish(&mut self) -> Result<(), CatalogueError> {
        if let Some(previous) = self.opened.take() {
            if let Err(e) = self.editor.close(&previous) {
                warn!(path = %previous.display(), error = %e, "Editor close failed");
            }
        }
        match self.catalogue.save(&self.path) {
            Ok(report) => {
                self.save = Some(report);
                Ok(())
            }
            Err(source) => Err(CatalogueError::Unsaved {
                annotations: self.annotated,
                source: Box::new(source),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use super::*;
    use crate::types::{Branch, Conditional, Importance, NodeId};

    struct Script {
        decisions: VecDeque<Decision>,
        seen: Vec<String>,
    }

    impl Script {
        fn new(decisions: &[&str]) -> Self {
            Self {
                decisions: decisions
                    .iter()
                    .map(|d| {
                        if *d == "^C" {
                            Decision::Interrupt
                        } else {
                            Decision::Input((*d).to_string())
                        }
                    })
                    .collect(),
                seen: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Operator for Script {
        async fn decide(&mut self, summary: &str) -> Decision {
            self.seen.push(summary.to_string());
            self.decisions.pop_front().unwrap_or(Decision::Interrupt)
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Editor for Recorder {
        fn open(&mut self, path: &Path, line: u32) -> std::io::Result<()> {
            self.calls.push(format!("open {}:{line}", path.display()));
            Ok(())
        }

        fn close(&mut self, path: &Path) -> std::io::Result<()> {
            self.calls.push(format!("close {}", path.display()));
            Ok(())
        }
    }

    fn conditional(index: usize, counts: [u64; 2]) -> Conditional {
        let branch = |offset: u64, label: &str, n: u64| Branch {
            parent_id: NodeId(index as u64),
            id: NodeId(index as u64 * 10 + offset),
            filename: "src/a.c".into(),
            line: u32::try_from(index).unwrap() * 10 + 1 + u32::try_from(offset).unwrap(),
            code: "x".into(),
            cfg_label: label.into(),
            num_executions: n,
            is_covered: n != 0,
        };
        let mut c = Conditional {
            id: NodeId(index as u64),
            index,
            code: format!("if (c{index})"),
            filename: "src/a.c".into(),
            line: u32::try_from(index).unwrap() * 10,
            branches: vec![branch(0, "True", counts[0]), branch(1, "False", counts[1])],
            branch_true: None,
            branch_false: None,
            importance: Importance::Show,
        };
        c.assign_branch_roles();
        c
    }

    /// Records 0, 2, 3 have a dead branch; record 1 is balanced.
    fn catalogue() -> Catalogue {
        Catalogue::new(vec![
            conditional(0, [5, 0]),
            conditional(1, [5, 5]),
            conditional(2, [0, 3]),
            conditional(3, [9, 0]),
        ])
    }

    fn saved(dir: &Path) -> PathBuf {
        let path = dir.join("catalogue.json");
        catalogue().save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn walks_interesting_records_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved(dir.path());
        let mut operator = Script::new(&["h", "", "i"]);
        let mut editor = Recorder::default();

        let session = ReviewSession::new(
            Catalogue::load(&path).unwrap(),
            &path,
            Path::new("/code"),
            ReviewFilter::default(),
            &mut operator,
            &mut editor,
        );
        let outcome = session.run().await.unwrap();

        assert_eq!(outcome.surfaced, 3);
        assert_eq!(outcome.annotated, 2);
        assert!(!outcome.interrupted);
        assert_eq!(operator.seen.len(), 3);
        assert!(operator.seen[0].starts_with("Conditional(0):"));
        assert!(operator.seen[1].starts_with("Conditional(2):"));

        let reloaded = Catalogue::load(&path).unwrap();
        let importances: Vec<Importance> = reloaded.iter().map(|c| c.importance).collect();
        assert_eq!(
            importances,
            vec![
                Importance::Highlight,
                Importance::Show,
                Importance::Show,
                Importance::Ignore
            ]
        );
        assert_eq!(outcome.catalogue, reloaded);
    }

    #[tokio::test]
    async fn interrupt_saves_what_was_annotated() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved(dir.path());
        let before = Catalogue::load(&path).unwrap();
        let mut operator = Script::new(&["h", "^C"]);
        let mut editor = NullEditor;

        let outcome = ReviewSession::new(
            before.clone(),
            &path,
            Path::new("/code"),
            ReviewFilter::default(),
            &mut operator,
            &mut editor,
        )
        .run()
        .await
        .unwrap();

        assert!(outcome.interrupted);
        assert_eq!(outcome.annotated, 1);
        let backup = outcome.save.backup.unwrap();
        assert_eq!(Catalogue::load(&backup).unwrap(), before);

        let after = Catalogue::load(&path).unwrap();
        assert_eq!(after.get(0).unwrap().importance, Importance::Highlight);
        assert!(after.iter().skip(1).all(|c| c.importance == Importance::Show));
    }

    #[tokio::test]
    async fn editor_follows_surfaced_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved(dir.path());
        let mut operator = Script::new(&["", "^C"]);
        let mut editor = Recorder::default();

        ReviewSession::new(
            Catalogue::load(&path).unwrap(),
            &path,
            Path::new("/code"),
            ReviewFilter::default(),
            &mut operator,
            &mut editor,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(
            editor.calls,
            vec![
                "open /code/src/a.c:0",
                "close /code/src/a.c",
                "open /code/src/a.c:20",
                "close /code/src/a.c",
            ]
        );
    }

    #[tokio::test]
    async fn highlighted_only_review_shows_highlights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.json");
        let mut catalogue = catalogue();
        catalogue.get_mut(1).unwrap().importance = Importance::Highlight;
        catalogue.save(&path).unwrap();

        let mut operator = Script::new(&[]);
        let mut editor = NullEditor;
        let filter = ReviewFilter::new(1.0, true, None, 0).unwrap();
        let outcome = ReviewSession::new(
            catalogue,
            &path,
            Path::new("."),
            filter,
            &mut operator,
            &mut editor,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(operator.seen.len(), 1);
        assert!(operator.seen[0].contains("if (c1)"));
        assert!(outcome.interrupted);
    }

    #[tokio::test]
    async fn failed_save_reports_unsaved_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("catalogue.json");
        let mut operator = Script::new(&["h", "i", "^C"]);
        let mut editor = NullEditor;

        let err = ReviewSession::new(
            catalogue(),
            &path,
            Path::new("."),
            ReviewFilter::default(),
            &mut operator,
            &mut editor,
        )
        .run()
        .await
        .unwrap_err();

        match err {
            CatalogueError::Unsaved { annotations, .. } => assert_eq!(annotations, 2),
            other => panic!("expected Unsaved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn states_are_visited_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved(dir.path());
        let mut operator = Script::new(&["x"]);
        let mut editor = NullEditor;
        let mut session = ReviewSession::new(
            Catalogue::load(&path).unwrap(),
            &path,
            Path::new("."),
            ReviewFilter::default(),
            &mut operator,
            &mut editor,
        );

        let mut states = vec![session.state().clone()];
        while *session.state() != ReviewState::Terminal {
            session.step().await.unwrap();
            states.push(session.state().clone());
        }

        assert_eq!(
            &states[..6],
            &[
                ReviewState::Idle,
                ReviewState::Reviewing { cursor: 0 },
                ReviewState::Annotating {
                    cursor: 0,
                    input: "x".into()
                },
                ReviewState::Reviewing { cursor: 1 },
                ReviewState::Skipping { cursor: 1 },
                ReviewState::Reviewing { cursor: 2 },
            ]
        );
        assert_eq!(
            &states[states.len() - 2..],
            &[
                ReviewState::Saving { interrupted: true },
                ReviewState::Terminal
            ]
        );
    }
}
