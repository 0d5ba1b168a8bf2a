// Build progress: enumeration totals, then one tick per conditional.

use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

use crate::types::NodeId;

/// Observer of [`Aggregator::build`](crate::aggregate::Aggregator::build).
pub trait ProgressReporter: Send + Sync {
    /// `count` statements of `node_type` were found.
    fn enumerated(&self, node_type: &str, count: usize);

    /// Processing of `total` conditionals starts.
    fn begin(&self, total: usize);

    /// Conditional `id` was either built or skipped.
    fn processed(&self, id: NodeId, built: bool);

    fn finish(&self);
}

#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn enumerated(&self, _node_type: &str, _count: usize) {}
    fn begin(&self, _total: usize) {}
    fn processed(&self, _id: NodeId, _built: bool) {}
    fn finish(&self) {}
}

/// Terminal progress bar; the message tracks built and skipped counts.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
    built: AtomicUsize,
    skipped: AtomicUsize,
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Never draws. Used for `--quiet` and in tests.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            built: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    /// `(built, skipped)` since the last [`begin`](ProgressReporter::begin).
    pub fn counts(&self) -> (usize, usize) {
        (
            self.built.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
        )
    }

    fn refresh_message(&self) {
        let (built, skipped) = self.counts();
        self.bar.set_message(format!("built {built}, skipped {skipped}"));
    }
}

impl ProgressReporter for IndicatifReporter {
    fn enumerated(&self, node_type: &str, count: usize) {
        self.bar.println(format!("Total number of {node_type}: {count}"));
    }

    fn begin(&self, total: usize) {
        self.built.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template("[{bar:40.green/white}] {pos}/{len} conditionals, {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.refresh_message();
    }

    fn processed(&self, _id: NodeId, built: bool) {
        let counter = if built { &self.built } else { &self.skipped };
        counter.fetch_add(1, Ordering::Relaxed);
        self.refresh_message();
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
