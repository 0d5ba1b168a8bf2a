// Interest filter: which conditionals the review loop surfaces.

use crate::config::validate_threshold;
use crate::error::ConfigError;
use crate::types::{Conditional, Importance};

/// Review-time selection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewFilter {
    pub highlighted_only: bool,
    /// Substring the conditional's filename must contain.
    pub filter_file: Option<String>,
    pub start_index: usize,
    threshold: f64,
}

impl Default for ReviewFilter {
    fn default() -> Self {
        Self {
            highlighted_only: false,
            filter_file: None,
            start_index: 0,
            threshold: 1.0,
        }
    }
}

impl ReviewFilter {
    /// `threshold` must lie in `[0, 1]`.
    pub fn new(
        threshold: f64,
        highlighted_only: bool,
        filter_file: Option<String>,
        start_index: usize,
    ) -> Result<Self, ConfigError> {
        validate_threshold(threshold)?;
        Ok(Self {
            highlighted_only,
            filter_file,
            start_index,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Whether the review loop should show `conditional`. First matching rule wins.
#[allow(clippy::cast_precision_loss)]
pub fn is_of_interest(conditional: &Conditional, filter: &ReviewFilter) -> bool {
    if filter.highlighted_only && conditional.importance != Importance::Highlight {
        return false;
    }
    match conditional.importance {
        Importance::Ignore => return false,
        Importance::Highlight => return true,
        Importance::Show => {}
    }
    if let Some(needle) = &filter.filter_file {
        if !conditional.filename.contains(needle.as_str()) {
            return false;
        }
    }
    if conditional.index < filter.start_index {
        return false;
    }

    let total = conditional.total_executions();
    if total == 0 {
        return false;
    }
    let total = total as f64;
    let ceiling = 1.0 - filter.threshold;
    conditional
        .branches
        .iter()
        .any(|b| b.num_executions as f64 / total <= ceiling)
}
