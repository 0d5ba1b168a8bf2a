use async_trait::async_trait;

use crate::types::Importance;

/// What the operator did at a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A line of free-form input (without the trailing newline).
    Input(String),
    /// Ctrl-C, or the operator's input ended.
    Interrupt,
}

/// The person (or script) answering review prompts.
#[async_trait]
pub trait Operator: Send {
    /// Show `summary` and wait for the next decision.
    async fn decide(&mut self, summary: &str) -> Decision;
}

/// The importance an input line asks for, if any.
///
/// `h` is checked after `i`, so input containing both highlights.
pub fn annotation_for(input: &str) -> Option<Importance> {
    let mut importance = None;
    if input.contains('i') {
        importance = Some(Importance::Ignore);
    }
    if input.contains('h') {
        importance = Some(Importance::Highlight);
    }
    importance
}
