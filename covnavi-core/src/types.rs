use serde::{Deserialize, Serialize};

// ── Typed ID wrapper ───────────────────────────────────────────────

/// Identifier of a node in the control-flow graph engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ── Control-flow labels ────────────────────────────────────────────

pub const LABEL_TRUE: &str = "True";
pub const LABEL_FALSE: &str = "False";

// ── Catalogue records ──────────────────────────────────────────────

/// Operator triage state of a conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Not annotated yet.
    #[default]
    Show,
    /// Operator marked the conditional as uninteresting.
    Ignore,
    /// Operator marked the conditional for follow-up.
    Highlight,
}

impl Importance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Ignore => "ignore",
            Self::Highlight => "highlight",
        }
    }
}

/// One outgoing control-flow edge of a conditional's evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub parent_id: NodeId,
    /// Direct target of the edge, before any label skipping.
    pub id: NodeId,
    /// Path relative to the source root.
    pub filename: String,
    pub line: u32,
    pub code: String,
    /// `"True"`, `"False"`, or a case value for switches.
    pub cfg_label: String,
    pub num_executions: u64,
    pub is_covered: bool,
}

impl Branch {
    /// Attach a line execution count, keeping `is_covered` consistent with it.
    pub fn set_executions(&mut self, count: u64) {
        self.num_executions = count;
        self.is_covered = count != 0;
    }
}

/// One if/switch statement with its branches and annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditional {
    pub id: NodeId,
    /// Position assigned at build time, gap-free over built records.
    pub index: usize,
    pub code: String,
    pub filename: String,
    pub line: u32,
    /// Sorted ascending by line.
    pub branches: Vec<Branch>,
    /// Position in `branches` of the first `"True"` branch.
    pub branch_true: Option<usize>,
    /// Position in `branches` of the first `"False"` branch.
    pub branch_false: Option<usize>,
    #[serde(default)]
    pub importance: Importance,
}

impl Conditional {
    pub fn branch_true(&self) -> Option<&Branch> {
        self.branch_true.and_then(|i| self.branches.get(i))
    }

    pub fn branch_false(&self) -> Option<&Branch> {
        self.branch_false.and_then(|i| self.branches.get(i))
    }

    /// The true/false pair, or `None` for a switch.
    pub fn if_pair(&self) -> Option<(&Branch, &Branch)> {
        Some((self.branch_true()?, self.branch_false()?))
    }

    /// Sum of line executions over all branches.
    pub fn total_executions(&self) -> u64 {
        self.branches.iter().map(|b| b.num_executions).sum()
    }

    pub fn is_highlighted(&self) -> bool {
        self.importance == Importance::Highlight
    }

    /// Point `branch_true` / `branch_false` at the first branch carrying each label.
    pub fn assign_branch_roles(&mut self) {
        self.branch_true = self.branches.iter().position(|b| b.cfg_label == LABEL_TRUE);
        self.branch_false = self
            .branches
            .iter()
            .position(|b| b.cfg_label == LABEL_FALSE);
    }
}
