// Text summaries of conditionals for the review loop.

use std::fmt::Write as _;

use colored::Colorize;

use crate::types::{Branch, Conditional};

const CONDITIONAL_CODE_WIDTH: usize = 80;
const BRANCH_CODE_WIDTH: usize = 50;

fn truncate(code: &str, width: usize) -> String {
    code.chars().take(width).collect()
}

pub fn render_branch(branch: &Branch) -> String {
    let covered = branch.is_covered.to_string();
    let covered = if branch.is_covered {
        covered.cyan()
    } else {
        covered.red()
    };
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\t\t\tcode:\t{}",
        truncate(&branch.code, BRANCH_CODE_WIDTH).blue()
    );
    let _ = writeln!(out, "\t\t\tnode id:\t{}", branch.id);
    let _ = writeln!(out, "\t\t\tlocation: ./{} +{}", branch.filename, branch.line);
    let _ = writeln!(
        out,
        "\t\t\tIs covered: {covered} ({})",
        branch.num_executions
    );
    out
}

/// Summary of a conditional: the true/false pair for ifs, every branch otherwise.
pub fn render_conditional(conditional: &Conditional) -> String {
    let header = format!("Conditional({}):", conditional.index);
    let mut out = String::new();
    if conditional.is_highlighted() {
        let _ = writeln!(out, "{}", header.red().on_green());
    } else {
        let _ = writeln!(out, "{header}");
    }
    let _ = writeln!(
        out,
        "\tcode:\t{}",
        truncate(&conditional.code, CONDITIONAL_CODE_WIDTH).blue()
    );
    let _ = writeln!(out, "\tnode id:\t {}", conditional.id);
    let _ = writeln!(
        out,
        "\tlocation:\t ./{} +{}",
        conditional.filename, conditional.line
    );
    let _ = writeln!(out, "\tbranches:\t{}", conditional.branches.len());

    if let Some((yes, no)) = conditional.if_pair() {
        out.push_str("\t\tTrue branch:\n");
        out.push_str(&render_branch(yes));
        out.push_str("\t\tFalse branch:\n");
        out.push_str(&render_branch(no));
    } else {
        for branch in &conditional.branches {
            let _ = writeln!(out, "\t\tBranch {}:", branch.cfg_label);
            out.push_str(&render_branch(branch));
        }
    }
    out
}
