//! External editor control during review.
//!
//! The editor is told to show each surfaced conditional's source location.
//! Commands are fire-and-forget: review never waits for the editor.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::debug;

use crate::config::EditorSection;

pub trait Editor: Send {
    fn open(&mut self, path: &Path, line: u32) -> std::io::Result<()>;
    fn close(&mut self, path: &Path) -> std::io::Result<()>;
}

/// Does nothing. Used with `--no-editor` or `editor.enabled = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEditor;

impl Editor for NullEditor {
    fn open(&mut self, _path: &Path, _line: u32) -> std::io::Result<()> {
        Ok(())
    }

    fn close(&mut self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs configured argv templates, substituting `{path}` and `{line}`.
#[derive(Debug)]
pub struct CommandEditor {
    open: Vec<String>,
    close: Vec<String>,
    children: Vec<Child>,
}

impl CommandEditor {
    pub fn new(open: Vec<String>, close: Vec<String>) -> Self {
        Self {
            open,
            close,
            children: Vec::new(),
        }
    }

    pub fn from_config(section: &EditorSection) -> Self {
        Self::new(section.open.clone(), section.close.clone())
    }

    fn spawn(&mut self, template: &[String], path: &Path, line: Option<u32>) -> std::io::Result<()> {
        // Reap editor processes that have already exited.
        self.children
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));

        let argv = expand(template, path, line);
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };
        debug!(program = %program, args = ?args, "Spawning editor command");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        self.children.push(child);
        Ok(())
    }
}

impl Editor for CommandEditor {
    fn open(&mut self, path: &Path, line: u32) -> std::io::Result<()> {
        let template = self.open.clone();
        self.spawn(&template, path, Some(line))
    }

    fn close(&mut self, path: &Path) -> std::io::Result<()> {
        let template = self.close.clone();
        self.spawn(&template, path, None)
    }
}

fn expand(template: &[String], path: &Path, line: Option<u32>) -> Vec<String> {
    let path = path.display().to_string();
    let line = line.map(|l| l.to_string()).unwrap_or_default();
    template
        .iter()
        .map(|arg| arg.replace("{path}", &path).replace("{line}", &line))
        .collect()
}
