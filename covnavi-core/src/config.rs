use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "covnavi.toml";

/// Top-level covnavi configuration, matching `covnavi.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CovnaviConfig {
    #[serde(default)]
    pub graph: GraphSection,
    #[serde(default)]
    pub coverage: CoverageSection,
    #[serde(default)]
    pub review: ReviewSection,
    #[serde(default)]
    pub editor: EditorSection,
}

impl CovnaviConfig {
    /// Load and validate a config file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Load `path` if given, else `covnavi.toml` from `dir` if present, else defaults.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = dir.join(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.review.threshold)?;
        if self.graph.conditional_types.is_empty() {
            return Err(ConfigError::Invalid(
                "graph.conditional_types must name at least one node type".into(),
            ));
        }
        if self.coverage.key_delimiter.is_empty() {
            return Err(ConfigError::Invalid(
                "coverage.key_delimiter must not be empty".into(),
            ));
        }
        if self.editor.enabled && (self.editor.open.is_empty() || self.editor.close.is_empty()) {
            return Err(ConfigError::Invalid(
                "editor.open and editor.close must be non-empty when the editor is enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Reject thresholds outside `[0, 1]` (including NaN).
pub fn validate_threshold(threshold: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "threshold must be between 0.0 and 1.0, got {threshold}"
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSection {
    pub endpoint: String,
    /// Graph file paths start with this prefix; its length is stripped.
    pub source_prefix: String,
    pub conditional_types: Vec<String>,
    /// Gremlin step definitions prepended to every script.
    pub step_library: Option<PathBuf>,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:7474/db/data/".to_string(),
            source_prefix: "/a".to_string(),
            conditional_types: vec!["IfStatement".into(), "SwitchStatement".into()],
            step_library: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageSection {
    pub key_delimiter: String,
    pub key_suffix: String,
}

impl Default for CoverageSection {
    fn default() -> Self {
        Self {
            key_delimiter: "#".to_string(),
            key_suffix: ".gcov".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSection {
    pub threshold: f64,
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

/// External editor commands. `{path}` and `{line}` are substituted per argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSection {
    pub enabled: bool,
    pub open: Vec<String>,
    pub close: Vec<String>,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            open: vec![
                "subl".into(),
                "-b".into(),
                "--command".into(),
                "open_file".into(),
                "{path}:{line}".into(),
            ],
            close: vec![
                "subl".into(),
                "-b".into(),
                "--command".into(),
                "close_file".into(),
                "{path}".into(),
            ],
        }
    }
}
