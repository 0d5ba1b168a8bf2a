use crate::types::NodeId;

/// Top-level covnavi error type.
///
/// All fallible operations in `covnavi-core` return [`Result<T, CovnaviError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum CovnaviError {
    /// Error from the control-flow graph engine (transport, query, result shape).
    #[error("Graph query error: {0}")]
    Query(#[from] QueryError),

    /// Error from the line coverage store (`SQLite` operations, listing import).
    #[error("Coverage store error: {0}")]
    Coverage(#[from] CoverageError),

    /// Error reading or writing the conditional catalogue.
    #[error("Catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors talking to the graph engine or interpreting what it returned.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// Network-level failure reaching the graph engine.
    #[error("Network error: {0}")]
    Network(String),

    /// The graph engine returned a non-success HTTP status.
    #[error("Graph API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code from the engine.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The response could not be parsed into nodes or values.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// A node the traversal depends on does not exist.
    #[error("Missing node: {0}")]
    MissingNode(String),

    /// A location or file path string did not have the expected shape.
    #[error("Malformed location {raw:?}: {message}")]
    MalformedLocation {
        /// The string as returned by the engine.
        raw: String,
        /// What was wrong with it.
        message: String,
    },

    /// A chain of `Label` nodes ended without a successor or looped.
    #[error("Dangling label chain starting at node {0}")]
    Dangling(NodeId),
}

/// Errors from the SQLite-backed line coverage store.
#[derive(thiserror::Error, Debug)]
pub enum CoverageError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Reading the coverage listing failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A coverage listing record could not be parsed.
    #[error("Malformed record at listing line {line}: {message}")]
    MalformedRecord {
        /// 1-based line number in the listing.
        line: usize,
        /// Description of the problem.
        message: String,
    },
}

/// Errors persisting or loading the catalogue.
#[derive(thiserror::Error, Debug)]
pub enum CatalogueError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Saving at the end of a review failed; the annotations only exist in memory.
    #[error("{annotations} annotation(s) not saved: {source}")]
    Unsaved {
        /// Annotations applied during the session.
        annotations: usize,
        /// The underlying persistence failure.
        #[source]
        source: Box<CatalogueError>,
    },
}

/// Errors in covnavi configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, CovnaviError>`.
pub type Result<T> = std::result::Result<T, CovnaviError>;
