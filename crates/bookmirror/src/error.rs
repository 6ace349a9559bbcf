use miette::Diagnostic;
use thiserror::Error;

/// Navigation failure modes that are eligible for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Credentials,
    Certificate,
    Connection,
    Unauthorized,
}

/// Errors surfaced by a document-engine session.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("failed to open a page session: {0}")]
    Session(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Evaluate(String),
    #[error("failed to read page content: {0}")]
    Content(String),
}

/// A page navigation that exhausted its retries. `message` is always the
/// first failure's message, not a retry's.
#[derive(Debug, Error, Diagnostic)]
#[error("navigation to {url} failed: {message}")]
pub struct NavigationError {
    pub url: String,
    pub message: String,
    pub class: Option<FailureClass>,
}

/// One image fetch or decode that failed; the occurrence stays unresolved.
#[derive(Debug, Error)]
#[error("image fetch failed for {src}: {message}")]
pub struct ImageError {
    pub src: String,
    pub message: String,
}

/// A single artifact write that failed; the artifact is skipped.
#[derive(Debug, Error)]
#[error("failed to write {path}: {message}")]
pub struct PersistenceError {
    pub path: String,
    pub message: String,
}

/// Run-level errors. Only [`MirrorError::OutputDir`] aborts a run; per-page
/// variants are caught by the pipeline and counted as skips.
#[derive(Debug, Error, Diagnostic)]
pub enum MirrorError {
    #[error("failed to create output directory {path}: {message}")]
    #[diagnostic(help("the output directory must be creatable before a run starts"))]
    OutputDir { path: String, message: String },

    #[error("document engine error: {0}")]
    Engine(String),

    #[error("invalid page path {path}: {message}")]
    InvalidPath { path: String, message: String },

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("{0}")]
    Persistence(#[from] PersistenceError),
}
