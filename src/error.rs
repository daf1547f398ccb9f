//! Rich diagnostic error types for artdoc.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so the caller can tell which kind of
//! failure occurred and what to do about it.

use miette::Diagnostic;
use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::paths::PathError;

/// Top-level error type for artdoc.
#[derive(Debug, Error, Diagnostic)]
pub enum ArtdocError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    KnowledgeBase(#[from] KnowledgeBaseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a diagnostic session.
///
/// Precondition failures (`EmptySelection`, `NoTargetSelected`,
/// `ConclusionsUnavailable`, `CallInProgress`) are raised before any call
/// reaches the engine. `EngineUnavailable` and `EngineError` come from the
/// bridge and are never folded into an empty result.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("inference engine unavailable: {message}")]
    #[diagnostic(
        code(artdoc::session::engine_unavailable),
        help("The bridge could not be reached. Check that artdocd is running or the knowledge base path is correct, then retry.")
    )]
    EngineUnavailable { message: String },

    #[error("inference engine returned an unexpected response: {message}")]
    #[diagnostic(
        code(artdoc::session::engine_error),
        help("The engine violated its response contract. Check that client and engine versions match.")
    )]
    EngineError { message: String },

    #[error("no symptoms selected")]
    #[diagnostic(
        code(artdoc::session::empty_selection),
        help("Select at least one symptom before running an analysis.")
    )]
    EmptySelection,

    #[error("no target conclusion selected")]
    #[diagnostic(
        code(artdoc::session::no_target),
        help("Choose the conclusion to verify.")
    )]
    NoTargetSelected,

    #[error("unknown symptom \"{id}\"")]
    #[diagnostic(
        code(artdoc::session::unknown_symptom),
        help("Only symptoms from the loaded catalog can be selected. List them with `artdoc symptoms`.")
    )]
    UnknownSymptom { id: String },

    #[error("an analysis is already in progress")]
    #[diagnostic(
        code(artdoc::session::call_in_progress),
        help("Wait for the pending diagnosis or verification to finish before starting another.")
    )]
    CallInProgress,

    #[error("conclusion catalog is unavailable: {message}")]
    #[diagnostic(
        code(artdoc::session::conclusions_unavailable),
        help("The conclusion list failed to load at session start; restart the session once the engine is reachable.")
    )]
    ConclusionsUnavailable { message: String },
}

impl SessionError {
    /// True for failures caught locally, before any call to the engine.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SessionError::EmptySelection
                | SessionError::NoTargetSelected
                | SessionError::UnknownSymptom { .. }
                | SessionError::CallInProgress
                | SessionError::ConclusionsUnavailable { .. }
        )
    }
}

impl From<ClientError> for SessionError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Unavailable { message } => SessionError::EngineUnavailable { message },
            ClientError::Malformed { message } => {
                tracing::error!(%message, "engine response violated the bridge contract");
                SessionError::EngineError { message }
            }
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

// ---------------------------------------------------------------------------
// Knowledge base errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KnowledgeBaseError {
    #[error("failed to read knowledge base: {path}")]
    #[diagnostic(
        code(artdoc::kb::io),
        help("Check that the CSV file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed knowledge base row {row}: {message}")]
    #[diagnostic(
        code(artdoc::kb::parse),
        help(
            "Rows need the columns rule_id, conditions, conclusion, precautions. \
             Separate multiple conditions with ';'."
        )
    )]
    Parse { row: usize, message: String },

    #[error("knowledge base is missing column \"{column}\"")]
    #[diagnostic(
        code(artdoc::kb::missing_column),
        help("The header row must contain rule_id, conditions, conclusion and precautions.")
    )]
    MissingColumn { column: String },

    #[error("knowledge base contains no rules")]
    #[diagnostic(
        code(artdoc::kb::empty),
        help("Add at least one rule row below the header.")
    )]
    Empty,
}

pub type KnowledgeBaseResult<T> = std::result::Result<T, KnowledgeBaseError>;

/// Result type for artdoc operations.
pub type ArtdocResult<T> = std::result::Result<T, ArtdocError>;
