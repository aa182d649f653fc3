//! Turn-scoped error taxonomy.
//!
//! Every variant is recoverable from the session's point of view: no error
//! terminates the process. Ingestion failures roll the index back to empty;
//! generation failures end the current turn's stream early. Extraction
//! problems are warnings (see [`crate::extract`]), never errors.

/// A recoverable failure of one ingestion or query turn.
#[derive(Debug)]
pub enum QaError {
    /// A question was asked before any successful document submission.
    NoIndex,
    /// Submit was called with zero documents.
    EmptyUpload,
    /// The external embedding capability failed.
    Embedding(String),
    /// The external generation capability failed mid-stream.
    Generation(String),
    /// The persisted index could not be read or written.
    Storage(String),
}

impl std::fmt::Display for QaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QaError::NoIndex => {
                write!(f, "no document index found; submit documents before asking")
            }
            QaError::EmptyUpload => write!(f, "no documents provided; upload at least one"),
            QaError::Embedding(e) => write!(f, "embedding failed: {}", e),
            QaError::Generation(e) => write!(f, "generation failed: {}", e),
            QaError::Storage(e) => write!(f, "index storage failed: {}", e),
        }
    }
}

impl std::error::Error for QaError {}
