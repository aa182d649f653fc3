//! Core data models used throughout AskDocs.
//!
//! These types represent the documents, chunks, scored retrieval results,
//! and chat messages that flow through the ingestion and query pipelines.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// MIME type for PDF uploads.
pub const MEDIA_PDF: &str = "application/pdf";
/// MIME type for Word-processor (DOCX) uploads.
pub const MEDIA_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// An uploaded document: raw bytes plus a declared media type.
///
/// Immutable once received; consumed exactly once by the extractor and
/// then discarded.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Original file name, kept for warning and summary output.
    pub name: String,
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            bytes,
            media_type: media_type.into(),
        }
    }
}

/// A bounded, overlapping slice of the document corpus — the unit of
/// retrieval. Produced deterministically by the chunker; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Sequence index, contiguous from 0.
    pub index: usize,
    pub text: String,
    /// Byte offset of the chunk start in the corpus.
    pub start: usize,
    /// Byte offset one past the chunk end.
    pub end: usize,
}

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
        }
    }
}

/// One chat turn entry. Appended once, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids_unique() {
        let a = Document::new("a.pdf", vec![1, 2, 3], MEDIA_PDF);
        let b = Document::new("b.pdf", vec![1, 2, 3], MEDIA_PDF);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "User");
        assert_eq!(Role::Assistant.to_string(), "Assistant");
    }
}
