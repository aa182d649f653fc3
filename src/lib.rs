//! # AskDocs
//!
//! Grounded question answering over your own documents.
//!
//! AskDocs ingests a batch of uploaded documents (PDF, DOCX), chunks and
//! embeds their text, and answers natural-language questions using only
//! retrieved chunk content — a retrieval-augmented generation (RAG)
//! pipeline with a chat session on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌──────────┐   ┌────────────┐
//! │ Extractor │──▶│ Chunker │──▶│ Embedder │──▶│   SQLite   │
//! │ PDF/DOCX  │   │ windows │   │  Gemini  │   │ VectorIdx  │
//! └───────────┘   └─────────┘   └──────────┘   └────┬───────┘
//!                                                   │
//!                       question ──▶ Retriever ──▶ Synthesizer (streamed)
//!                                                   │
//!                                             SessionManager
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! askdocs submit report.pdf notes.docx   # build the index
//! askdocs ask "What is the Q3 revenue?"  # grounded, streamed answer
//! askdocs chat                           # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Turn-scoped error taxonomy |
//! | [`extract`] | PDF/DOCX text extraction |
//! | [`chunk`] | Overlapping window chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index build, persistence, and query |
//! | [`retrieve`] | Query embedding + similarity retrieval |
//! | [`answer`] | Grounded prompt construction and streamed synthesis |
//! | [`session`] | Chat session state machine |
//! | [`export`] | Plain-text transcript export |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod extract;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod session;
