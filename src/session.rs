//! Session orchestration: document submission, grounded question answering,
//! and conversation history.
//!
//! A session moves between three states. `Empty` means no index exists and
//! questions are rejected. `Indexing` covers the span of a submit call.
//! `Ready` means a persisted index exists and questions are answered against
//! it. On startup the state is recovered purely from whether the index file
//! exists, so a restart lands in `Ready` with an empty transcript.

use std::sync::Arc;

use crate::answer::{AnswerSynthesizer, Generator};
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::QaError;
use crate::extract::extract_corpus;
use crate::index::{IndexStore, VectorIndex};
use crate::models::{Document, Message};
use crate::retrieve::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No index; questions fail with [`QaError::NoIndex`].
    Empty,
    /// A submit is in flight.
    Indexing,
    /// A persisted index exists and answers questions.
    Ready,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Empty => write!(f, "empty"),
            SessionState::Indexing => write!(f, "indexing"),
            SessionState::Ready => write!(f, "ready"),
        }
    }
}

/// What a successful submit produced.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub documents: usize,
    pub chunks: usize,
    /// Per-document extraction failures; the batch still succeeded.
    pub warnings: Vec<String>,
}

/// Owns the conversation, the session state, and the index lifecycle.
pub struct SessionManager {
    messages: Vec<Message>,
    state: SessionState,
    embedder: Arc<dyn Embedder>,
    synthesizer: AnswerSynthesizer,
    store: IndexStore,
    window: usize,
    overlap: usize,
    top_k: usize,
}

impl SessionManager {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: IndexStore,
        config: &Config,
    ) -> Self {
        let state = if store.exists() {
            SessionState::Ready
        } else {
            SessionState::Empty
        };
        Self {
            messages: Vec::new(),
            state,
            embedder,
            synthesizer: AnswerSynthesizer::new(generator),
            store,
            window: config.chunking.window,
            overlap: config.chunking.overlap,
            top_k: config.retrieval.top_k,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Index a batch of documents, replacing any previous index.
    ///
    /// The batch is all-or-nothing: extraction failures of individual
    /// documents become warnings, but an embedding or storage failure
    /// discards the persisted index entirely and returns the session to
    /// `Empty`. A partial or stale index is never left in place.
    pub async fn submit(&mut self, documents: &[Document]) -> Result<SubmitOutcome, QaError> {
        if documents.is_empty() {
            return Err(QaError::EmptyUpload);
        }

        self.state = SessionState::Indexing;
        match self.ingest(documents).await {
            Ok(outcome) => {
                self.state = SessionState::Ready;
                Ok(outcome)
            }
            Err(e) => {
                // One consolidated failure per submit: the ingestion error
                // is reported even when the cleanup itself fails.
                let _ = self.store.discard();
                self.state = SessionState::Empty;
                Err(e)
            }
        }
    }

    async fn ingest(&self, documents: &[Document]) -> Result<SubmitOutcome, QaError> {
        let report = extract_corpus(documents);
        let chunks = chunk_text(&report.corpus, self.window, self.overlap);
        let chunk_count = chunks.len();

        let index = VectorIndex::build(chunks, self.embedder.as_ref()).await?;
        self.store.replace(&index).await?;

        Ok(SubmitOutcome {
            documents: documents.len(),
            chunks: chunk_count,
            warnings: report.warnings,
        })
    }

    /// Answer a question against the current index, invoking `on_fragment`
    /// for each streamed piece of the reply.
    ///
    /// Both turns are recorded in the transcript. If generation fails
    /// mid-stream the fragments already delivered are kept as the assistant
    /// turn and the error is returned; a failure before the first fragment
    /// records no assistant turn at all.
    pub async fn ask<F>(&mut self, question: &str, mut on_fragment: F) -> Result<String, QaError>
    where
        F: FnMut(&str),
    {
        if self.state != SessionState::Ready {
            return Err(QaError::NoIndex);
        }

        self.messages.push(Message::user(question));

        let retriever = Retriever::new(self.embedder.as_ref(), &self.store, self.top_k);
        let retrieved = retriever.retrieve(question).await?;

        let mut stream = self.synthesizer.synthesize(question, &retrieved);
        let mut answer = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            on_fragment(&fragment);
            answer.push_str(&fragment);
        }

        let outcome = stream.finish().await;
        if !(answer.is_empty() && outcome.is_err()) {
            self.messages.push(Message::assistant(&answer));
        }
        outcome?;
        Ok(answer)
    }

    /// Drop the conversation history. The index and state are untouched.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Drop the conversation history and the index; back to square one.
    pub fn reset(&mut self) -> Result<(), QaError> {
        self.messages.clear();
        self.store.discard()?;
        self.state = SessionState::Empty;
        Ok(())
    }
}
