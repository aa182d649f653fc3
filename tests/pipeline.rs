//! End-to-end pipeline tests: submit documents, ask questions, and exercise
//! the session lifecycle with offline embedding and generation fakes.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use askdocs::answer::{Generator, NOT_AVAILABLE};
use askdocs::config::Config;
use askdocs::embedding::Embedder;
use askdocs::error::QaError;
use askdocs::export::render_transcript;
use askdocs::index::IndexStore;
use askdocs::models::{Document, Role, MEDIA_DOCX};
use askdocs::session::{SessionManager, SessionState};

/// Build a minimal DOCX: a zip holding word/document.xml with one `w:p`
/// per paragraph.
fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn document(name: &str, paragraphs: &[&str]) -> Document {
    Document::new(name, docx(paragraphs), MEDIA_DOCX)
}

/// Deterministic offline embedder: letter-frequency vectors over a-z.
struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letter-frequency"
    }
    fn dims(&self) -> usize {
        26
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 26];
                for c in t.chars().filter(|c| c.is_ascii_alphabetic()) {
                    v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Fails every batch; stands in for an unreachable embedding provider.
struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "unavailable"
    }
    fn dims(&self) -> usize {
        26
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, QaError> {
        Err(QaError::Embedding("provider unavailable".to_string()))
    }
}

/// Records the prompts and temperatures it receives and streams canned
/// fragments; can be told to fail after a number of fragments.
struct ScriptedGenerator {
    fragments: Vec<&'static str>,
    fail_after: Option<usize>,
    prompts: Mutex<Vec<String>>,
    temperatures: Mutex<Vec<f32>>,
}

impl ScriptedGenerator {
    fn new(fragments: Vec<&'static str>) -> Self {
        Self {
            fragments,
            fail_after: None,
            prompts: Mutex::new(Vec::new()),
            temperatures: Mutex::new(Vec::new()),
        }
    }

    fn failing_after(fragments: Vec<&'static str>, n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::new(fragments)
        }
    }

    fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    fn last_temperature(&self) -> Option<f32> {
        self.temperatures.lock().unwrap().last().copied()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        tx: mpsc::Sender<String>,
    ) -> Result<(), QaError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.temperatures.lock().unwrap().push(temperature);
        for (i, fragment) in self.fragments.iter().enumerate() {
            if self.fail_after == Some(i) {
                return Err(QaError::Generation("stream interrupted".to_string()));
            }
            let _ = tx.send(fragment.to_string()).await;
        }
        Ok(())
    }
}

fn session_with(
    dir: &std::path::Path,
    generator: Arc<ScriptedGenerator>,
) -> (SessionManager, Arc<ScriptedGenerator>) {
    let mut config = Config::default();
    // Small window so short fixtures produce several chunks.
    config.chunking.window = 40;
    config.chunking.overlap = 8;
    let session = SessionManager::new(
        Arc::new(LetterEmbedder),
        generator.clone(),
        IndexStore::new(dir),
        &config,
    );
    (session, generator)
}

#[tokio::test]
async fn test_submit_then_ask_answers_from_document_context() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut session, generator) = session_with(
        tmp.path(),
        Arc::new(ScriptedGenerator::new(vec!["The sky ", "is blue."])),
    );

    let doc = document(
        "facts.docx",
        &["The sky is blue.", "Grass is green.", "Snow is white."],
    );
    let outcome = session.submit(&[doc]).await.unwrap();
    assert_eq!(outcome.documents, 1);
    assert!(outcome.chunks >= 1);
    assert!(outcome.warnings.is_empty());
    assert_eq!(session.state(), SessionState::Ready);

    let mut streamed = String::new();
    let answer = session
        .ask("what color is the sky?", |f| streamed.push_str(f))
        .await
        .unwrap();
    assert_eq!(answer, "The sky is blue.");
    assert_eq!(streamed, answer);

    // The generator only ever sees retrieved document text plus the
    // question, wrapped in the grounding instructions, at the fixed low
    // sampling temperature.
    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("what color is the sky?"));
    assert!(prompt.contains("sky"));
    assert!(prompt.contains(NOT_AVAILABLE));
    assert_eq!(generator.last_temperature(), Some(0.3));

    // Both turns were recorded.
    let transcript = render_transcript(session.messages());
    assert!(transcript.contains("User: what color is the sky?"));
    assert!(transcript.contains("Assistant: The sky is blue."));
}

#[tokio::test]
async fn test_resubmit_replaces_previous_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut session, _) = session_with(
        tmp.path(),
        Arc::new(ScriptedGenerator::new(vec!["answer"])),
    );

    session
        .submit(&[document("old.docx", &["alpha beta gamma"])])
        .await
        .unwrap();
    session
        .submit(&[document("new.docx", &["delta epsilon zeta"])])
        .await
        .unwrap();

    let store = IndexStore::new(tmp.path());
    let index = store.load().await.unwrap().unwrap();
    assert!(index.entries().iter().all(|e| !e.chunk.text.contains("alpha")));
    assert!(index
        .entries()
        .iter()
        .any(|e| e.chunk.text.contains("delta")));
}

#[tokio::test]
async fn test_generation_failure_keeps_partial_transcript() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut session, _) = session_with(
        tmp.path(),
        Arc::new(ScriptedGenerator::failing_after(
            vec!["partial ", "text ", "lost"],
            2,
        )),
    );

    session
        .submit(&[document("doc.docx", &["some indexed content here"])])
        .await
        .unwrap();

    let err = session.ask("a question", |_| {}).await.unwrap_err();
    assert!(matches!(err, QaError::Generation(_)));

    // The fragments delivered before the failure stand as the assistant turn.
    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "partial text ");
}

#[tokio::test]
async fn test_failed_resubmit_discards_prior_index() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let (mut session, _) = session_with(
            tmp.path(),
            Arc::new(ScriptedGenerator::new(vec!["answer"])),
        );
        session
            .submit(&[document("first.docx", &["first batch content"])])
            .await
            .unwrap();
    }
    let store = IndexStore::new(tmp.path());
    assert!(store.exists());

    // Re-submit against an embedding provider that is down: the failure
    // discards the previous index too, back to square one.
    let mut session = SessionManager::new(
        Arc::new(FailingEmbedder),
        Arc::new(ScriptedGenerator::new(vec!["answer"])),
        IndexStore::new(tmp.path()),
        &Config::default(),
    );
    assert_eq!(session.state(), SessionState::Ready);

    let err = session
        .submit(&[document("second.docx", &["replacement content"])])
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::Embedding(_)));
    assert_eq!(session.state(), SessionState::Empty);
    assert!(!store.exists());

    let err = session.ask("anything?", |_| {}).await.unwrap_err();
    assert!(matches!(err, QaError::NoIndex));
}

#[tokio::test]
async fn test_failure_before_first_fragment_records_no_assistant_turn() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut session, _) = session_with(
        tmp.path(),
        Arc::new(ScriptedGenerator::failing_after(vec!["never sent"], 0)),
    );

    session
        .submit(&[document("doc.docx", &["some indexed content here"])])
        .await
        .unwrap();

    let err = session.ask("a question", |_| {}).await.unwrap_err();
    assert!(matches!(err, QaError::Generation(_)));

    // Nothing was streamed, so only the user turn is recorded.
    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_restart_recovers_ready_state_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let (mut session, _) = session_with(
            tmp.path(),
            Arc::new(ScriptedGenerator::new(vec!["first answer"])),
        );
        session
            .submit(&[document("persisted.docx", &["content survives restarts"])])
            .await
            .unwrap();
    }

    // New process: same index directory, fresh transcript.
    let (mut session, _) = session_with(
        tmp.path(),
        Arc::new(ScriptedGenerator::new(vec!["second answer"])),
    );
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.messages().is_empty());

    let answer = session.ask("is it still there?", |_| {}).await.unwrap();
    assert_eq!(answer, "second answer");
}

#[tokio::test]
async fn test_reset_then_ask_requires_new_submit() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut session, _) = session_with(
        tmp.path(),
        Arc::new(ScriptedGenerator::new(vec!["answer"])),
    );

    session
        .submit(&[document("doc.docx", &["indexed once"])])
        .await
        .unwrap();
    session.ask("q", |_| {}).await.unwrap();

    session.reset().unwrap();
    assert_eq!(session.state(), SessionState::Empty);
    assert!(session.messages().is_empty());

    let err = session.ask("q again", |_| {}).await.unwrap_err();
    assert!(matches!(err, QaError::NoIndex));
}

#[tokio::test]
async fn test_unanswerable_corpus_yields_exact_fallback() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut session, generator) = session_with(
        tmp.path(),
        Arc::new(ScriptedGenerator::new(vec!["never called"])),
    );

    // Unreadable document: the submit succeeds with a warning and an empty
    // index, and questions get the verbatim fallback without touching the
    // generator.
    let broken = Document::new("broken.docx", b"not a zip".to_vec(), MEDIA_DOCX);
    let outcome = session.submit(&[broken]).await.unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.chunks, 0);

    let answer = session.ask("anything at all?", |_| {}).await.unwrap();
    assert_eq!(answer, NOT_AVAILABLE);
    assert!(generator.last_prompt().is_none());
}
