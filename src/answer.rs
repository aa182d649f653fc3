//! Grounded answer synthesis with fragment streaming.
//!
//! The synthesizer builds a prompt that confines the model to the retrieved
//! chunks, then streams the reply fragment by fragment through an
//! [`AnswerStream`]. When retrieval produced nothing the synthesizer skips
//! the model entirely and streams the fixed fallback sentence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::GenerationConfig;
use crate::error::QaError;
use crate::models::ScoredChunk;

/// The exact sentence returned when the context does not contain the answer.
/// Callers compare against this verbatim; do not reword it.
pub const NOT_AVAILABLE: &str = "Answer is not available in the provided context";

/// Sampling temperature for answer generation.
pub const ANSWER_TEMPERATURE: f32 = 0.3;

/// Streams a model reply for a prompt, pushing fragments as they arrive.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate a reply to `prompt`, sending each text fragment through
    /// `tx` in arrival order. Returns once the reply is complete or the
    /// provider fails mid-stream; fragments sent before a failure stand.
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        tx: mpsc::Sender<String>,
    ) -> Result<(), QaError>;
}

/// A finite, non-restartable stream of answer fragments.
///
/// Drain fragments with [`next_fragment`](Self::next_fragment), then call
/// [`finish`](Self::finish) to learn whether the provider completed the
/// reply or failed partway through.
pub struct AnswerStream {
    rx: mpsc::Receiver<String>,
    handle: JoinHandle<Result<(), QaError>>,
}

impl AnswerStream {
    /// The next fragment, or `None` once the stream is exhausted.
    pub async fn next_fragment(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Consume the stream and report the generation outcome. Must be called
    /// after the fragments are drained.
    pub async fn finish(self) -> Result<(), QaError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(QaError::Generation(format!("generation task failed: {e}"))),
        }
    }
}

/// Builds grounded prompts and drives the generator.
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Start answering `question` from `retrieved` context. With no
    /// retrieved chunks the model is never called; the stream carries the
    /// fallback sentence and finishes successfully.
    pub fn synthesize(&self, question: &str, retrieved: &[ScoredChunk]) -> AnswerStream {
        let (tx, rx) = mpsc::channel::<String>(32);

        if retrieved.is_empty() {
            let handle = tokio::spawn(async move {
                // Receiver dropped early is not a generation failure.
                let _ = tx.send(NOT_AVAILABLE.to_string()).await;
                Ok(())
            });
            return AnswerStream { rx, handle };
        }

        let prompt = build_prompt(question, retrieved);
        let generator = Arc::clone(&self.generator);
        let handle =
            tokio::spawn(async move { generator.generate(&prompt, ANSWER_TEMPERATURE, tx).await });

        AnswerStream { rx, handle }
    }
}

/// Assemble the grounded prompt: instructions, the retrieved chunks in rank
/// order, then the question.
pub fn build_prompt(question: &str, retrieved: &[ScoredChunk]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Answer the question as detailed as possible from the provided context. \
         Make sure to provide all the details. If the answer is not in the provided \
         context, just say, \"",
    );
    prompt.push_str(NOT_AVAILABLE);
    prompt.push_str("\". Do not provide a wrong answer.\n\nContext:\n");
    for chunk in retrieved {
        prompt.push_str(&chunk.text);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Question:\n");
    prompt.push_str(question);
    prompt.push_str("\n\nAnswer:\n");
    prompt
}

/// Generation provider backed by the Gemini `streamGenerateContent` SSE API.
///
/// Requires the `GEMINI_API_KEY` environment variable.
pub struct GeminiGenerator {
    model: String,
    timeout_secs: u64,
    base_url: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;

        Ok(Self {
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        tx: mpsc::Sender<String>,
    ) -> Result<(), QaError> {
        // Bound connection setup only; a whole-request timeout would cut
        // off replies that stream longer than the limit.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| QaError::Generation(e.to_string()))?;

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
            "generationConfig": {
                "temperature": temperature,
            },
        });

        let response = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| QaError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(QaError::Generation(format!(
                "Gemini API error {}: {}",
                status, body_text
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(item) = stream.next().await {
            let bytes = item.map_err(|e| QaError::Generation(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            // SSE events arrive as "data: {json}" lines.
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    return Ok(());
                }

                let json: serde_json::Value = serde_json::from_str(data)
                    .map_err(|e| QaError::Generation(format!("malformed stream event: {e}")))?;

                for text in event_text_parts(&json) {
                    if tx.send(text).await.is_err() {
                        // Receiver gone; nobody is reading the answer.
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Pull the text parts out of one streamed candidate event.
fn event_text_parts(event: &serde_json::Value) -> Vec<String> {
    event["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
