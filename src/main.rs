use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use askdocs::answer::GeminiGenerator;
use askdocs::config::{load_config, Config};
use askdocs::embedding::GeminiEmbedder;
use askdocs::export::write_transcript;
use askdocs::extract::media_type_for_path;
use askdocs::index::IndexStore;
use askdocs::models::Document;
use askdocs::session::{SessionManager, SessionState, SubmitOutcome};

#[derive(Parser)]
#[command(
    name = "askdocs",
    about = "Ask questions about your documents, answered only from their content",
    version
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config/askdocs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a batch of documents, replacing any previous index
    Submit {
        /// PDF or DOCX files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask a one-shot question against the current index
    Ask {
        /// The question to answer from the indexed documents
        question: String,
    },
    /// Interactive question-answering session
    Chat,
    /// Show the index state and metadata
    Status,
    /// Write a chat transcript to a file (chat-session command)
    Export {
        /// Destination path
        #[arg(default_value = "askdocs-transcript.txt")]
        path: PathBuf,
    },
    /// Discard the persisted index
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Missing config file falls back to the built-in defaults; load_config
    // validates anything it reads.
    let config = if cli.config.is_file() {
        load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Submit { files } => cmd_submit(&config, &files).await,
        Commands::Ask { question } => cmd_ask(&config, &question).await,
        Commands::Chat => cmd_chat(&config).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Export { path } => {
            println!(
                "Conversation history lives in a `chat` session; use /export {} there.",
                path.display()
            );
            Ok(())
        }
        Commands::Reset => cmd_reset(&config),
    }
}

fn build_session(config: &Config) -> Result<SessionManager> {
    let embedder = GeminiEmbedder::new(&config.embedding)?;
    let generator = GeminiGenerator::new(&config.generation)?;
    let store = IndexStore::new(&config.index.dir);
    Ok(SessionManager::new(
        Arc::new(embedder),
        Arc::new(generator),
        store,
        config,
    ))
}

fn load_documents(files: &[PathBuf]) -> Result<Vec<Document>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            Ok(Document::new(&name, bytes, media_type_for_path(path)))
        })
        .collect()
}

fn report_submit(outcome: &SubmitOutcome) {
    println!(
        "Indexed {} document(s) into {} chunk(s).",
        outcome.documents, outcome.chunks
    );
    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
}

async fn cmd_submit(config: &Config, files: &[PathBuf]) -> Result<()> {
    let mut session = build_session(config)?;
    let documents = load_documents(files)?;
    let outcome = session.submit(&documents).await?;
    report_submit(&outcome);
    Ok(())
}

async fn cmd_ask(config: &Config, question: &str) -> Result<()> {
    let mut session = build_session(config)?;
    stream_answer(&mut session, question).await?;
    Ok(())
}

/// Print the streamed answer as it arrives, then a trailing newline.
async fn stream_answer(session: &mut SessionManager, question: &str) -> Result<()> {
    let result = session
        .ask(question, |fragment| {
            print!("{}", fragment);
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();
    result?;
    Ok(())
}

async fn cmd_chat(config: &Config) -> Result<()> {
    let mut session = build_session(config)?;

    println!("askdocs chat — state: {}", session.state());
    println!("Type a question, or /submit <files...>, /clear, /reset, /export <path>, /quit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('/') {
            let mut parts = rest.split_whitespace();
            match parts.next() {
                Some("quit") | Some("q") => break,
                Some("clear") => {
                    session.clear();
                    println!("Conversation cleared.");
                }
                Some("reset") => match session.reset() {
                    Ok(()) => println!("Index and conversation discarded."),
                    Err(e) => eprintln!("error: {}", e),
                },
                Some("export") => {
                    let path = parts
                        .next()
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("askdocs-transcript.txt"));
                    match write_transcript(session.messages(), &path) {
                        Ok(()) => println!("Transcript written to {}.", path.display()),
                        Err(e) => eprintln!("error: {}", e),
                    }
                }
                Some("submit") => {
                    let files: Vec<PathBuf> = parts.map(PathBuf::from).collect();
                    // An unreadable path must not end the chat session.
                    match load_documents(&files) {
                        Ok(documents) => match session.submit(&documents).await {
                            Ok(outcome) => report_submit(&outcome),
                            Err(e) => eprintln!("error: {}", e),
                        },
                        Err(e) => eprintln!("error: {}", e),
                    }
                }
                _ => println!("Unknown command: /{rest}"),
            }
            continue;
        }

        if let Err(e) = stream_answer(&mut session, line).await {
            eprintln!("error: {}", e);
        }
    }

    Ok(())
}

async fn cmd_status(config: &Config) -> Result<()> {
    let store = IndexStore::new(&config.index.dir);
    if !store.exists() {
        println!("state: {}", SessionState::Empty);
        println!("No index at {}. Run `askdocs submit` first.", store.path().display());
        return Ok(());
    }

    let index = store
        .load()
        .await?
        .context("index file disappeared while reading")?;

    println!("state: {}", SessionState::Ready);
    println!("path: {}", store.path().display());
    println!("chunks: {}", index.len());
    println!("model: {} ({} dims)", index.model, index.dims);
    println!("corpus sha256: {}", index.corpus_hash);
    if let Some(built) = chrono::DateTime::from_timestamp(index.built_at, 0) {
        println!("built: {}", built.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

fn cmd_reset(config: &Config) -> Result<()> {
    let store = IndexStore::new(&config.index.dir);
    if store.exists() {
        store.discard()?;
        println!("Index discarded.");
    } else {
        println!("No index to discard.");
    }
    Ok(())
}
