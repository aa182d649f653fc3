//! Plain-text transcript export.

use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Message;

/// Render the conversation as plain text, one block per turn:
///
/// ```text
/// 2026-08-28 09:15:02 UTC User: what is chunk overlap?
///
/// 2026-08-28 09:15:04 UTC Assistant: Overlap is the number of ...
/// ```
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "{} {}: {}",
                m.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                m.role,
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write the rendered transcript to `path`, creating parent directories.
pub fn write_transcript(messages: &[Message], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, render_transcript(messages))
        .with_context(|| format!("failed to write {}", path.display()))
}
