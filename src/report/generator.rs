//! Answer rendering.
//!
//! Text output is the answer verbatim so it can be piped straight into a
//! comment; JSON output adds provider, model and timing.

use crate::cli::OutputFormat;
use crate::models::Answer;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Render the answer in the requested format.
pub fn render_answer(answer: &Answer, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(answer.answer.clone()),
        OutputFormat::Json => generate_json_answer(answer),
    }
}

/// Generate the JSON form of an answer.
pub fn generate_json_answer(answer: &Answer) -> Result<String> {
    serde_json::to_string_pretty(answer).map_err(Into::into)
}

/// Write rendered output followed by a newline.
pub fn write_answer<W: Write>(out: &mut W, rendered: &str) -> Result<()> {
    writeln!(out, "{}", rendered).context("Failed to write answer")?;
    out.flush().context("Failed to flush output")?;
    Ok(())
}

/// Save rendered output to a file.
pub fn save_answer(rendered: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(rendered.as_bytes())
        .with_context(|| format!("Failed to write answer to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use chrono::Utc;

    fn create_test_answer() -> Answer {
        Answer {
            answer: "The README describes installation.".to_string(),
            provider: Provider::Anthropic,
            model: "claude-4.5-sonnet".to_string(),
            duration_seconds: 1.5,
            answered_at: Utc::now(),
        }
    }

    #[test]
    fn test_text_is_verbatim() {
        let answer = create_test_answer();
        let rendered = render_answer(&answer, OutputFormat::Text).unwrap();
        assert_eq!(rendered, "The README describes installation.");
    }

    #[test]
    fn test_json_answer() {
        let answer = create_test_answer();
        let rendered = render_answer(&answer, OutputFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["answer"], "The README describes installation.");
        assert_eq!(value["provider"], "anthropic");
        assert_eq!(value["model"], "claude-4.5-sonnet");
        assert!(value["answered_at"].is_string());
    }

    #[test]
    fn test_write_answer_adds_newline() {
        let mut buffer = Vec::new();
        write_answer(&mut buffer, "X").unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "X\n");
    }

    #[test]
    fn test_save_answer() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("answer.md");
        save_answer("hello", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
