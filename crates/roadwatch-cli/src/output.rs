//! Shared output layer: human text or JSON on stdout, errors on stderr.

use clap::ValueEnum;
use roadwatch_core::error::ErrorCode;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Plain text for terminals and logs.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// A structured error with an optional hint and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn from_code(code: ErrorCode, detail: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{}: {detail}", code.message()),
            hint: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// JSON mode writes one compact object per line so it can share stdout with
/// notification lines.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_to(&mut out, mode, value, text_fn)
}

fn render_to<T: Serialize>(
    out: &mut dyn Write,
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer(&mut *out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, out)?,
    }
    out.flush()?;
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    render_error_to(&mut out, mode, error)
}

fn render_error_to(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer(&mut *out, &serde_json::json!({ "error": error }))?;
            writeln!(out)?;
        }
        OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(hint) = &error.hint {
                writeln!(out, "  hint: {hint}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_render_is_one_line() {
        let mut buf = Vec::new();
        render_to(&mut buf, OutputMode::Json, &serde_json::json!({"a": 1}), |_, _| {
            Ok(())
        })
        .expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "{\"a\":1}\n");
    }

    #[test]
    fn text_error_carries_code_and_hint() {
        let err = CliError::from_code(ErrorCode::FeedUnreachable, "connection refused");
        let mut buf = Vec::new();
        render_error_to(&mut buf, OutputMode::Text, &err).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("error[E3001]: Upstream feed unreachable: connection refused"));
        assert!(text.contains("hint: "));
    }

    #[test]
    fn json_error_is_wrapped() {
        let err = CliError::from_code(ErrorCode::StoreWriteFailed, "disk full");
        let mut buf = Vec::new();
        render_error_to(&mut buf, OutputMode::Json, &err).expect("render");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["error"]["error_code"], "E4002");
        assert!(value["error"].get("hint").is_none());
    }
}
