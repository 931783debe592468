// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use std::io::{self, IsTerminal, Write};

use folio_client::{RemoteError, SyncError};
use folio_common::path::PathError;
use serde::Serialize;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text (tables, colors, etc.).
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
///
/// - `Human`: calls `human_fn` to produce a human-readable string.
/// - `Json`: serializes `value` as JSON.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Human => {
            writeln!(out, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut out, value).map_err(io::Error::other)?;
            writeln!(out)
        }
    }
}

/// Write a value to a provided writer (useful for testing).
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line =
                render_human_stderr_line("error", message, io::stderr().is_terminal(), ANSI_RED);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Write a warning to stderr in the selected format.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(
                "warning",
                message,
                io::stderr().is_terminal(),
                ANSI_YELLOW,
            );
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "warning": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");

    for cause in error.chain() {
        let remote = match cause.downcast_ref::<SyncError>() {
            Some(SyncError::NotFound) => return not_found(&message),
            Some(SyncError::Remote(remote)) => Some(remote),
            Some(SyncError::Drafts(_)) => return ("DRAFT_CACHE_ERROR", message),
            None => cause.downcast_ref::<RemoteError>(),
        };
        let Some(remote) = remote else { continue };
        return match remote {
            RemoteError::Unreachable(_) => (
                "SERVER_UNREACHABLE",
                format!(
                    "Could not reach the server. Local edits are kept; retry with: folio sync ({message})"
                ),
            ),
            RemoteError::NotFound => not_found(&message),
            RemoteError::InvalidPath(reason) => {
                ("INVALID_PATH", format!("Path rejected by the server: {reason}"))
            }
            RemoteError::DestinationExists => (
                "DESTINATION_EXISTS",
                "Destination already exists. Pick another name or remove it first.".to_string(),
            ),
            RemoteError::VersionConflict { .. } | RemoteError::PatchApplyFailed { .. } => {
                ("SYNC_CONFLICT", message)
            }
            RemoteError::Server { .. } => ("SERVER_ERROR", message),
        };
    }

    if error.chain().any(|cause| cause.downcast_ref::<PathError>().is_some()) {
        return ("INVALID_PATH", message);
    }

    ("ERROR", message)
}

fn not_found(message: &str) -> (&'static str, String) {
    let doc_name = extract_document_name(message).unwrap_or_else(|| "<path>".to_string());
    ("DOCUMENT_NOT_FOUND", format!("Document {doc_name} not found. Run: folio tree"))
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

fn extract_document_name(message: &str) -> Option<String> {
    let mut parts = message.split('`');
    let _before = parts.next()?;
    let candidate = parts.next()?.trim();
    if candidate.is_empty() {
        None
    } else {
        Some(candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
    }

    #[test]
    fn detect_pipe_returns_json() {
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
    }

    #[test]
    fn detect_json_flag_overrides_tty() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn write_output_human_format() {
        #[derive(Serialize)]
        struct Saved {
            path: String,
        }
        let saved = Saved { path: "notes/a.md".into() };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Human, &saved, |s| format!("saved {}", s.path))
            .expect("write should succeed");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "saved notes/a.md\n");
    }

    #[test]
    fn write_output_json_format() {
        #[derive(Serialize)]
        struct Synced {
            path: String,
            pushed: u32,
        }
        let synced = Synced { path: "b.md".into(), pushed: 3 };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &synced, |_| {
            unreachable!("human_fn should not be called in JSON mode")
        })
        .expect("write should succeed");
        let output = String::from_utf8(buf).expect("utf8");
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value =
            serde_json::from_str(output.trim()).expect("output should be JSON");
        assert_eq!(parsed["path"], "b.md");
        assert_eq!(parsed["pushed"], 3);
    }

    #[test]
    fn print_error_json_format() {
        print_error(OutputFormat::Json, "TEST_ERR", "something broke");
    }

    #[test]
    fn print_warning_json_format() {
        print_warning(OutputFormat::Json, "WARN", "heads up");
    }

    #[test]
    fn write_output_empty_string_human() {
        #[derive(Serialize)]
        struct Empty {}
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Human, &Empty {}, |_| String::new())
            .expect("write should succeed");
        assert_eq!(buf, b"\n");
    }

    #[test]
    fn render_human_error_uses_color_for_tty() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED));
        assert!(line.contains(ANSI_RESET));
        assert!(line.contains("boom"));
    }

    #[test]
    fn render_human_warning_without_tty_is_plain() {
        let line = render_human_stderr_line("warning", "careful", false, ANSI_YELLOW);
        assert_eq!(line, "warning: careful");
    }

    #[test]
    fn actionable_error_unreachable_points_at_sync() {
        let err = anyhow::Error::new(RemoteError::Unreachable("connection refused".into()))
            .context("failed to push `notes/a.md`");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "SERVER_UNREACHABLE");
        assert!(message.contains("folio sync"));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn actionable_error_document_not_found_message() {
        let err = anyhow::Error::new(SyncError::NotFound).context("document `docs/missing.md`");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "DOCUMENT_NOT_FOUND");
        assert!(message.contains("docs/missing.md"));
        assert!(message.contains("folio tree"));
    }

    #[test]
    fn actionable_error_remote_inside_sync_error() {
        let err = anyhow::Error::new(SyncError::Remote(RemoteError::DestinationExists));
        let (code, _) = actionable_error(&err);
        assert_eq!(code, "DESTINATION_EXISTS");
    }

    #[test]
    fn actionable_error_invalid_local_path() {
        let path_err = folio_common::path::DocPath::parse("../x").expect_err("should be invalid");
        let err = anyhow::Error::new(path_err).context("invalid document path `../x`");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "INVALID_PATH");
        assert!(message.contains("../x"));
    }

    #[test]
    fn actionable_error_falls_back_to_message() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(actionable_error(&err), ("ERROR", "disk full".to_string()));
    }
}
