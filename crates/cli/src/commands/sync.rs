// `folio sync`: push every draft with unsynced edits.

use anyhow::Result;
use clap::Args;
use folio_client::{DocStatus, RemoteError};
use serde::{Deserialize, Serialize};

use crate::client::{self, Context};
use crate::output;

#[derive(Debug, Args)]
pub struct SyncArgs {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub pushed: Vec<String>,
    pub failed: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    pub path: String,
    pub error: String,
    pub offline: bool,
}

pub fn run(_args: SyncArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let outcomes = client::block_on(engine.sync_all_dirty())?;

    let mut result = SyncResult { pushed: Vec::new(), failed: Vec::new() };
    for (path, outcome) in outcomes {
        if outcome.success {
            result.pushed.push(path.to_string());
        } else {
            result.failed.push(SyncFailure {
                offline: engine.status(&path) == DocStatus::Offline,
                path: path.to_string(),
                error: outcome.error.unwrap_or_default(),
            });
        }
    }
    result.pushed.sort();
    result.failed.sort_by(|a, b| a.path.cmp(&b.path));

    output::print_output(ctx.format, &result, format_human)?;
    failure_error(&result).map_or(Ok(()), Err)
}

/// The error to exit with when any push failed. All-offline failures map to
/// an unreachable server so the exit code says "retry later".
fn failure_error(result: &SyncResult) -> Option<anyhow::Error> {
    if result.failed.is_empty() {
        return None;
    }
    if result.failed.iter().all(|f| f.offline) {
        let reason = result.failed[0].error.clone();
        return Some(RemoteError::Unreachable(reason).into());
    }
    Some(anyhow::anyhow!("{} of {} drafts failed to sync", result.failed.len(), total(result)))
}

fn total(result: &SyncResult) -> usize {
    result.pushed.len() + result.failed.len()
}

fn format_human(result: &SyncResult) -> String {
    if total(result) == 0 {
        return "nothing to sync".to_string();
    }
    let mut lines: Vec<String> = result.pushed.iter().map(|p| format!("pushed  {p}")).collect();
    for failure in &result.failed {
        lines.push(format!("failed  {}: {}", failure.path, failure.error));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_code::ExitCode;

    fn failure(path: &str, offline: bool) -> SyncFailure {
        SyncFailure { path: path.into(), error: "server unreachable: refused".into(), offline }
    }

    #[test]
    fn human_format_empty() {
        let result = SyncResult { pushed: vec![], failed: vec![] };
        assert_eq!(format_human(&result), "nothing to sync");
    }

    #[test]
    fn human_format_lists_each_draft() {
        let result = SyncResult {
            pushed: vec!["a.md".into()],
            failed: vec![failure("b.md", false)],
        };
        let output = format_human(&result);
        assert!(output.contains("pushed  a.md"));
        assert!(output.contains("failed  b.md: server unreachable"));
    }

    #[test]
    fn all_offline_failures_exit_as_offline() {
        let result = SyncResult {
            pushed: vec![],
            failed: vec![failure("a.md", true), failure("b.md", true)],
        };
        let err = failure_error(&result).expect("failures should produce an error");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Offline);
    }

    #[test]
    fn mixed_failures_exit_as_error() {
        let result = SyncResult {
            pushed: vec!["c.md".into()],
            failed: vec![failure("a.md", true), failure("b.md", false)],
        };
        let err = failure_error(&result).expect("failures should produce an error");
        assert_eq!(err.to_string(), "2 of 3 drafts failed to sync");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }

    #[test]
    fn clean_run_is_ok() {
        let result = SyncResult { pushed: vec!["a.md".into()], failed: vec![] };
        assert!(failure_error(&result).is_none());
    }
}
