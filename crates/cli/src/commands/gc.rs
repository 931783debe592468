// `folio gc`: ask the server for one collector pass and print its report.

use anyhow::Result;
use clap::Args;
use folio_common::protocol::http::CollectionReport;

use crate::client::{self, Context};
use crate::output;

#[derive(Debug, Args)]
pub struct GcArgs {}

pub fn run(_args: GcArgs, ctx: &Context) -> Result<()> {
    let remote = ctx.remote()?;
    let report = client::block_on(remote.run_collector())??;
    output::print_output(ctx.format, &report, format_human)?;
    Ok(())
}

fn format_human(report: &CollectionReport) -> String {
    let mut lines = vec![
        format!(
            "scanned {} documents ({} skipped), {} references",
            report.documents_scanned, report.documents_skipped, report.references_found
        ),
    ];
    if report.sweep_skipped {
        lines.push("sweep skipped: some documents could not be read".to_string());
    } else {
        lines.push(format!(
            "quarantined {} of {} assets",
            report.assets_quarantined, report.assets_scanned
        ));
    }
    lines.push(format!("reaped {} expired trash entries", report.trash_reaped));
    lines.join("\n")
}
