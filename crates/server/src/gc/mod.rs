// Asset garbage collector: mark-and-sweep over the document and asset trees.
//
// Mark reads every document and collects the asset paths it cites. Enumerate
// lists every stored asset. Sweep quarantines assets nobody cites into the
// recovery area. Reap permanently removes recovery-area batches older than
// the retention window.
//
// Assets cited only by client drafts that were never pushed are invisible to
// Mark and can be quarantined; the retention window keeps them recoverable.

pub mod references;
pub mod schedule;

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use folio_common::protocol::http::CollectionReport;
use folio_common::protocol::routes::ASSET_URL_PREFIX;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::trash::Trash;
use crate::store::walk::TreeWalker;

pub use schedule::{spawn_collector, CollectorHandle};

/// How much of a file is inspected when deciding whether it is binary.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

const QUARANTINE_TAG: &str = "orphaned-assets";

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("a collector pass is already running")]
    AlreadyRunning,

    #[error("collector pass aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct AssetCollector {
    documents_root: PathBuf,
    assets_root: PathBuf,
    trash: Trash,
    retention: chrono::Duration,
}

impl AssetCollector {
    pub fn new(
        documents_root: impl Into<PathBuf>,
        assets_root: impl Into<PathBuf>,
        trash: Trash,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            documents_root: documents_root.into(),
            assets_root: assets_root.into(),
            trash,
            retention,
        }
    }

    /// Runs one full pass as of `now`. Blocking; call from a blocking thread.
    pub fn run_pass_at(&self, now: DateTime<Utc>) -> CollectionReport {
        let mut report = CollectionReport::default();

        let referenced = self.mark(&mut report);
        report.references_found = referenced.len();

        if report.documents_skipped > 0 {
            // A skipped document may hold the only citation of some asset.
            warn!(
                skipped = report.documents_skipped,
                "documents could not be scanned, skipping sweep for this pass"
            );
            report.sweep_skipped = true;
        } else {
            self.sweep(&referenced, now, &mut report);
        }

        match self.trash.reap(now, self.retention) {
            Ok(reaped) => report.trash_reaped = reaped,
            Err(e) => warn!(error = %e, "failed to read recovery area, reap skipped"),
        }

        info!(
            documents = report.documents_scanned,
            skipped = report.documents_skipped,
            references = report.references_found,
            assets = report.assets_scanned,
            quarantined = report.assets_quarantined,
            reaped = report.trash_reaped,
            "collector pass finished"
        );
        report
    }

    fn mark(&self, report: &mut CollectionReport) -> HashSet<String> {
        let mut referenced = HashSet::new();

        for entry in TreeWalker::new(&self.documents_root).files() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "document walk error");
                    report.documents_skipped += 1;
                    continue;
                }
            };

            match std::fs::read(&entry.path) {
                Ok(bytes) if is_binary(&bytes) => {
                    debug!(document = %entry.relative, "binary file in documents tree, not scanned");
                }
                Ok(bytes) => {
                    report.documents_scanned += 1;
                    let text = String::from_utf8_lossy(&bytes);
                    referenced.extend(references::extract_references(&text, ASSET_URL_PREFIX));
                }
                // Deleted mid-pass: nothing left to cite anything.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(document = %entry.relative, error = %e, "failed to read document");
                    report.documents_skipped += 1;
                }
            }
        }

        referenced
    }

    fn sweep(&self, referenced: &HashSet<String>, now: DateTime<Utc>, report: &mut CollectionReport) {
        let batch = Trash::batch_name(QUARANTINE_TAG, now);
        let walker = TreeWalker::new(&self.assets_root).exclude(self.trash.root());

        for entry in walker.files() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "asset walk error");
                    continue;
                }
            };
            report.assets_scanned += 1;
            if referenced.contains(&entry.relative) {
                continue;
            }
            if !entry.path.exists() {
                debug!(asset = %entry.relative, "asset vanished before sweep");
                continue;
            }

            match self.trash.relocate(&entry.path, &batch, &entry.relative) {
                Ok(_) => {
                    info!(asset = %entry.relative, "quarantined unreferenced asset");
                    report.assets_quarantined += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(asset = %entry.relative, error = %e, "failed to quarantine asset"),
            }
        }
    }
}

/// Any file in the documents tree may be a document, whatever its name. Only
/// content with a NUL byte near the start is treated as binary.
fn is_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0)
}
