//! Reconciliation of the blob store against the metadata rows.
//!
//! A crash between writing a blob and committing its row, or a blob delete
//! that failed after its row was removed, leaves an unreferenced blob. The
//! sweeper finds those and removes them once they are older than a grace
//! period, so uploads still in flight are never touched. Rows whose blob is
//! missing are reported but left alone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use shelf_core::Result;
use shelf_storage::BlobStore;
use tokio_util::sync::CancellationToken;

use super::PhotoRepository;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Blobs inspected.
    pub scanned: usize,
    /// Unreferenced blobs older than the grace period.
    pub orphaned: usize,
    pub deleted: usize,
    /// Unreferenced blobs still inside the grace period.
    pub recent: usize,
    /// Orphans whose delete failed.
    pub failed: usize,
    /// Rows pointing at a blob that does not exist.
    pub dangling_rows: usize,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct Sweeper {
    photos: Arc<dyn PhotoRepository>,
    blobs: Arc<dyn BlobStore>,
    grace: Duration,
}

impl Sweeper {
    pub fn new(photos: Arc<dyn PhotoRepository>, blobs: Arc<dyn BlobStore>, grace: Duration) -> Self {
        Self {
            photos,
            blobs,
            grace,
        }
    }

    /// Run one pass. With `dry_run` nothing is deleted.
    pub async fn sweep(&self, dry_run: bool) -> Result<SweepReport> {
        // Rows are read before blobs: a blob committed after this point is
        // younger than the grace period and therefore skipped.
        let referenced: HashSet<String> = self
            .photos
            .locators()
            .await?
            .iter()
            .map(|l| l.file_name().to_string())
            .collect();
        let blobs = self.blobs.list().await?;
        let now = SystemTime::now();

        let mut report = SweepReport {
            dry_run,
            ..SweepReport::default()
        };
        let mut present = HashSet::with_capacity(blobs.len());

        for entry in blobs {
            report.scanned += 1;
            let name = entry.locator.file_name().to_string();
            if referenced.contains(&name) {
                present.insert(name);
                continue;
            }

            // A timestamp ahead of the clock counts as brand new.
            let age = entry.modified.map(|m| now.duration_since(m).unwrap_or_default());
            if age.map_or(true, |age| age < self.grace) {
                report.recent += 1;
                continue;
            }

            report.orphaned += 1;
            if dry_run {
                tracing::info!(locator = %entry.locator, "Would delete orphaned blob");
                continue;
            }
            match self.blobs.delete(&entry.locator).await {
                Ok(()) => {
                    report.deleted += 1;
                    tracing::info!(locator = %entry.locator, "Deleted orphaned blob");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(locator = %entry.locator, error = %e, "Failed to delete orphaned blob");
                }
            }
        }

        for name in referenced.difference(&present) {
            report.dangling_rows += 1;
            tracing::warn!(blob = %name, "Photo row references a missing blob");
        }

        tracing::info!(
            backend = self.blobs.backend_name(),
            scanned = report.scanned,
            orphaned = report.orphaned,
            deleted = report.deleted,
            dangling_rows = report.dangling_rows,
            dry_run,
            "Blob sweep finished"
        );
        Ok(report)
    }

    /// Sweep every `interval` until `cancel` fires.
    pub async fn run_periodic(self, interval: Duration, cancel: CancellationToken) {
        tracing::info!(interval_secs = interval.as_secs(), "Blob sweeper started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }

            if let Err(e) = self.sweep(false).await {
                tracing::error!("Blob sweep failed: {e}");
            }
        }

        tracing::info!("Blob sweeper stopped");
    }
}
