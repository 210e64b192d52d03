//! Pipeline driver: one full sync run.
//!
//! Fetches both metadata snapshots, computes the reconciliation plan, runs
//! the file processor over every new and updated file with a bounded worker
//! pool, applies deletions for vanished paths, and produces the run report.
//!
//! Files partition the index by path, so workers never contend on the same
//! records. Updated paths are not deleted here: the processor replaces
//! their records itself (insert new, then drop stale), and a failed file
//! keeps its old records so retrieval degrades instead of losing content.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::diff::compute_plan;
use crate::models::{FileOutcome, RunReport};
use crate::processor::FileProcessor;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::traits::{IndexStore, ReportSink, SourceStore};

pub struct Pipeline {
    source: Arc<dyn SourceStore>,
    index: Arc<dyn IndexStore>,
    processor: Arc<FileProcessor>,
    reporter: Arc<dyn ProgressReporter>,
    report_sink: Option<Arc<dyn ReportSink>>,
    max_concurrency: usize,
    /// When set, no further files are taken up; in-flight files finish.
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn SourceStore>,
        index: Arc<dyn IndexStore>,
        processor: Arc<FileProcessor>,
        reporter: Arc<dyn ProgressReporter>,
        report_sink: Option<Arc<dyn ReportSink>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            source,
            index,
            processor,
            reporter,
            report_sink,
            max_concurrency: max_concurrency.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked before each new file is taken up. Wire this to Ctrl-C.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run one sync. With `dry_run`, the plan is computed and reported but
    /// nothing is processed or deleted.
    pub async fn run(&self, dry_run: bool) -> Result<RunReport> {
        let started_at = Utc::now();
        self.reporter.report(ProgressEvent::Planning);

        let source_files = self
            .source
            .list_files()
            .await
            .context("Failed to list source files")?;
        let indexed = self
            .index
            .list_indexed()
            .await
            .context("Failed to list indexed files")?;

        let plan = compute_plan(&source_files, &indexed);
        let updated: HashSet<String> = plan.updated.iter().cloned().collect();
        let vanished: Vec<String> = plan
            .to_delete
            .iter()
            .filter(|p| !updated.contains(*p))
            .cloned()
            .collect();

        let mut report = RunReport {
            started_at: Some(started_at),
            new_files: (plan.to_process.len() - plan.updated.len()) as u64,
            updated_files: plan.updated.len() as u64,
            unchanged_files: plan.unchanged.len() as u64,
            ..RunReport::default()
        };

        if dry_run {
            report.deleted_files = vanished.len() as u64;
            report.finished_at = Some(Utc::now());
            return Ok(report);
        }

        let planned: Vec<String> = plan.to_process.iter().map(|m| m.path.clone()).collect();
        let outcomes = self.process_files(plan.to_process, &updated).await;

        // Cancellation stops intake, so some planned files never ran.
        // Move them out of the success counts instead of reporting them
        // as processed.
        let attempted: HashSet<&str> = outcomes.iter().map(|o| o.path.as_str()).collect();
        for path in &planned {
            if !attempted.contains(path.as_str()) {
                report.skipped_files += 1;
                if updated.contains(path) {
                    report.updated_files -= 1;
                } else {
                    report.new_files -= 1;
                }
            }
        }

        for outcome in &outcomes {
            if outcome.succeeded() {
                report.total_chunks_written += outcome.chunks as u64;
                report
                    .chunks_per_file
                    .insert(outcome.path.clone(), outcome.chunks as u64);
            } else {
                report.failed_files += 1;
                if updated.contains(&outcome.path) {
                    report.updated_files -= 1;
                } else {
                    report.new_files -= 1;
                }
                report.failures.push(outcome.clone());
            }
        }

        if !vanished.is_empty() {
            self.reporter.report(ProgressEvent::Deleting {
                paths: vanished.len() as u64,
            });
            for path in &vanished {
                self.index
                    .delete_by_path(path)
                    .await
                    .with_context(|| format!("Failed to delete index entries for {}", path))?;
                report.deleted_files += 1;
            }
        }

        report.finished_at = Some(Utc::now());

        if let Some(sink) = &self.report_sink {
            sink.write_report(&report)
                .await
                .context("Failed to write run report")?;
        }

        Ok(report)
    }

    async fn process_files(
        &self,
        to_process: Vec<crate::models::FileMetadata>,
        updated: &HashSet<String>,
    ) -> Vec<FileOutcome> {
        let total = to_process.len() as u64;
        let done = Arc::new(AtomicU64::new(0));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set: JoinSet<FileOutcome> = JoinSet::new();
        let mut outcomes = Vec::with_capacity(to_process.len());

        for meta in to_process {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let processor = self.processor.clone();
            let reporter = self.reporter.clone();
            let done = done.clone();
            let previously_indexed = updated.contains(&meta.path);

            join_set.spawn(async move {
                let outcome = processor.process(&meta, previously_indexed).await;
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                reporter.report(ProgressEvent::Processed {
                    path: outcome.path.clone(),
                    chunks: outcome.chunks,
                    failed: !outcome.succeeded(),
                    n,
                    total,
                });
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Ok(outcome) = joined {
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}
