//! The `plan` and `sync` commands: wire the configured stores and services
//! into a pipeline, run it, and print the summary on stdout.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::completion::ChatClient;
use crate::config::{AugmentStrategy, Config, PdfParserKind, SourceConfig};
use crate::diff::compute_plan;
use crate::embedding::EmbeddingClient;
use crate::index_http::HttpIndexStore;
use crate::models::RunReport;
use crate::ocr::RemoteExtractor;
use crate::pipeline::Pipeline;
use crate::processor::FileProcessor;
use crate::progress::ProgressMode;
use crate::report::SqliteReportSink;
use crate::source_drive::DriveSource;
use crate::source_fs::FilesystemSource;
use crate::traits::{
    CompletionService, EmbeddingService, ImageDescriber, IndexStore, ReportSink, SourceStore,
    StructureExtractor,
};

pub fn build_source(config: &Config) -> Result<Arc<dyn SourceStore>> {
    Ok(match &config.source {
        SourceConfig::Drive(drive) => Arc::new(DriveSource::new(drive)?),
        SourceConfig::Filesystem(fs) => Arc::new(FilesystemSource::new(fs)?),
    })
}

fn needs_completion(config: &Config) -> bool {
    config.processing.keywords
        || config.processing.augmentation != AugmentStrategy::None
        || !config.services.completion.url.is_empty()
}

async fn build_pipeline(config: &Config, mode: ProgressMode) -> Result<Pipeline> {
    let source = build_source(config)?;
    let index: Arc<dyn IndexStore> = Arc::new(HttpIndexStore::new(&config.index)?);
    let embedder: Arc<dyn EmbeddingService> =
        Arc::new(EmbeddingClient::new(&config.services.embedding)?);

    // The chat client doubles as the image describer.
    let chat: Option<Arc<ChatClient>> = if needs_completion(config) {
        Some(Arc::new(ChatClient::new(&config.services.completion)?))
    } else {
        None
    };
    let completion: Option<Arc<dyn CompletionService>> =
        chat.clone().map(|c| c as Arc<dyn CompletionService>);
    let describer: Option<Arc<dyn ImageDescriber>> =
        chat.map(|c| c as Arc<dyn ImageDescriber>);

    let extractor: Option<Arc<dyn StructureExtractor>> =
        if config.processing.pdf_parser == PdfParserKind::Remote
            && !config.services.ocr.url.is_empty()
        {
            Some(Arc::new(RemoteExtractor::new(&config.services.ocr)?))
        } else {
            None
        };

    let processor = Arc::new(FileProcessor::new(
        &config.processing,
        source.clone(),
        index.clone(),
        embedder,
        completion,
        extractor,
        describer,
    )?);

    let report_sink: Option<Arc<dyn ReportSink>> = match &config.report.path {
        Some(path) => Some(Arc::new(SqliteReportSink::open(path).await?)),
        None => None,
    };

    Ok(Pipeline::new(
        source,
        index,
        processor,
        Arc::from(mode.reporter()),
        report_sink,
        config.pipeline.max_concurrency,
    ))
}

/// `csync plan`: compute and print the reconciliation plan; mutate nothing.
/// Only the two stores are contacted, so the processing services need not
/// be configured.
pub async fn run_plan(config: &Config) -> Result<()> {
    let source = build_source(config)?;
    let index = HttpIndexStore::new(&config.index)?;

    let source_files = source
        .list_files()
        .await
        .context("Failed to list source files")?;
    let indexed = index
        .list_indexed()
        .await
        .context("Failed to list indexed files")?;

    let plan = compute_plan(&source_files, &indexed);
    let updated: HashSet<&str> = plan.updated.iter().map(|s| s.as_str()).collect();
    let vanished = plan
        .to_delete
        .iter()
        .filter(|p| !updated.contains(p.as_str()))
        .count();

    let report = RunReport {
        new_files: (plan.to_process.len() - plan.updated.len()) as u64,
        updated_files: plan.updated.len() as u64,
        deleted_files: vanished as u64,
        unchanged_files: plan.unchanged.len() as u64,
        ..RunReport::default()
    };

    println!("plan (dry-run)");
    print_counts(&report);
    Ok(())
}

/// `csync sync`: run the full pipeline and print the run summary.
pub async fn run_sync(config: &Config, dry_run: bool, mode: ProgressMode) -> Result<()> {
    if dry_run {
        return run_plan(config).await;
    }

    let pipeline = build_pipeline(config, mode).await?;

    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
            eprintln!("interrupted: finishing in-flight files");
        }
    });

    let report = pipeline.run(false).await?;

    println!("sync");
    print_counts(&report);
    for outcome in &report.failures {
        if let Some(failure) = &outcome.failure {
            println!(
                "  failed: {} at {} ({}): {}",
                outcome.path, failure.stage, failure.kind, failure.message
            );
        }
    }
    println!("ok");
    Ok(())
}

fn print_counts(report: &RunReport) {
    println!("  new files: {}", report.new_files);
    println!("  updated files: {}", report.updated_files);
    println!("  deleted files: {}", report.deleted_files);
    println!("  unchanged files: {}", report.unchanged_files);
    println!("  failed files: {}", report.failed_files);
    if report.skipped_files > 0 {
        println!("  skipped files (cancelled): {}", report.skipped_files);
    }
    println!("  chunks written: {}", report.total_chunks_written);
}

/// `csync sources`: show whether the configured stores look reachable.
pub fn list_sources(config: &Config) -> Result<()> {
    let source_status = match &config.source {
        SourceConfig::Drive(drive) => {
            if std::env::var(&drive.token_env).is_ok() {
                "OK"
            } else {
                "NOT CONFIGURED (token env unset)"
            }
        }
        SourceConfig::Filesystem(fs) => {
            if fs.root.exists() {
                "OK"
            } else {
                "NOT CONFIGURED (root does not exist)"
            }
        }
    };
    let source_kind = match &config.source {
        SourceConfig::Drive(_) => "drive",
        SourceConfig::Filesystem(_) => "filesystem",
    };

    println!("{:<12} {}", "STORE", "STATUS");
    println!("{:<12} {}", source_kind, source_status);
    println!(
        "{:<12} {}",
        "index",
        if config.index.url.is_empty() {
            "NOT CONFIGURED"
        } else {
            "OK"
        }
    );
    Ok(())
}
