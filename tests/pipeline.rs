//! End-to-end pipeline tests over a temporary directory source and an
//! in-memory index, with the external capabilities faked.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use corpus_sync::config::{ChunkingStrategy, FilesystemSourceConfig, ProcessingConfig};
use corpus_sync::index_memory::MemoryIndexStore;
use corpus_sync::pipeline::Pipeline;
use corpus_sync::processor::FileProcessor;
use corpus_sync::progress::NoProgress;
use corpus_sync::source_fs::FilesystemSource;
use corpus_sync::traits::{CompletionService, EmbeddingService, SourceStore};

struct FakeEmbedder;

#[async_trait]
impl EmbeddingService for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 0.5])
    }
}

struct FakeCompletion;

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Ok("a short generated description".to_string())
    }
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn source_for(root: &Path) -> Arc<FilesystemSource> {
    let config = FilesystemSourceConfig {
        root: root.to_path_buf(),
        include_globs: vec![
            "**/*.md".to_string(),
            "**/*.txt".to_string(),
            "**/*.xlsx".to_string(),
        ],
        exclude_globs: vec![],
        follow_symlinks: false,
    };
    Arc::new(FilesystemSource::new(&config).unwrap())
}

fn pipeline_for(root: &Path, index: Arc<MemoryIndexStore>) -> Pipeline {
    let config = ProcessingConfig {
        chunking: ChunkingStrategy::Markdown,
        chunk_size: 500,
        chunk_overlap: 50,
        keywords: false,
        ..ProcessingConfig::default()
    };
    let source = source_for(root);
    let processor = Arc::new(
        FileProcessor::new(
            &config,
            source.clone() as Arc<dyn SourceStore>,
            index.clone(),
            Arc::new(FakeEmbedder),
            Some(Arc::new(FakeCompletion)),
            None,
            None,
        )
        .unwrap(),
    );
    Pipeline::new(source, index, processor, Arc::new(NoProgress), None, 2)
}

#[tokio::test]
async fn initial_sync_indexes_every_file() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.md", b"# One\nalpha body\n\n# Two\nbeta body\n");
    write_file(dir.path(), "notes/b.txt", b"plain text note");

    let index = Arc::new(MemoryIndexStore::new());
    let report = pipeline_for(dir.path(), index.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.new_files, 2);
    assert_eq!(report.updated_files, 0);
    assert_eq!(report.failed_files, 0);
    assert_eq!(report.deleted_files, 0);
    assert!(report.total_chunks_written >= 3);

    let records = index.records();
    let paths: HashSet<&str> = records.iter().map(|r| r.source_path.as_str()).collect();
    assert_eq!(paths, HashSet::from(["a.md", "notes/b.txt"]));

    // chunk_index is contiguous per path
    let mut a_indexes: Vec<i64> = records
        .iter()
        .filter(|r| r.source_path == "a.md")
        .map(|r| r.chunk_index)
        .collect();
    a_indexes.sort_unstable();
    assert_eq!(a_indexes, (0..a_indexes.len() as i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn unchanged_files_are_skipped_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.md", b"# H\nstable content\n");

    let index = Arc::new(MemoryIndexStore::new());
    pipeline_for(dir.path(), index.clone()).run(false).await.unwrap();
    let before = index.records();

    let report = pipeline_for(dir.path(), index.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.unchanged_files, 1);
    assert_eq!(report.new_files, 0);
    assert_eq!(report.total_chunks_written, 0);

    let after = index.records();
    assert_eq!(before.len(), after.len());
    let before_ids: HashSet<String> = before.into_iter().map(|r| r.id).collect();
    let after_ids: HashSet<String> = after.into_iter().map(|r| r.id).collect();
    assert_eq!(before_ids, after_ids);
}

#[tokio::test]
async fn updated_file_replaces_its_records() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.md", b"# H\noriginal\n");

    let index = Arc::new(MemoryIndexStore::new());
    pipeline_for(dir.path(), index.clone()).run(false).await.unwrap();
    let old_token = index.records()[0].change_token.clone();

    write_file(dir.path(), "a.md", b"# H\nrewritten content, longer now\n");
    let report = pipeline_for(dir.path(), index.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.updated_files, 1);
    assert_eq!(report.new_files, 0);

    let records = index.records_for("a.md");
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.change_token != old_token));
    assert!(records.iter().any(|r| r.chunk_text.contains("rewritten")));
}

#[tokio::test]
async fn vanished_file_is_deleted_from_the_index() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "keep.md", b"# K\nkeep me\n");
    write_file(dir.path(), "drop.md", b"# D\ndrop me\n");

    let index = Arc::new(MemoryIndexStore::new());
    pipeline_for(dir.path(), index.clone()).run(false).await.unwrap();

    std::fs::remove_file(dir.path().join("drop.md")).unwrap();
    let report = pipeline_for(dir.path(), index.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.deleted_files, 1);
    assert!(index.records_for("drop.md").is_empty());
    assert!(!index.records_for("keep.md").is_empty());
}

#[tokio::test]
async fn failed_file_keeps_old_records_and_spares_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "good.md", b"# G\nfine\n");
    write_file(dir.path(), "flaky.md", b"# F\nfirst version\n");

    let index = Arc::new(MemoryIndexStore::new());
    pipeline_for(dir.path(), index.clone()).run(false).await.unwrap();
    let old = index.records_for("flaky.md");
    assert!(!old.is_empty());

    // Second version is not valid UTF-8, so parsing fails.
    write_file(dir.path(), "flaky.md", &[0xff, 0xfe, 0x00, 0x01]);
    let report = pipeline_for(dir.path(), index.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.failed_files, 1);
    assert_eq!(report.failures.len(), 1);
    let failure = report.failures[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, "unsupported-format");

    // Old records survive a failed update.
    let still_there = index.records_for("flaky.md");
    assert_eq!(still_there.len(), old.len());
    assert_eq!(still_there[0].change_token, old[0].change_token);
    assert!(!index.records_for("good.md").is_empty());
}

#[tokio::test]
async fn spreadsheets_get_summary_and_combined_records() {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut w = zip::ZipWriter::new(&mut cursor);
        w.start_file("xl/workbook.xml", SimpleFileOptions::default())
            .unwrap();
        w.write_all(br#"<workbook><sheets><sheet name="Budget"/></sheets></workbook>"#)
            .unwrap();
        w.start_file("xl/worksheets/sheet1.xml", SimpleFileOptions::default())
            .unwrap();
        w.write_all(
            br#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>Line</t></is></c>
                        <c r="B1" t="inlineStr"><is><t>Cost</t></is></c></row>
            <row r="2"><c r="A2" t="inlineStr"><is><t>Hosting</t></is></c>
                        <c r="B2"><v>120</v></c></row>
            </sheetData></worksheet>"#,
        )
        .unwrap();
        w.finish().unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "budget.xlsx", &cursor.into_inner());

    let index = Arc::new(MemoryIndexStore::new());
    let report = pipeline_for(dir.path(), index.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.new_files, 1);
    let records = index.records_for("budget.xlsx");
    assert_eq!(records.len(), 2);

    let with_summary: Vec<_> = records.iter().filter(|r| r.table_summary.is_some()).collect();
    assert_eq!(with_summary.len(), 1);
    assert!(with_summary[0].chunk_text.contains("| Line | Cost |"));
    assert!(records.iter().all(|r| r.file_name == "budget.xlsx"));
}

#[tokio::test]
async fn cancelled_run_counts_unattempted_files_as_skipped() {
    use std::sync::atomic::Ordering;

    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.md", b"# A\nalpha\n");
    write_file(dir.path(), "b.md", b"# B\nbeta\n");
    write_file(dir.path(), "c.md", b"# C\ngamma\n");

    let index = Arc::new(MemoryIndexStore::new());
    let pipeline = pipeline_for(dir.path(), index.clone());
    pipeline.cancel_flag().store(true, Ordering::SeqCst);

    let report = pipeline.run(false).await.unwrap();

    // Nothing ran, so nothing may be reported as new.
    assert_eq!(report.skipped_files, 3);
    assert_eq!(report.new_files, 0);
    assert_eq!(report.updated_files, 0);
    assert_eq!(report.failed_files, 0);
    assert_eq!(report.total_chunks_written, 0);
    assert!(index.records().is_empty());
}

#[tokio::test]
async fn dry_run_reports_the_plan_without_mutating() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.md", b"# H\ncontent\n");

    let index = Arc::new(MemoryIndexStore::new());
    let report = pipeline_for(dir.path(), index.clone())
        .run(true)
        .await
        .unwrap();

    assert_eq!(report.new_files, 1);
    assert_eq!(report.total_chunks_written, 0);
    assert!(index.records().is_empty());
}
