//! SQLite run-report sink.
//!
//! Each sync run writes one row to `sync_runs` plus one `sync_failures`
//! row per failed file, so operators can query run history without
//! scraping logs. Reporting is optional; the pipeline skips it when no
//! report path is configured.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::models::RunReport;
use crate::traits::ReportSink;

pub struct SqliteReportSink {
    pool: SqlitePool,
}

impl SqliteReportSink {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        let sink = Self { pool };
        sink.migrate().await?;
        Ok(sink)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at INTEGER,
                finished_at INTEGER,
                new_files INTEGER NOT NULL,
                updated_files INTEGER NOT NULL,
                deleted_files INTEGER NOT NULL,
                failed_files INTEGER NOT NULL,
                skipped_files INTEGER NOT NULL DEFAULT 0,
                unchanged_files INTEGER NOT NULL,
                total_chunks_written INTEGER NOT NULL,
                chunks_per_file TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_failures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                stage TEXT NOT NULL,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                FOREIGN KEY (run_id) REFERENCES sync_runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ReportSink for SqliteReportSink {
    async fn write_report(&self, report: &RunReport) -> Result<()> {
        let chunks_per_file = serde_json::to_string(&report.chunks_per_file)?;

        let run_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sync_runs (
                started_at, finished_at, new_files, updated_files,
                deleted_files, failed_files, skipped_files, unchanged_files,
                total_chunks_written, chunks_per_file
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(report.started_at.map(|t| t.timestamp()))
        .bind(report.finished_at.map(|t| t.timestamp()))
        .bind(report.new_files as i64)
        .bind(report.updated_files as i64)
        .bind(report.deleted_files as i64)
        .bind(report.failed_files as i64)
        .bind(report.skipped_files as i64)
        .bind(report.unchanged_files as i64)
        .bind(report.total_chunks_written as i64)
        .bind(chunks_per_file)
        .fetch_one(&self.pool)
        .await?;

        for outcome in &report.failures {
            let failure = match &outcome.failure {
                Some(failure) => failure,
                None => continue,
            };
            sqlx::query(
                "INSERT INTO sync_failures (run_id, path, stage, kind, message) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(run_id)
            .bind(&outcome.path)
            .bind(failure.stage.to_string())
            .bind(&failure.kind)
            .bind(&failure.message)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileFailure, FileOutcome, Stage};
    use chrono::Utc;

    fn sample_report() -> RunReport {
        let mut report = RunReport {
            started_at: Some(Utc::now()),
            finished_at: Some(Utc::now()),
            new_files: 2,
            updated_files: 1,
            deleted_files: 1,
            failed_files: 1,
            unchanged_files: 5,
            total_chunks_written: 42,
            ..RunReport::default()
        };
        report.chunks_per_file.insert("a.md".to_string(), 40);
        report.chunks_per_file.insert("b.txt".to_string(), 2);
        report.failures.push(FileOutcome {
            path: "bad.pdf".to_string(),
            file_name: "bad.pdf".to_string(),
            chunks: 0,
            unprocessed_artifacts: 0,
            failure: Some(FileFailure {
                stage: Stage::Parse,
                kind: "unsupported-format".to_string(),
                message: "garbled".to_string(),
            }),
        });
        report
    }

    #[tokio::test]
    async fn writes_run_and_failure_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteReportSink::open(&dir.path().join("runs.db"))
            .await
            .unwrap();

        sink.write_report(&sample_report()).await.unwrap();
        sink.write_report(&sample_report()).await.unwrap();

        let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_runs")
            .fetch_one(&sink.pool)
            .await
            .unwrap();
        assert_eq!(runs, 2);

        let (stage, kind): (String, String) = sqlx::query_as(
            "SELECT stage, kind FROM sync_failures WHERE run_id = 1",
        )
        .fetch_one(&sink.pool)
        .await
        .unwrap();
        assert_eq!(stage, "parse");
        assert_eq!(kind, "unsupported-format");
    }
}
