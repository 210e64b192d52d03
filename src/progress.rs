//! Sync progress reporting.
//!
//! Reports observable progress during `csync sync` so users see what is
//! being scanned, how many files are left, and what just finished.
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts.

use std::io::Write;

/// A single progress event for a sync run.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Listing the source and index stores (no totals yet).
    Planning,
    /// One file finished (successfully or not): n done out of total.
    Processed {
        path: String,
        chunks: usize,
        failed: bool,
        n: u64,
        total: u64,
    },
    /// Stale index entries are being removed.
    Deleting { paths: u64 },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Planning => "sync  planning...\n".to_string(),
            ProgressEvent::Processed {
                path,
                chunks,
                failed,
                n,
                total,
            } => {
                let status = if *failed { "failed" } else { "ok" };
                format!(
                    "sync  {} / {}  {}  {} ({} chunks)\n",
                    format_number(*n),
                    format_number(*total),
                    status,
                    path,
                    chunks
                )
            }
            ProgressEvent::Deleting { paths } => {
                format!("sync  deleting {} stale paths\n", format_number(*paths))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Planning => serde_json::json!({
                "event": "progress",
                "phase": "planning"
            }),
            ProgressEvent::Processed {
                path,
                chunks,
                failed,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "processing",
                "path": path,
                "chunks": chunks,
                "failed": failed,
                "n": n,
                "total": total
            }),
            ProgressEvent::Deleting { paths } => serde_json::json!({
                "event": "progress",
                "phase": "deleting",
                "paths": paths
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
