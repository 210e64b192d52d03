use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Which source store backs this corpus.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Remote drive exposing a Graph-style children API with eTags.
    Drive(DriveSourceConfig),
    /// Local directory tree, mostly for small corpora and testing.
    Filesystem(FilesystemSourceConfig),
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveSourceConfig {
    /// Base URL of the drive API, e.g. `https://graph.example.com/v1.0/sites/<id>/drive`.
    pub base_url: String,
    /// Folder to scan, relative to the drive root.
    #[serde(default)]
    pub root_folder: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_drive_token_env")]
    pub token_env: String,
    /// Skip subtrees whose folder name contains this marker when
    /// `production` is set (staging/UAT content never reaches prod).
    #[serde(default = "default_staging_marker")]
    pub staging_marker: String,
    #[serde(default)]
    pub production: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_drive_token_env() -> String {
    "CORPUS_DRIVE_TOKEN".to_string()
}
fn default_staging_marker() -> String {
    "UAT".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemSourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.docx".to_string(),
        "**/*.xlsx".to_string(),
        "**/*.pdf".to_string(),
    ]
}

/// Destination chunk index (vector-capable store).
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Base URL of the index REST API.
    pub url: String,
    /// Collection (class) holding the chunk records.
    pub collection: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Strategy for splitting canonical text into chunks.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    Markdown,
    Recursive,
    Character,
}

/// Which path PDF files take through parsing.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PdfParserKind {
    /// Delegate to the structure-extraction service (page-marked markdown).
    Remote,
    /// Secondary path: pure-Rust local text extraction, no page structure.
    Local,
}

/// How chunk text is rewritten after splitting.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AugmentStrategy {
    None,
    Summary,
    Iterative,
    Combined,
}

/// Immutable configuration for document processing. One instance governs
/// one pipeline run.
#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    #[serde(default = "default_pdf_parser")]
    pub pdf_parser: PdfParserKind,
    #[serde(default = "default_chunking")]
    pub chunking: ChunkingStrategy,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Separators for the recursive strategy, coarse to fine.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
    /// How many markdown header levels feed the header trail (1..=3).
    #[serde(default = "default_header_levels")]
    pub header_levels: usize,
    #[serde(default = "default_augmentation")]
    pub augmentation: AugmentStrategy,
    /// Generate keywords per chunk via the completion capability.
    #[serde(default = "default_true")]
    pub keywords: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            pdf_parser: default_pdf_parser(),
            chunking: default_chunking(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
            header_levels: default_header_levels(),
            augmentation: default_augmentation(),
            keywords: default_true(),
        }
    }
}

fn default_pdf_parser() -> PdfParserKind {
    PdfParserKind::Remote
}
fn default_chunking() -> ChunkingStrategy {
    ChunkingStrategy::Recursive
}
fn default_chunk_size() -> usize {
    5000
}
fn default_chunk_overlap() -> usize {
    500
}
fn default_separators() -> Vec<String> {
    vec!["\n\n".to_string(), "\n".to_string(), " ".to_string()]
}
fn default_header_levels() -> usize {
    3
}
fn default_augmentation() -> AugmentStrategy {
    AugmentStrategy::None
}
fn default_true() -> bool {
    true
}

/// External service endpoints (completion, embedding, structure extraction).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServicesConfig {
    #[serde(default)]
    pub completion: ServiceEndpoint,
    #[serde(default)]
    pub embedding: EmbeddingEndpoint,
    #[serde(default)]
    pub ocr: ServiceEndpoint,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceEndpoint {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            url: String::new(),
            model: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingEndpoint {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingEndpoint {
    fn default() -> Self {
        Self {
            url: String::new(),
            model: None,
            dims: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "CORPUS_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum files processed concurrently.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReportConfig {
    /// SQLite database for run reports. Reporting is skipped when unset.
    pub path: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

/// Validate a parsed config. All violations abort before any file is touched.
pub fn validate(config: &Config) -> Result<()> {
    let p = &config.processing;

    if p.chunk_size == 0 {
        anyhow::bail!("processing.chunk_size must be > 0");
    }
    if p.chunk_overlap >= p.chunk_size {
        anyhow::bail!(
            "processing.chunk_overlap ({}) must be < chunk_size ({})",
            p.chunk_overlap,
            p.chunk_size
        );
    }
    if !(1..=3).contains(&p.header_levels) {
        anyhow::bail!("processing.header_levels must be between 1 and 3");
    }
    if p.separators.is_empty() {
        anyhow::bail!("processing.separators must not be empty");
    }

    if config.index.url.is_empty() {
        anyhow::bail!("index.url must be set");
    }
    if config.index.collection.is_empty() {
        anyhow::bail!("index.collection must be set");
    }

    if config.pipeline.max_concurrency == 0 {
        anyhow::bail!("pipeline.max_concurrency must be >= 1");
    }

    if let SourceConfig::Drive(drive) = &config.source {
        if drive.base_url.is_empty() {
            anyhow::bail!("source.base_url must be set for the drive source");
        }
    }

    Ok(())
}
