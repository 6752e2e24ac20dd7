//! Application configuration for newsrag.
//!
//! User config lives at `~/.newsrag/newsrag.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NewsRagError, Result};
use crate::sources::default_sources;
use crate::types::SourceDescriptor;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsrag.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsrag";

/// Domain terms a chunk must mention to pass the topical relevance filter.
const DEFAULT_DOMAIN_KEYWORDS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "llm",
    "agent",
    "agents",
    "company",
    "companies",
];

// ---------------------------------------------------------------------------
// Config structs (matching newsrag.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Feed and page fetching.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Extracted-content cache.
    #[serde(default)]
    pub cache: CacheSection,

    /// Chunking and vector index persistence.
    #[serde(default)]
    pub index: IndexSection,

    /// Retrieval and ranking.
    #[serde(default)]
    pub retrieval: RetrievalSection,

    /// Source registry override. Empty means the built-in registry.
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for cache and index data.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Global item budget for one ingest run.
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_docs: default_max_docs(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.newsrag/data".into()
}
fn default_max_docs() -> usize {
    1200
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Per-request timeout in seconds. A timed-out request counts as failed.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Floor for each source's share of the global budget.
    #[serde(default = "default_min_items_per_source")]
    pub min_items_per_source: usize,

    /// Cap on extracted text length, in characters.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Structured extraction shorter than this is treated as a failure.
    #[serde(default = "default_min_article_chars")]
    pub min_article_chars: usize,

    /// Page size for paged research APIs.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum concurrent content extractions within one page.
    #[serde(default = "default_extract_concurrency")]
    pub extract_concurrency: usize,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            min_items_per_source: default_min_items_per_source(),
            max_content_chars: default_max_content_chars(),
            min_article_chars: default_min_article_chars(),
            page_size: default_page_size(),
            extract_concurrency: default_extract_concurrency(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_min_items_per_source() -> usize {
    20
}
fn default_max_content_chars() -> usize {
    2000
}
fn default_min_article_chars() -> usize {
    200
}
fn default_page_size() -> usize {
    100
}
fn default_extract_concurrency() -> usize {
    8
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSection {
    /// Cache directory (defaults to `<data_dir>/cache`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Entries older than this are refetched. Absent = never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// `[index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSection {
    /// Index directory (defaults to `<data_dir>/index`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Maximum chunk length, in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Embedding dimensionality for the built-in hashing embedder.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Index the bundled AI company/agent profiles.
    #[serde(default = "default_true")]
    pub builtin_companies: bool,

    /// Optional JSON file of extra company/agent records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companies_file: Option<String>,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            dir: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            dimensions: default_dimensions(),
            builtin_companies: true,
            companies_file: None,
        }
    }
}

fn default_chunk_size() -> usize {
    2500
}
fn default_chunk_overlap() -> usize {
    300
}
fn default_dimensions() -> usize {
    384
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Chunk budget per context bundle.
    #[serde(default = "default_k")]
    pub k: usize,

    /// Similarity search fetches `k * overfetch_factor` candidates.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    /// Round-robin selection across sources.
    #[serde(default = "default_true")]
    pub diversify_sources: bool,

    /// Topical relevance terms (matched case-insensitively as substrings).
    #[serde(default = "default_domain_keywords")]
    pub domain_keywords: Vec<String>,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            k: default_k(),
            overfetch_factor: default_overfetch_factor(),
            diversify_sources: true,
            domain_keywords: default_domain_keywords(),
        }
    }
}

fn default_k() -> usize {
    6
}
fn default_overfetch_factor() -> usize {
    6
}
fn default_true() -> bool {
    true
}
fn default_domain_keywords() -> Vec<String> {
    DEFAULT_DOMAIN_KEYWORDS.iter().map(|s| (*s).to_string()).collect()
}

impl AppConfig {
    /// Active source registry: the configured list, or the built-in one.
    pub fn sources(&self) -> Vec<SourceDescriptor> {
        if self.sources.is_empty() {
            default_sources()
        } else {
            self.sources.clone()
        }
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.defaults.data_dir)
    }

    /// Resolved content cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache.dir {
            Some(dir) => expand_home(dir),
            None => self.data_dir().join("cache"),
        }
    }

    /// Resolved vector index directory.
    pub fn index_dir(&self) -> PathBuf {
        match &self.index.dir {
            Some(dir) => expand_home(dir),
            None => self.data_dir().join("index"),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub min_items_per_source: usize,
    pub max_content_chars: usize,
    pub min_article_chars: usize,
    pub page_size: usize,
    pub extract_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&FetchSection::default())
    }
}

impl From<&FetchSection> for FetchConfig {
    fn from(section: &FetchSection) -> Self {
        Self {
            timeout_secs: section.timeout_secs,
            min_items_per_source: section.min_items_per_source,
            max_content_chars: section.max_content_chars,
            min_article_chars: section.min_article_chars,
            page_size: section.page_size.max(1),
            extract_concurrency: section.extract_concurrency.max(1),
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.fetch)
    }
}

/// Runtime chunking configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl From<&AppConfig> for ChunkConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.index.chunk_size,
            chunk_overlap: config.index.chunk_overlap,
        }
    }
}

/// Runtime retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub k: usize,
    pub overfetch_factor: usize,
    pub diversify_sources: bool,
    pub domain_keywords: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::from(&RetrievalSection::default())
    }
}

impl From<&RetrievalSection> for RetrievalConfig {
    fn from(section: &RetrievalSection) -> Self {
        Self {
            k: section.k,
            overfetch_factor: section.overfetch_factor.max(1),
            diversify_sources: section.diversify_sources,
            domain_keywords: section
                .domain_keywords
                .iter()
                .map(|kw| kw.to_lowercase())
                .collect(),
        }
    }
}

impl From<&AppConfig> for RetrievalConfig {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.retrieval)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsrag/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| NewsRagError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsrag/newsrag.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsRagError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| NewsRagError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsRagError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsRagError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsRagError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
