//! Shared types, error model, and configuration for newsrag.
//!
//! This crate is the foundation depended on by all other newsrag crates.
//! It provides:
//! - [`NewsRagError`]: the unified error type
//! - Domain types ([`SourceDescriptor`], [`RawItem`], [`Document`], [`Chunk`], [`ContextBundle`])
//! - The built-in source registry ([`default_sources`])
//! - Centralized timestamp parsing ([`parse_timestamp`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod sources;
pub mod timestamp;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheSection, ChunkConfig, DefaultsConfig, FetchConfig, FetchSection,
    IndexSection, RetrievalConfig, RetrievalSection, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from,
};
pub use error::{NewsRagError, Result};
pub use sources::default_sources;
pub use timestamp::{parse_timestamp, timestamp_or_epoch};
pub use types::{
    BundleStatus, Chunk, ContextBundle, DocMetadata, Document, RawItem, RetrievalCandidate,
    SourceCategory, SourceDescriptor, SourceKind, canonical_url,
};
