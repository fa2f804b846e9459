//! Shared types, error model, and configuration for FeedPulse.
//!
//! This crate is the foundation depended on by all other FeedPulse crates.
//! It provides:
//! - [`FeedPulseError`] — the unified error type
//! - Domain types ([`Record`], [`AnalysisResult`], [`CacheSnapshot`], [`RunId`])
//! - Configuration ([`AppConfig`], [`DigestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DigestConfig, DigestDefaultsConfig, LlmConfig, ReportConfig, TrackerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_credentials,
};
pub use error::{FeedPulseError, Result};
pub use types::{
    AnalysisResult, CacheSnapshot, Comment, CustomField, DigestMetrics, Record, Report, RunId,
    TagCount, UNASSIGNED, UNSET, NONE_SENTINEL,
};
