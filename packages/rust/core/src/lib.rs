//! Pipeline orchestration for FeedPulse.
//!
//! Wires the source adapter, store, digest engine, and report assembler
//! into the single `run_digest` entry point the CLI calls.

pub mod pipeline;

pub use pipeline::{DigestRunResult, ProgressReporter, RunConfig, SilentProgress, run_digest};
