//! dist-forge
//!
//! Builds one self-contained release per runtime identifier with an external
//! toolchain, packs every output tree into a platform-appropriate archive and
//! prunes archives left over from other versions.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Runtime identifiers, jobs, outcomes
//! - **config**: Build settings, discovery and validation
//! - **version**: Version lookup in project metadata
//! - **log_collector**: Single-writer console/disk logging pipeline
//! - **archive**: tar.gz / zip packaging on the blocking pool
//! - **cleaner**: Version-gated pruning of the dist directory
//! - **orchestrator**: Process runner, fan-out barriers and stage sequencing

// Core foundational modules
pub mod error;
pub mod models;

pub mod config;
pub mod version;

// Robust, decoupled logging system
pub mod log_collector;

pub mod archive;
pub mod cleaner;

// Stage sequencing, process runner and fan-out barriers
pub mod orchestrator;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{
    ArchiveError, CleanupError, ConfigError, JobError, PipelineError, Result, VersionError,
};

pub use models::{
    ArchiveFormat, ArchiveOutcome, ArchiveReport, BuildJob, CleanupReport, CompressionJob,
    DeletionOutcome, EntryClass, ExitReport, JobOutcome, PlatformFamily, RuntimeId, Version,
};

pub use config::BuildSettings;

pub use orchestrator::{
    plan_build_jobs, plan_compression_jobs, run_build_jobs, run_compression_jobs, run_process,
    ExitPolicy, Orchestrator, PipelineReport, PipelineStage, TaskGroup,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
