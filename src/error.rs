//! Unified error type hierarchy for dist-forge
//!
//! Provides structured error handling with VersionError, JobError, ArchiveError,
//! CleanupError, ConfigError, and the top-level PipelineError.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Version metadata lookup errors.
#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Metadata file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Key '{key}' not found in {path}")]
    KeyMissing { key: String, path: PathBuf },

    #[error("Version value for '{0}' is empty")]
    Empty(String),

    #[error("Invalid TOML in metadata file: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Invalid JSON in metadata file: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error reading metadata: {0}")]
    Io(#[from] io::Error),
}

/// Failure of a single build job.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to capture {0} of build process")]
    PipeUnavailable(&'static str),

    #[error("IO error while running build: {0}")]
    Io(#[from] io::Error),

    #[error("Build exited with code {0}")]
    NonZeroExit(i32),

    #[error("Build terminated by signal")]
    Signalled,

    #[error("Build task aborted: {0}")]
    Panicked(String),
}

/// Failure of a single archiving unit.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unsupported archive target suffix: {0} (expected .tar.gz or .zip)")]
    UnsupportedSuffix(PathBuf),

    #[error("Source directory missing: {0}")]
    SourceMissing(PathBuf),

    #[error("Source directory has no final path component: {0}")]
    UnnamedSource(PathBuf),

    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Zip encoder error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive task aborted: {0}")]
    Panicked(String),
}

/// Stale-build cleanup errors, recorded per directory entry.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Cannot list output directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Refusing to remove directory: {0}")]
    IsDirectory(PathBuf),

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Faults that abort a whole pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Version resolution failed: {0}")]
    Version(#[from] VersionError),

    #[error("Stale-build cleanup failed: {0}")]
    Cleanup(#[from] CleanupError),

    #[error("Stage order violated: cannot move from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("{0} build/archive/cleanup unit(s) failed")]
    JobsFailed(usize),
}

/// Top-level result type for operations that may fail.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_display() {
        let err = JobError::Launch {
            program: "dotnet".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to launch 'dotnet': No such file or directory"
        );
    }

    #[test]
    fn test_unsupported_suffix_display() {
        let err = ArchiveError::UnsupportedSuffix(PathBuf::from("dist/linux-x64-1.0.0.7z"));
        assert!(err.to_string().contains("linux-x64-1.0.0.7z"));
    }

    #[test]
    fn test_pipeline_error_from_version() {
        let err: PipelineError = VersionError::Empty("__version__".to_string()).into();
        assert!(matches!(err, PipelineError::Version(_)));
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err("test error".into());
        assert!(result.is_err());
    }
}
