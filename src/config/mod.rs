//! Configuration for release builds.
//!
//! `BuildSettings` describes which toolchain to invoke, where its output trees
//! land, where archives are written and which files the cleaner must never
//! touch. Every field has a default matching the stock project layout, so an
//! empty settings file (or none at all) runs the full six-target release.
//!
//! # Module Structure
//!
//! - `loader`: discovery, loading (JSON or TOML), validation and saving

pub mod loader;

use crate::models::RuntimeId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use loader::{
    discover_settings_file, load_settings, load_settings_from_file, save_settings_to_file,
    validate_settings,
};

/// Settings for one release run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// File holding the project version
    pub metadata_file: PathBuf,
    /// Key under which the version is stored
    pub version_key: String,

    /// Toolchain executable
    pub toolchain_program: String,
    /// Arguments placed before the project path (e.g. `publish`)
    pub toolchain_subcommand: Vec<String>,
    /// Project passed to the toolchain
    pub project_path: PathBuf,
    /// Build configuration name (`-c`)
    pub configuration: String,
    /// Append `--self-contained`
    pub self_contained: bool,

    /// Directory holding one output tree per runtime identifier
    pub output_root: PathBuf,
    /// Shared directory receiving the archives
    pub dist_dir: PathBuf,
    /// Entries in `dist_dir` that cleanup never deletes
    pub protected_files: Vec<String>,
    pub runtimes: Vec<RuntimeId>,

    /// Base for every relative path above; also the toolchain's working directory
    pub working_dir: Option<PathBuf>,

    /// Treat a nonzero toolchain exit as a job failure
    pub fail_on_nonzero_exit: bool,
    /// Exit nonzero when any build, archive or cleanup unit failed
    pub fail_on_job_error: bool,

    pub log_dir: PathBuf,
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            metadata_file: PathBuf::from("./src/python_redlines/__about__.py"),
            version_key: "__version__".to_string(),
            toolchain_program: "dotnet".to_string(),
            toolchain_subcommand: vec!["publish".to_string()],
            project_path: PathBuf::from("./csproj"),
            configuration: "Release".to_string(),
            self_contained: true,
            output_root: PathBuf::from("./csproj/bin/Release/net8.0"),
            dist_dir: PathBuf::from("./src/python_redlines/dist"),
            protected_files: vec![".gitignore".to_string()],
            runtimes: RuntimeId::ALL.to_vec(),
            working_dir: None,
            fail_on_nonzero_exit: false,
            fail_on_job_error: false,
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_string(),
        }
    }
}

impl BuildSettings {
    /// Anchor a configured path at `working_dir`; absolute paths pass through.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.working_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.resolve(&self.metadata_file)
    }

    pub fn dist_path(&self) -> PathBuf {
        self.resolve(&self.dist_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }

    /// Build output tree for one runtime identifier
    pub fn output_dir_for(&self, rid: RuntimeId) -> PathBuf {
        self.resolve(&self.output_root).join(rid.as_str())
    }

    /// Parsed `log_level`, falling back to `Info` on unknown names
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
