//! Core data types for dist-forge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ArchiveError, CleanupError, JobError};

/// Operating system family of a runtime identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformFamily {
    Linux,
    Windows,
    MacOs,
}

/// Platform/architecture tag used both to select a build target and to name
/// its output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeId {
    #[serde(rename = "linux-x64")]
    LinuxX64,
    #[serde(rename = "linux-arm64")]
    LinuxArm64,
    #[serde(rename = "win-x64")]
    WinX64,
    #[serde(rename = "win-arm64")]
    WinArm64,
    #[serde(rename = "osx-x64")]
    OsxX64,
    #[serde(rename = "osx-arm64")]
    OsxArm64,
}

impl RuntimeId {
    /// Every supported target, in release order.
    pub const ALL: [RuntimeId; 6] = [
        RuntimeId::LinuxX64,
        RuntimeId::LinuxArm64,
        RuntimeId::WinX64,
        RuntimeId::WinArm64,
        RuntimeId::OsxX64,
        RuntimeId::OsxArm64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeId::LinuxX64 => "linux-x64",
            RuntimeId::LinuxArm64 => "linux-arm64",
            RuntimeId::WinX64 => "win-x64",
            RuntimeId::WinArm64 => "win-arm64",
            RuntimeId::OsxX64 => "osx-x64",
            RuntimeId::OsxArm64 => "osx-arm64",
        }
    }

    pub fn family(&self) -> PlatformFamily {
        match self {
            RuntimeId::LinuxX64 | RuntimeId::LinuxArm64 => PlatformFamily::Linux,
            RuntimeId::WinX64 | RuntimeId::WinArm64 => PlatformFamily::Windows,
            RuntimeId::OsxX64 | RuntimeId::OsxArm64 => PlatformFamily::MacOs,
        }
    }

    /// Windows targets ship as zip, everything else as tar.gz.
    pub fn archive_format(&self) -> ArchiveFormat {
        match self.family() {
            PlatformFamily::Windows => ArchiveFormat::Zip,
            PlatformFamily::Linux | PlatformFamily::MacOs => ArchiveFormat::TarGz,
        }
    }

    /// Canonical artifact filename: `<runtime-id>-<version>.<ext>`.
    pub fn artifact_name(&self, version: &Version) -> String {
        format!(
            "{}-{}{}",
            self.as_str(),
            version,
            self.archive_format().suffix()
        )
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuntimeId::ALL
            .into_iter()
            .find(|rid| rid.as_str() == s)
            .ok_or_else(|| format!("Unknown runtime identifier: {}", s))
    }
}

/// Archive container, chosen from the target path's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 2] = [ArchiveFormat::TarGz, ArchiveFormat::Zip];

    /// Filename suffix including the leading dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => ".tar.gz",
            ArchiveFormat::Zip => ".zip",
        }
    }

    /// Determine the format implied by `target`'s filename.
    pub fn from_target(target: &Path) -> Result<Self, ArchiveError> {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        ArchiveFormat::ALL
            .into_iter()
            .find(|format| name.len() > format.suffix().len() && name.ends_with(format.suffix()))
            .ok_or_else(|| ArchiveError::UnsupportedSuffix(target.to_path_buf()))
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::TarGz => write!(f, "tar.gz"),
            ArchiveFormat::Zip => write!(f, "zip"),
        }
    }
}

/// Opaque version token read from project metadata.
///
/// Only ever compared as a filename suffix; never parsed as semver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(String);

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        Version(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filename suffixes an artifact of this version may end with.
    pub fn artifact_suffixes(&self) -> Vec<String> {
        ArchiveFormat::ALL
            .iter()
            .map(|format| format!("{}{}", self.0, format.suffix()))
            .collect()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One external toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    /// Short tag prefixed to every forwarded output line
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the process; inherits the caller's when unset
    pub working_dir: Option<PathBuf>,
}

impl BuildJob {
    pub fn new(label: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        BuildJob {
            label: label.into(),
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Full argument vector, program first.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

/// One (source tree, target archive) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionJob {
    pub label: String,
    pub source_dir: PathBuf,
    pub target: PathBuf,
}

impl CompressionJob {
    pub fn new(
        label: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        CompressionJob {
            label: label.into(),
            source_dir: source_dir.into(),
            target: target.into(),
        }
    }
}

/// How a launched build process finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
    /// Number of output lines forwarded
    pub lines: usize,
    pub elapsed: Duration,
}

/// What an archiving unit wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub format: ArchiveFormat,
    /// Regular files stored in the archive
    pub files: usize,
    /// Size of the finished archive on disk
    pub bytes: u64,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub label: String,
    pub result: Result<ExitReport, JobError>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct ArchiveOutcome {
    pub label: String,
    pub target: PathBuf,
    pub result: Result<ArchiveReport, ArchiveError>,
}

impl ArchiveOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Cleanup classification of one output directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    /// Artifact of the current version
    Current,
    /// Housekeeping file on the allow-list
    Protected,
    Stale,
}

/// Result of removing one stale entry.
#[derive(Debug)]
pub struct DeletionOutcome {
    pub entry: String,
    pub result: Result<(), CleanupError>,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Entries left in place (current or protected), sorted
    pub kept: Vec<String>,
    /// One outcome per stale entry, sorted by entry name
    pub outcomes: Vec<DeletionOutcome>,
}

impl CleanupReport {
    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.entry.as_str())
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}
