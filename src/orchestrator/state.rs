//! Pipeline stage tracking and the end-of-run report.
//!
//! Stages advance strictly in order. The orchestrator moves to the next stage
//! only after the current stage's fan-out barrier has been crossed, and
//! `transition_to` rejects anything else.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PipelineError;
use crate::models::{ArchiveOutcome, CleanupReport, JobOutcome, Version};

/// Discrete stages of a release run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Nothing started yet
    Pending,
    ResolvingVersion,
    /// Job fan-out in flight
    Building,
    /// Compression fan-out in flight
    Compressing,
    /// Stale-build cleanup
    Cleaning,
    Completed,
    /// Aborted by an unrecoverable fault (e.g. version unreadable)
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Pending => "pending",
            PipelineStage::ResolvingVersion => "resolving-version",
            PipelineStage::Building => "building",
            PipelineStage::Compressing => "compressing",
            PipelineStage::Cleaning => "cleaning",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    /// Get all valid stage transitions FROM this stage.
    pub fn valid_next_stages(&self) -> &'static [PipelineStage] {
        match self {
            PipelineStage::Pending => &[PipelineStage::ResolvingVersion],
            PipelineStage::ResolvingVersion => &[PipelineStage::Building, PipelineStage::Failed],
            PipelineStage::Building => &[PipelineStage::Compressing, PipelineStage::Failed],
            PipelineStage::Compressing => &[PipelineStage::Cleaning, PipelineStage::Failed],
            PipelineStage::Cleaning => &[PipelineStage::Completed, PipelineStage::Failed],
            PipelineStage::Completed | PipelineStage::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        self.valid_next_stages().contains(&next)
    }
}

/// Tracks the current stage of one run.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: PipelineStage,
    history: Vec<PipelineStage>,
}

impl StageTracker {
    pub fn new() -> Self {
        StageTracker {
            current: PipelineStage::Pending,
            history: vec![PipelineStage::Pending],
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Stages visited so far, oldest first
    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn transition_to(&mut self, next: PipelineStage) -> Result<(), PipelineError> {
        if !self.current.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.current.as_str(),
                to: next.as_str(),
            });
        }
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a run did, reported after the final barrier.
#[derive(Debug)]
pub struct PipelineReport {
    pub version: Version,
    pub builds: Vec<JobOutcome>,
    pub archives: Vec<ArchiveOutcome>,
    pub cleanup: CleanupReport,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Build, archive and deletion units that failed
    pub fn failure_count(&self) -> usize {
        self.builds.iter().filter(|o| !o.is_ok()).count()
            + self.archives.iter().filter(|o| !o.is_ok()).count()
            + self.cleanup.failures().count()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }

    /// Human-readable failure lines, one per failed unit.
    pub fn failure_lines(&self) -> Vec<String> {
        let builds = self.builds.iter().filter_map(|o| {
            o.result
                .as_ref()
                .err()
                .map(|e| format!("build {}: {}", o.label, e))
        });
        let archives = self.archives.iter().filter_map(|o| {
            o.result
                .as_ref()
                .err()
                .map(|e| format!("archive {}: {}", o.label, e))
        });
        let cleanup = self.cleanup.failures().filter_map(|o| {
            o.result
                .as_ref()
                .err()
                .map(|e| format!("cleanup {}: {}", o.entry, e))
        });
        builds.chain(archives).chain(cleanup).collect()
    }

    /// Convert per-unit failures into an error when strict mode is requested.
    pub fn into_strict_result(self) -> Result<PipelineReport, PipelineError> {
        match self.failure_count() {
            0 => Ok(self),
            n => Err(PipelineError::JobsFailed(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ArchiveError, JobError};
    use crate::models::ExitReport;
    use std::path::PathBuf;

    #[test]
    fn test_stage_order_is_strict() {
        let mut tracker = StageTracker::new();
        for stage in [
            PipelineStage::ResolvingVersion,
            PipelineStage::Building,
            PipelineStage::Compressing,
            PipelineStage::Cleaning,
            PipelineStage::Completed,
        ] {
            tracker.transition_to(stage).unwrap();
        }
        assert_eq!(tracker.history().len(), 6);
        assert_eq!(tracker.current(), PipelineStage::Completed);
    }

    #[test]
    fn test_cleanup_cannot_precede_compression() {
        let mut tracker = StageTracker::new();
        tracker.transition_to(PipelineStage::ResolvingVersion).unwrap();
        tracker.transition_to(PipelineStage::Building).unwrap();
        let err = tracker.transition_to(PipelineStage::Cleaning).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition { from: "building", to: "cleaning" }
        ));
        assert_eq!(tracker.current(), PipelineStage::Building);
    }

    #[test]
    fn test_terminal_stages() {
        assert!(PipelineStage::Completed.valid_next_stages().is_empty());
        assert!(PipelineStage::Failed.valid_next_stages().is_empty());
    }

    #[test]
    fn test_report_failure_accounting() {
        let report = PipelineReport {
            version: Version::new("1.0.0"),
            builds: vec![
                JobOutcome {
                    label: "linux-x64".to_string(),
                    result: Ok(ExitReport {
                        code: Some(0),
                        success: true,
                        lines: 1,
                        elapsed: Duration::from_millis(5),
                    }),
                },
                JobOutcome {
                    label: "win-x64".to_string(),
                    result: Err(JobError::NonZeroExit(1)),
                },
            ],
            archives: vec![ArchiveOutcome {
                label: "win-x64".to_string(),
                target: PathBuf::from("dist/win-x64-1.0.0.zip"),
                result: Err(ArchiveError::SourceMissing(PathBuf::from("out/win-x64"))),
            }],
            cleanup: CleanupReport::default(),
            elapsed: Duration::from_secs(1),
        };

        assert_eq!(report.failure_count(), 2);
        assert!(!report.is_clean());
        let lines = report.failure_lines();
        assert_eq!(lines[0], "build win-x64: Build exited with code 1");
        assert!(lines[1].starts_with("archive win-x64: Source directory missing"));
        assert!(matches!(
            report.into_strict_result(),
            Err(PipelineError::JobsFailed(2))
        ));
    }
}
