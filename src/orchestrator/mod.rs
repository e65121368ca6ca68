//! Release orchestration: version -> builds -> archives -> cleanup -> report.
//!
//! Each stage ends at a fan-out barrier and the next stage starts only after
//! every unit of the previous one has finished. There is no rollback: a failed
//! build does not stop its archive from being attempted, and per-unit failures
//! are collected into the final `PipelineReport`.

pub mod fanout;
pub mod runner;
pub mod state;

use std::time::Instant;

pub use fanout::{run_build_jobs, run_compression_jobs, TaskGroup};
pub use runner::{run_process, ExitPolicy};
pub use state::{PipelineReport, PipelineStage, StageTracker};

use crate::cleaner::cleanup_stale_builds;
use crate::config::BuildSettings;
use crate::error::PipelineError;
use crate::log_collector::LogCollector;
use crate::models::{BuildJob, CompressionJob, Version};
use crate::version::resolve_version;

/// One toolchain invocation per configured runtime identifier.
///
/// `<program> <subcommand..> <project> -c <configuration> -r <rid> [--self-contained]`
pub fn plan_build_jobs(settings: &BuildSettings) -> Vec<BuildJob> {
    settings
        .runtimes
        .iter()
        .map(|rid| {
            let mut args = settings.toolchain_subcommand.clone();
            args.push(settings.project_path.to_string_lossy().into_owned());
            args.extend([
                "-c".to_string(),
                settings.configuration.clone(),
                "-r".to_string(),
                rid.to_string(),
            ]);
            if settings.self_contained {
                args.push("--self-contained".to_string());
            }

            let job = BuildJob::new(rid.as_str(), settings.toolchain_program.clone(), args);
            match settings.working_dir {
                Some(ref dir) => job.in_dir(dir),
                None => job,
            }
        })
        .collect()
}

/// One (output tree, `<dist>/<rid>-<version>.<ext>`) pair per runtime identifier.
pub fn plan_compression_jobs(settings: &BuildSettings, version: &Version) -> Vec<CompressionJob> {
    let dist = settings.dist_path();
    settings
        .runtimes
        .iter()
        .map(|rid| {
            CompressionJob::new(
                rid.as_str(),
                settings.output_dir_for(*rid),
                dist.join(rid.artifact_name(version)),
            )
        })
        .collect()
}

/// Runs the release pipeline for one set of settings.
pub struct Orchestrator {
    settings: BuildSettings,
    log_collector: LogCollector,
    stages: StageTracker,
}

impl Orchestrator {
    pub fn new(settings: BuildSettings, log_collector: LogCollector) -> Self {
        Orchestrator {
            settings,
            log_collector,
            stages: StageTracker::new(),
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn stage(&self) -> PipelineStage {
        self.stages.current()
    }

    /// Stages visited by the last `run`, oldest first
    pub fn stage_history(&self) -> &[PipelineStage] {
        self.stages.history()
    }

    /// Run all stages in order.
    ///
    /// Only an unreadable version or an unlistable dist directory aborts the
    /// run; every other failure is recorded in the returned report.
    pub async fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();
        self.stages = StageTracker::new();

        // Stage 1: version
        self.advance(PipelineStage::ResolvingVersion)?;
        let version = match resolve_version(&self.settings.metadata_path(), &self.settings.version_key)
        {
            Ok(v) => v,
            Err(e) => {
                self.advance(PipelineStage::Failed)?;
                return Err(e.into());
            }
        };
        self.log_collector.log_parsed(format!("Version: {}", version));

        // Stage 2: builds
        self.advance(PipelineStage::Building)?;
        let policy = if self.settings.fail_on_nonzero_exit {
            ExitPolicy::Fail
        } else {
            ExitPolicy::LogOnly
        };
        let build_jobs = plan_build_jobs(&self.settings);
        log::info!(target: "parsed", "Starting {} build jobs", build_jobs.len());
        let builds = run_build_jobs(&build_jobs, &self.log_collector, policy).await;

        // Stage 3: archives
        self.advance(PipelineStage::Compressing)?;
        let dist_dir = self.settings.dist_path();
        if let Err(e) = std::fs::create_dir_all(&dist_dir) {
            log::warn!("Cannot create dist directory {}: {}", dist_dir.display(), e);
        }
        let compression_jobs = plan_compression_jobs(&self.settings, &version);
        log::info!(target: "parsed", "Compressing {} output trees", compression_jobs.len());
        let archives = run_compression_jobs(&compression_jobs).await;

        // Stage 4: cleanup
        self.advance(PipelineStage::Cleaning)?;
        let cleanup = match cleanup_stale_builds(
            &dist_dir,
            &version,
            &self.settings.protected_files,
        ) {
            Ok(report) => report,
            Err(e) => {
                self.advance(PipelineStage::Failed)?;
                return Err(e.into());
            }
        };

        // Stage 5: report
        self.advance(PipelineStage::Completed)?;
        let report = PipelineReport {
            version,
            builds,
            archives,
            cleanup,
            elapsed: started.elapsed(),
        };

        self.log_collector
            .log_parsed("Build and compression complete.");
        let failures = report.failure_lines();
        if !failures.is_empty() {
            self.log_collector
                .log_parsed(format!("{} unit(s) failed:", failures.len()));
            for line in failures {
                self.log_collector.log_parsed(format!("  - {}", line));
            }
        }

        Ok(report)
    }

    fn advance(&mut self, next: PipelineStage) -> Result<(), PipelineError> {
        self.stages.transition_to(next)?;
        log::debug!("Pipeline stage: {}", next.as_str());
        Ok(())
    }
}
