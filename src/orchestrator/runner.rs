//! Process runner: spawn one toolchain invocation and stream its output.
//!
//! stdout and stderr are both piped and drained concurrently into a single
//! line stream. Each line is forwarded to the `LogCollector` as soon as it
//! arrives, prefixed with the job label, so long builds show live progress.

use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::JobError;
use crate::log_collector::LogCollector;
use crate::models::{BuildJob, ExitReport};

/// How the runner treats a nonzero exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Log the status and report the job as completed
    #[default]
    LogOnly,
    /// Report the job as failed
    Fail,
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

impl Pipe {
    fn as_str(&self) -> &'static str {
        match self {
            Pipe::Stdout => "stdout",
            Pipe::Stderr => "stderr",
        }
    }
}

/// Run `job` to completion, forwarding its combined output line by line.
///
/// Returns once the process has exited and both pipes are drained.
///
/// # Returns
/// * `Ok(ExitReport)` when the process ran (any exit status under `ExitPolicy::LogOnly`)
/// * `Err(JobError::Launch)` if the executable could not be started
/// * `Err(JobError::NonZeroExit | Signalled)` under `ExitPolicy::Fail`
pub async fn run_process(
    job: &BuildJob,
    collector: &LogCollector,
    policy: ExitPolicy,
) -> Result<ExitReport, JobError> {
    let started = Instant::now();
    log::debug!("[{}] $ {}", job.label, job.argv().join(" "));

    let mut command = Command::new(&job.program);
    command
        .args(&job.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(ref dir) = job.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| JobError::Launch {
        program: job.program.clone(),
        source,
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or(JobError::PipeUnavailable("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(JobError::PipeUnavailable("stderr"))?;

    // A reader is dropped at EOF or on a read error, so a child still writing
    // to a failed pipe sees EPIPE instead of blocking on a full buffer.
    let mut stdout = Some(BufReader::new(stdout));
    let mut stderr = Some(BufReader::new(stderr));
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let mut lines = 0_usize;

    while stdout.is_some() || stderr.is_some() {
        let (pipe, next) = tokio::select! {
            line = read_next_line(stdout.as_mut(), &mut stdout_buf), if stdout.is_some() => {
                (Pipe::Stdout, line)
            }
            line = read_next_line(stderr.as_mut(), &mut stderr_buf), if stderr.is_some() => {
                (Pipe::Stderr, line)
            }
        };

        let closed = match next {
            Ok(Some(line)) => {
                lines += 1;
                collector.log_str(format!("[{}] {}", job.label, line));
                false
            }
            Ok(None) => true,
            Err(e) => {
                // The exit status still decides the outcome
                log::warn!("[{}] {} read error: {}", job.label, pipe.as_str(), e);
                true
            }
        };
        if closed {
            match pipe {
                Pipe::Stdout => stdout = None,
                Pipe::Stderr => stderr = None,
            }
        }
    }

    let status = child.wait().await?;
    let report = ExitReport {
        code: status.code(),
        success: status.success(),
        lines,
        elapsed: started.elapsed(),
    };

    if report.success {
        log::debug!("[{}] exited successfully in {:.1?}", job.label, report.elapsed);
        return Ok(report);
    }

    match report.code {
        Some(code) => log::warn!("[{}] build exited with code {}", job.label, code),
        None => log::warn!("[{}] build terminated by signal", job.label),
    }

    match (policy, report.code) {
        (ExitPolicy::LogOnly, _) => Ok(report),
        (ExitPolicy::Fail, Some(code)) => Err(JobError::NonZeroExit(code)),
        (ExitPolicy::Fail, None) => Err(JobError::Signalled),
    }
}

/// `read_line_lossy` on a pipe that may already be closed.
async fn read_next_line<R>(
    reader: Option<&mut R>,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match reader {
        Some(reader) => read_line_lossy(reader, buf).await,
        None => Ok(None),
    }
}

/// Read one line, decoding invalid UTF-8 lossily and stripping the line ending.
///
/// Cancel-safe inside `select!`: bytes of a partially read line stay in `buf`
/// and are completed by the next call.
async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let read = reader.read_until(b'\n', buf).await?;
    if read == 0 && buf.is_empty() {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf).trim_end().to_string();
    buf.clear();
    Ok(Some(line))
}
