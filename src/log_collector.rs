//! Decoupled logging pipeline for concurrent build output.
//!
//! Every line, whether a forwarded toolchain line or a `log::*` record, is sent
//! down one unbounded channel and written by a single background thread. That
//! thread is the only writer to the console and the session log files, so
//! output from concurrent jobs can interleave line by line but never mid-line.
//!
//! # Architecture
//!
//! ```text
//! build job A ─┐
//! build job B ─┼─> [LogCollector] ──(crossbeam unbounded)──> writer thread
//! log::info! ──┘                                               ├─> stdout
//!                                                              ├─> logs/full/<ts>_full.log
//!                                                              ├─> logs/parsed/<ts>_parsed.log (milestones)
//!                                                              └─> optional subscriber (tokio mpsc)
//! ```

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Internal log line or special marker
enum LogMessage {
    Line(LogLine),
    /// Flush marker; the writer signals once everything before it is on disk
    Flush(tokio::sync::oneshot::Sender<()>),
}

/// Ensure the logs directory exists
pub fn ensure_logs_dir_exists(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create logs directory: {}", e))
}

/// Kind of log line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogKind {
    /// Detailed output (toolchain lines, debug records)
    Full,
    /// High-level milestone; also persisted to the parsed log
    Parsed,
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    pub kind: LogKind,
    /// Wall-clock time the line was created
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            kind: LogKind::Full,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn parsed(message: String) -> Self {
        LogLine {
            kind: LogKind::Parsed,
            ..LogLine::new(message)
        }
    }
}

/// Unified logger that fans each line out to console, disk and subscriber
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    full_log_path: PathBuf,
    max_level: log::LevelFilter,
}

impl LogCollector {
    /// Create a collector and start its writer thread.
    ///
    /// * `log_dir` - root for the `full/` and `parsed/` session logs
    /// * `subscriber` - optional channel receiving a copy of every line (non-blocking)
    /// * `console` - echo lines to stdout
    pub fn new(
        log_dir: PathBuf,
        subscriber: Option<tokio::sync::mpsc::Sender<LogLine>>,
        console: bool,
    ) -> Result<Self, String> {
        let full_log_dir = log_dir.join("full");
        let parsed_log_dir = log_dir.join("parsed");
        std::fs::create_dir_all(&full_log_dir)
            .map_err(|e| format!("Failed to create full log dir: {}", e))?;
        std::fs::create_dir_all(&parsed_log_dir)
            .map_err(|e| format!("Failed to create parsed log dir: {}", e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S%.3f");
        let full_log_path = full_log_dir.join(format!("{}_full.log", stamp));
        let parsed_log_path = parsed_log_dir.join(format!("{}_parsed.log", stamp));
        let mut full_file = open_append(&full_log_path)?;
        let mut parsed_file = open_append(&parsed_log_path)?;

        let (tx, rx) = unbounded::<LogMessage>();

        // OS thread, not a tokio task: keeps draining even while the runtime
        // is shutting down.
        std::thread::spawn(move || {
            let stdout = std::io::stdout();
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        if console {
                            let mut handle = stdout.lock();
                            let _ = writeln!(handle, "{}", line.message);
                        }

                        let formatted = format!("[{}] {}\n", line.timestamp, line.message);
                        let _ = full_file.write_all(formatted.as_bytes());
                        if line.kind == LogKind::Parsed {
                            let _ = parsed_file.write_all(formatted.as_bytes());
                        }

                        if let Some(ref sub) = subscriber {
                            let _ = sub.try_send(line);
                        }
                    }
                    LogMessage::Flush(done) => {
                        let _ = full_file.flush();
                        let _ = parsed_file.flush();
                        let _ = stdout.lock().flush();
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            tx,
            full_log_path,
            max_level: log::LevelFilter::Info,
        })
    }

    /// Set the highest level accepted through the `log` facade.
    pub fn with_max_level(mut self, level: log::LevelFilter) -> Self {
        self.max_level = level;
        self
    }

    /// Path of this session's full log file
    pub fn session_log_path(&self) -> &Path {
        &self.full_log_path
    }

    /// Send a log line (non-blocking, never fails)
    pub fn log(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    pub fn log_str(&self, message: impl Into<String>) {
        self.log(LogLine::new(message.into()));
    }

    /// Send a milestone line
    pub fn log_parsed(&self, message: impl Into<String>) {
        self.log(LogLine::parsed(message.into()));
    }

    /// Wait until every line sent before this call has been written out.
    pub async fn wait_for_empty(&self) -> Result<(), String> {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(LogMessage::Flush(done_tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        done_rx
            .await
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }
}

/// Wires `log::info!()`, `log::warn!()`, ... into the collector.
///
/// Records with target `"parsed"` are treated as milestones.
impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if record.target() == "parsed" {
            self.log_parsed(record.args().to_string());
        } else if record.level() == log::Level::Info {
            self.log_str(record.args().to_string());
        } else {
            self.log_str(format!("[{}] {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

fn open_append(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_log_collector_creates_directories() {
        let temp_dir = TempDir::new().unwrap();

        let collector = LogCollector::new(temp_dir.path().to_path_buf(), None, false).unwrap();

        assert!(temp_dir.path().join("full").exists());
        assert!(temp_dir.path().join("parsed").exists());
        assert!(collector.session_log_path().exists());
    }

    #[tokio::test]
    async fn test_log_collector_persists_after_flush() {
        let temp_dir = TempDir::new().unwrap();
        let collector = LogCollector::new(temp_dir.path().to_path_buf(), None, false).unwrap();

        for i in 0..1000 {
            collector.log_str(format!("[linux-x64] line {}", i));
        }
        collector.log_parsed("Version: 1.2.3");
        collector.wait_for_empty().await.unwrap();

        let full = fs::read_to_string(collector.session_log_path()).unwrap();
        assert_eq!(full.lines().count(), 1001);
        assert!(full.contains("[linux-x64] line 999"));

        let parsed_dir = temp_dir.path().join("parsed");
        let parsed_file = fs::read_dir(&parsed_dir).unwrap().next().unwrap().unwrap();
        let parsed = fs::read_to_string(parsed_file.path()).unwrap();
        assert_eq!(parsed.lines().count(), 1);
        assert!(parsed.ends_with("Version: 1.2.3\n"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_lines_in_send_order() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let collector = LogCollector::new(temp_dir.path().to_path_buf(), Some(tx), false).unwrap();

        collector.log_str("first");
        collector.log_parsed("second");
        collector.wait_for_empty().await.unwrap();

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!(a.message, "first");
        assert_eq!(a.kind, LogKind::Full);
        assert_eq!(b.message, "second");
        assert_eq!(b.kind, LogKind::Parsed);
    }

    #[tokio::test]
    async fn test_log_facade_respects_max_level() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let collector = LogCollector::new(temp_dir.path().to_path_buf(), Some(tx), false)
            .unwrap()
            .with_max_level(log::LevelFilter::Warn);

        Log::log(
            &collector,
            &Record::builder()
                .level(log::Level::Info)
                .args(format_args!("hidden"))
                .build(),
        );
        Log::log(
            &collector,
            &Record::builder()
                .level(log::Level::Warn)
                .args(format_args!("shown"))
                .build(),
        );
        collector.wait_for_empty().await.unwrap();

        let line = rx.recv().await.unwrap();
        assert_eq!(line.message, "[WARN] shown");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_only_info_records_are_untagged() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let collector = LogCollector::new(temp_dir.path().to_path_buf(), Some(tx), false)
            .unwrap()
            .with_max_level(log::LevelFilter::Debug);

        for (level, text) in [
            (log::Level::Error, "compression failed"),
            (log::Level::Warn, "build exited with code 1"),
            (log::Level::Info, "Packed dist/linux-x64-1.0.tar.gz"),
            (log::Level::Debug, "Pipeline stage: building"),
        ] {
            Log::log(
                &collector,
                &Record::builder().level(level).args(format_args!("{}", text)).build(),
            );
        }
        collector.wait_for_empty().await.unwrap();

        let mut messages = Vec::new();
        while let Ok(line) = rx.try_recv() {
            messages.push(line.message);
        }
        assert_eq!(
            messages,
            vec![
                "[ERROR] compression failed",
                "[WARN] build exited with code 1",
                "Packed dist/linux-x64-1.0.tar.gz",
                "[DEBUG] Pipeline stage: building",
            ]
        );
    }
}
