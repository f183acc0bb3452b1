use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;

use crate::movie_rename::stats::RunStats;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Run logger writing to a timestamped log file and mirroring to the console.
///
/// Created once per run and passed to the components that log.
/// Call [`FileLogger::finish`] at the end of the run to flush the file.
pub struct FileLogger {
    writer: BufWriter<File>,
    path: PathBuf,
    verbose: bool,
}

impl FileLogger {
    /// Create a new logger writing to `<log_dir>/movie_rename_log_<timestamp>.log`.
    ///
    /// # Errors
    /// Returns an error if the log directory or file cannot be created.
    pub fn new(log_dir: &Path, verbose: bool) -> Result<Self> {
        if !log_dir.exists() {
            fs::create_dir_all(log_dir)
                .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        }

        let log_path = log_dir.join(Self::log_file_name(&Local::now()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: log_path,
            verbose,
        })
    }

    /// Log file name for a run started at the given time.
    #[must_use]
    pub fn log_file_name(start: &DateTime<Local>) -> String {
        format!("movie_rename_log_{}.log", start.format("%Y%m%d_%H%M%S"))
    }

    /// Path of the log file being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format a line as written to the log file.
    #[must_use]
    pub fn format_file_line(timestamp: &DateTime<Local>, level: LogLevel, message: &str) -> String {
        format!("{} - {level} - {message}", timestamp.format("%Y-%m-%d %H:%M:%S,%3f"))
    }

    /// Format a line as printed to the console.
    #[must_use]
    pub fn format_console_line(level: LogLevel, message: &str) -> String {
        format!("{level} - {message}")
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let _ = writeln!(
            self.writer,
            "{}",
            Self::format_file_line(&Local::now(), level, message)
        );
        let _ = self.writer.flush();

        if level == LogLevel::Debug && !self.verbose {
            return;
        }
        let line = Self::format_console_line(level, message);
        match level {
            LogLevel::Debug => eprintln!("{}", line.dimmed()),
            LogLevel::Info => eprintln!("{line}"),
            LogLevel::Warning => eprintln!("{}", line.yellow()),
            LogLevel::Error => eprintln!("{}", line.red()),
        }
    }

    pub fn debug(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message.as_ref());
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn warning(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }

    /// Write final statistics to the log file only.
    pub fn log_stats(&mut self, stats: &RunStats) {
        let timestamp = Local::now();
        let _ = writeln!(
            self.writer,
            "{}",
            Self::format_file_line(&timestamp, LogLevel::Info, "Statistics:")
        );
        let _ = writeln!(self.writer, "  Folders found:        {}", stats.folders_found);
        let _ = writeln!(self.writer, "  Folders flattened:    {}", stats.folders_flattened);
        let _ = writeln!(self.writer, "  Folders renamed:      {}", stats.folders_renamed);
        let _ = writeln!(self.writer, "  Folders unchanged:    {}", stats.folders_unchanged);
        let _ = writeln!(self.writer, "  Renames declined:     {}", stats.folders_declined);
        let _ = writeln!(self.writer, "  Folders unidentified: {}", stats.folders_unidentified);
        let _ = writeln!(
            self.writer,
            "  Total time: {}",
            crate::format_duration(stats.total_duration)
        );
        let _ = self.writer.flush();
    }

    /// Flush and close the log file.
    ///
    /// # Errors
    /// Returns an error if buffered log lines cannot be written.
    pub fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush log file: {}", self.path.display()))
    }
}
