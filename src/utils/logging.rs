//! Logging Module
//!
//! Structured console logging via the `tracing` crate, optionally teed into
//! a per-run `log_<timestamp>.txt` file, plus the append-only results log
//! (`log_res_<timestamp>.txt`) that records per-dataset outcomes.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors on the console
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// Quiet logging config (errors only)
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            include_target: false,
            ansi_colors: false,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Timestamp used to name the per-run log files, `YYYY-MMDD-HHMM`.
pub fn run_timestamp() -> String {
    Local::now().format("%Y-%m%d-%H%M").to_string()
}

/// Writer that mirrors every log line to stdout and, when configured, into
/// the run log file.
pub struct TeeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = io::stdout().write(buf)?;
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(&buf[..written]);
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
struct TeeMakeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for TeeMakeWriter {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            file: self.file.clone(),
        }
    }
}

/// Initialize logging with the given configuration.
///
/// When `log_file` is provided every line is also appended there; ANSI
/// colors are disabled in that case so the file stays readable.
pub fn init_logging(config: &LogConfig, log_file: Option<&Path>) -> Result<(), String> {
    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file {:?}: {}", path, e))?;
            Some(Arc::new(Mutex::new(file)))
        }
        None => None,
    };

    let ansi = config.ansi_colors && file.is_none();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level.to_tracing_level())
        .with_ansi(ansi)
        .with_target(config.include_target)
        .with_writer(TeeMakeWriter { file })
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Append-only results log, one line per recorded event.
///
/// Counterpart of the run log for machine-skimmable outcomes: the continual
/// loop's per-dataset summaries land here.
pub struct ResultsLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ResultsLog {
    /// Create (or truncate) the results log at the given path
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one line and flush it to disk
    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "results log poisoned"))?;
        writeln!(file, "{}", line)?;
        file.flush()
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_run_timestamp_shape() {
        let ts = run_timestamp();
        // YYYY-MMDD-HHMM
        assert_eq!(ts.len(), 14);
        assert_eq!(ts.matches('-').count(), 2);
    }

    #[test]
    fn test_results_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log_res_test.txt");
        let log = ResultsLog::create(&path).unwrap();

        log.append("market1501 epoch 59 loss 0.0123").unwrap();
        log.append("cuhk_sysu epoch 59 loss 0.0456").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("market1501"));
    }
}
