//! Logging setup for Surveyor binaries.
//!
//! Installs a `tracing` registry with two layers: a size-rotated file under the
//! Surveyor logs directory, and stderr. Stdout stays free for JSON payloads.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use surveyor_protocol::defaults::DEFAULT_LOG_FILTER;
use surveyor_protocol::paths::default_logs_dir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
    /// Override the logs directory (defaults to ~/.surveyor/logs)
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => default_logs_dir(),
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;
    let file_writer = SharedLog::open(log_dir, config.app_name)?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Size-capped log file: `<stem>.log` plus up to `keep - 1` older
/// generations named `<stem>.log.1` (newest) .. `<stem>.log.<keep-1>`.
struct RotatingLog {
    dir: PathBuf,
    stem: String,
    keep: usize,
    limit: u64,
    file: File,
    written: u64,
}

impl RotatingLog {
    fn open(dir: PathBuf, name: &str, keep: usize, limit: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let stem = sanitize_name(name);
        let file = append_to(&generation_path(&dir, &stem, 0))?;
        let written = file.metadata()?.len();
        let mut log = Self {
            dir,
            stem,
            keep: keep.max(1),
            limit,
            file,
            written,
        };
        if log.written > log.limit {
            log.rotate()?;
        }
        Ok(log)
    }

    fn path(&self, generation: usize) -> PathBuf {
        generation_path(&self.dir, &self.stem, generation)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        // Walk oldest first so every rename lands on a free name.
        for generation in (0..self.keep).rev() {
            let from = self.path(generation);
            if !from.exists() {
                continue;
            }
            if generation + 1 >= self.keep {
                fs::remove_file(&from)?;
            } else {
                fs::rename(&from, self.path(generation + 1))?;
            }
        }

        self.file = append_to(&self.path(0))?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn generation_path(dir: &Path, stem: &str, generation: usize) -> PathBuf {
    match generation {
        0 => dir.join(format!("{}.log", stem)),
        n => dir.join(format!("{}.log.{}", stem, n)),
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// `MakeWriter` over one shared [`RotatingLog`].
#[derive(Clone)]
struct SharedLog(Arc<Mutex<RotatingLog>>);

impl SharedLog {
    fn open(dir: PathBuf, name: &str) -> Result<Self> {
        let log = RotatingLog::open(dir, name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", name))?;
        Ok(Self(Arc::new(Mutex::new(log))))
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut RotatingLog) -> io::Result<T>) -> io::Result<T> {
        let mut log = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        f(&mut log)
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_log(|log| log.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_log(|log| log.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLog {
    type Writer = SharedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("surveyor cli/v1"), "surveyor_cli_v1");
    }

    #[test]
    fn test_rotation_keeps_bounded_files() {
        let tmp = TempDir::new().unwrap();
        let mut log = RotatingLog::open(tmp.path().to_path_buf(), "surveyor", 3, 16).unwrap();

        for _ in 0..6 {
            log.write_all(b"0123456789abcdef").unwrap();
        }
        log.flush().unwrap();

        assert!(tmp.path().join("surveyor.log").exists());
        assert!(tmp.path().join("surveyor.log.1").exists());
        assert!(tmp.path().join("surveyor.log.2").exists());
        assert!(!tmp.path().join("surveyor.log.3").exists());
    }
}
