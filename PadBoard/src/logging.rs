//! Tracing setup.
//!
//! The subscriber is installed first thing, logging to stderr at `info`.
//! Once the settings are known, [`Logging::configure`] switches the level and
//! moves the output to a file when one is configured.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

pub const ENV_LOG_FILE: &str = "PADBOARD_LOG_FILE";
const DEFAULT_LEVEL: &str = "info";

/// Where and how much to log, resolved from the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// `PADBOARD_LOG_FILE` wins over the configured file.
    pub fn new(level: impl Into<String>, configured_file: Option<PathBuf>) -> Self {
        let file = env::var(ENV_LOG_FILE)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .or(configured_file);
        Self {
            level: level.into(),
            file,
        }
    }
}

pub struct Logging {
    filter: reload::Handle<EnvFilter, Registry>,
    target: LogTarget,
}

/// Installs the global subscriber. `RUST_LOG` always wins over the
/// configured level.
pub fn init_tracing() -> Logging {
    let _ = tracing_log::LogTracer::init();
    let target = LogTarget::default();
    let writer_target = target.clone();
    let (filter, handle) = reload::Layer::new(env_filter(DEFAULT_LEVEL));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(BoxMakeWriter::new(move || writer_target.clone())),
        )
        .try_init();
    Logging {
        filter: handle,
        target,
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

impl Logging {
    pub fn configure(&self, settings: &LogSettings) {
        if let Err(err) = self.filter.reload(env_filter(&settings.level)) {
            warn!(error = %err, "Cannot change log level");
        }
        if let Some(path) = &settings.file {
            match self.target.redirect(path) {
                Ok(()) => info!(log_file = %path.display(), "Logging to file"),
                Err(err) => eprintln!(
                    "Cannot open {} for logs: {err}. Falling back to stderr",
                    path.display()
                ),
            }
        }
    }
}

/// Log sink shared by every writer the subscriber makes: an append-only
/// file once redirected, stderr before.
#[derive(Clone, Default)]
struct LogTarget {
    file: Arc<Mutex<Option<File>>>,
}

impl LogTarget {
    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn redirect(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.lock() = Some(file);
        Ok(())
    }
}

impl Write for LogTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.lock().as_mut() {
            Some(file) => file.write(buf),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().as_mut() {
            Some(file) => file.flush(),
            None => io::stderr().flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_redirect_applies_to_existing_clones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padboard.log");

        let target = LogTarget::default();
        let mut writer = target.clone();
        target.redirect(&path).unwrap();
        writer.write_all(b"one\n").unwrap();
        target.clone().write_all(b"two\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_redirect_to_missing_directory_fails() {
        let target = LogTarget::default();
        assert!(target.redirect(Path::new("/definitely/not/here/pad.log")).is_err());
        assert!(target.lock().is_none());
    }

    #[test]
    fn test_configured_file_is_used_without_env() {
        if env::var(ENV_LOG_FILE).is_ok() {
            return;
        }
        let settings = LogSettings::new("debug", Some(PathBuf::from("pads.log")));
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.file, Some(PathBuf::from("pads.log")));
        assert_eq!(LogSettings::new("info", None).file, None);
    }
}
