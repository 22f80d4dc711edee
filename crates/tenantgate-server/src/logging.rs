//! Logging initialization
//!
//! `RUST_LOG` always wins over the configured level. File output goes
//! through a non-blocking writer; the returned [`LoggingGuard`] must be held
//! until the process exits or buffered lines are lost.
//!
//! ```rust,no_run
//! use tenantgate_server::LoggingConfig;
//!
//! let _guard = LoggingConfig::default().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogOutput, LoggingConfig};

/// Flushes file logs on drop
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

impl LoggingConfig {
    /// Install the global tracing subscriber
    ///
    /// Returns `Some(LoggingGuard)` for file output, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File output is configured without a directory, or the directory
    ///   cannot be created
    /// - A global subscriber is already installed
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(None),
            LogOutput::Stderr => {
                init_stderr(self, filter)?;
                Ok(None)
            }
            LogOutput::File => {
                let dir = self.directory.as_ref().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "File logging requires logging.directory",
                    )
                })?;
                init_file(self, dir, filter).map(Some)
            }
        }
    }
}

fn init_stderr(config: &LoggingConfig, filter: EnvFilter) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

fn init_file(config: &LoggingConfig, dir: &Path, filter: EnvFilter) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    }

    Ok(LoggingGuard { _file_guard: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_output_requires_directory() {
        let config = LoggingConfig {
            output: LogOutput::File,
            directory: None,
            ..Default::default()
        };
        let err = config.init().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_disabled_output_installs_nothing() {
        let config = LoggingConfig {
            output: LogOutput::None,
            ..Default::default()
        };
        assert!(config.init().unwrap().is_none());
    }
}
