//! Tracing setup for the adapter.
//!
//! Events go to stderr and, when a directory is given, to a daily-rotated
//! file. The level of the crate's own events can be changed at runtime.

use std::{fs::create_dir_all, io::stderr, path::Path, str::FromStr};

use {
    anyhow::{Context, Result},
    tracing::{info, level_filters::LevelFilter},
    tracing_appender::{
        non_blocking,
        non_blocking::WorkerGuard,
        rolling::{RollingFileAppender, Rotation},
    },
    tracing_subscriber::{
        EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
    },
};

const LOG_FILE_PREFIX: &str = "inflink";
const LOG_FILE_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 7;
const DEFAULT_DIRECTIVES: &str = "inflink=debug,warn";

/// Keeps the file writer alive and allows level changes.
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    _guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    /// Sets the level of the crate's own events; other crates stay at `warn`.
    ///
    /// # Errors
    ///
    /// Returns an error if `level` is not a level name or the subscriber
    /// is gone.
    pub fn set_log_level(&self, level: &str) -> Result<()> {
        let filter = EnvFilter::try_new(directives_for_level(level)?)
            .context("Building log filter")?;
        self.filter.reload(filter).context("Reloading log filter")?;
        info!(level, "Log level changed");
        Ok(())
    }
}

/// Builds the filter directives for a level name such as `"debug"`.
///
/// # Errors
///
/// Returns an error if `level` is not one of `off`, `error`, `warn`,
/// `info`, `debug` or `trace`.
pub fn directives_for_level(level: &str) -> Result<String> {
    let level = LevelFilter::from_str(level.trim())
        .with_context(|| format!("Invalid log level '{level}'"))?;
    Ok(format!("inflink={level},warn").to_lowercase())
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default directives.
///
/// # Arguments
///
/// * `log_dir` - Directory for rotated log files; `None` logs to stderr only.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_logging(log_dir: Option<&Path>) -> Result<LoggingHandle> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let (filter, filter_handle) = reload::Layer::new(filter);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            create_dir_all(dir)
                .with_context(|| format!("Creating log directory {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix(LOG_FILE_SUFFIX)
                .max_log_files(MAX_LOG_FILES)
                .build(dir)
                .context("Building rolling log appender")?;
            let (writer, guard) = non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(stderr))
        .with(file_layer)
        .try_init()
        .context("Installing tracing subscriber")?;

    info!(file_logging = log_dir.is_some(), "Logging initialized");

    Ok(LoggingHandle {
        filter: filter_handle,
        _guard: guard,
    })
}

#[cfg(test)]
mod tests {
    use crate::logging::directives_for_level;

    #[test]
    fn test_directives_for_level() {
        assert_eq!(directives_for_level("debug").unwrap(), "inflink=debug,warn");
        assert_eq!(directives_for_level(" TRACE ").unwrap(), "inflink=trace,warn");
        assert_eq!(directives_for_level("off").unwrap(), "inflink=off,warn");
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(directives_for_level("loud").is_err());
        assert!(directives_for_level("verbose").is_err());
    }
}
