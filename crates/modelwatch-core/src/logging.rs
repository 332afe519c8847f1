//! Tracing subscriber setup for `mw`.
//!
//! One global subscriber is built from [`LogConfig`]: events go to stderr in
//! the configured format and, when `file` is set, are appended to that file
//! in the same format without colors. `RUST_LOG` replaces the configured
//! level when present.
//!
//! Dispatch code logs with the fields `event_kind`, `observer`,
//! `observer_id` and `fault`.

pub use crate::config::LogFormat;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `[logging]` section of `modelwatch.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// off, error, warn, info, debug or trace
    pub level: String,
    pub format: LogFormat,
    /// Appended to when set; parent directories are created.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LogConfig {
    /// The configured level as a filter.
    pub fn level_filter(&self) -> Result<LevelFilter, LogError> {
        self.level
            .trim()
            .parse()
            .map_err(|_| LogError::Level(self.level.clone()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("unknown log level {0:?}, expected off, error, warn, info, debug or trace")]
    Level(String),

    #[error("cannot open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    Installed(#[from] TryInitError),
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let level = config.level_filter()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let mut layers = vec![format_layer(config.format, io::stderr, true)];
    if let Some(path) = &config.file {
        let file = open_log_file(path).map_err(|source| LogError::File {
            path: path.display().to_string(),
            source,
        })?;
        layers.push(format_layer(config.format, Mutex::new(file), false));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    tracing::debug!(
        level = %level,
        format = %config.format,
        file = ?config.file,
        "logging initialized"
    );
    Ok(())
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(true);
    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::options().create(true).append(true).open(path)
}
