//! Logging setup for the CLI.
//!
//! Level precedence: `RUST_LOG`, then the configured level (`--verbose`
//! or `PUBWATCH_LOG_LEVEL`), then the default. Output goes to stderr in
//! pretty or JSON form; setting `PUBWATCH_LOG_DIR` adds a daily rolling
//! JSON file.

use crate::config::{EnvError, EnvParser};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const LOG_FILE_PREFIX: &str = "pubwatch.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("failed to create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install logger: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub stderr: bool,
    pub log_dir: Option<PathBuf>,
    /// Problems found while reading the environment, reported once the
    /// logger is up.
    pub env_errors: Vec<EnvError>,
}

impl LogConfig {
    /// Read `PUBWATCH_LOG_LEVEL` and `PUBWATCH_LOG_DIR` from the process.
    pub fn from_env(default_level: &str) -> Self {
        Self::from_parser(&mut EnvParser::new(), default_level)
    }

    pub fn from_parser(env: &mut EnvParser, default_level: &str) -> Self {
        let level = env.get_log_level("LOG_LEVEL", default_level).value;
        let log_dir = env.get_optional_path("LOG_DIR").value;
        Self {
            level,
            format: LogFormat::Pretty,
            stderr: false,
            log_dir,
            env_errors: env.take_errors(),
        }
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Filter honouring `RUST_LOG` over the configured level.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::Filter {
            filter: self.level.clone(),
            reason: e.to_string(),
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            stderr: true,
            log_dir: None,
            env_errors: Vec::new(),
        }
    }
}

/// Keeps background log writers alive. Drop at the end of `main`.
#[must_use]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer(dir: &Path) -> Result<(BoxedLayer, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LoggingError> {
    let filter = config.filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_guard = None;

    if config.stderr {
        layers.push(stderr_layer(config.format));
    }
    if let Some(dir) = &config.log_dir {
        let (layer, guard) = file_layer(dir)?;
        layers.push(layer);
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    for error in &config.env_errors {
        tracing::warn!(error = %error, "Ignoring invalid logging variable");
    }

    Ok(LoggingGuards { _file: file_guard })
}
