//! Settings for pubwatch.
//!
//! Values resolve from lowest to highest precedence:
//! built-in defaults, a TOML file, `PUBWATCH_*` variables, then CLI flags
//! (applied by the binary). The file is `--config`, else `PUBWATCH_CONFIG`,
//! else `<config dir>/pubwatch/config.toml` when it exists.
//!
//! ```toml
//! [store]
//! url = "https://api.snapcraft.io"
//! store_id = "ubuntu"
//!
//! [ppa]
//! base_url = "http://ppa.launchpad.net"
//! owner = "checkbox-dev"
//!
//! [poll]
//! timeout_secs = 300
//! interval_secs = 30
//! request_timeout_secs = 10
//! ```

pub mod env;
pub mod source;

pub use env::{ENV_PREFIX, EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use crate::poll::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, PollConfig};
use crate::probe::{
    DEFAULT_PPA_BASE_URL, DEFAULT_PPA_OWNER, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STORE_ID,
    DEFAULT_STORE_URL,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("invalid environment: {}", join_errors(.0))]
    Env(Vec<EnvError>),
}

fn join_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    pub url: String,
    pub store_id: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_STORE_URL.to_string(),
            store_id: DEFAULT_STORE_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpaSettings {
    pub base_url: String,
    pub owner: String,
}

impl Default for PpaSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PPA_BASE_URL.to_string(),
            owner: DEFAULT_PPA_OWNER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub store: StoreSettings,
    pub ppa: PpaSettings,
    pub poll: PollSettings,
}

/// Per-key origin of resolved settings, keyed by `section.field`.
pub type Provenance = BTreeMap<&'static str, ConfigSource>;

/// `<config dir>/pubwatch/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pubwatch").join("config.toml"))
}

impl Settings {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Resolve defaults, file and environment.
    ///
    /// `explicit` (a `--config` flag) wins over `PUBWATCH_CONFIG`; either
    /// must exist. The platform default file is only read when present.
    pub fn resolve(
        explicit: Option<&Path>,
        env: &mut EnvParser,
    ) -> Result<(Self, Provenance), ConfigError> {
        let mut provenance = Provenance::new();
        let env_path = env.get_optional_path("CONFIG").value;

        let file = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(path),
            None => default_config_path().filter(|p| p.is_file()),
        };

        let mut settings = match &file {
            Some(path) => {
                let loaded = Self::load_file(path)?;
                debug!(path = %path.display(), "Loaded settings file");
                loaded.record_file_keys(path, &mut provenance);
                loaded
            }
            None => Self::default(),
        };

        settings.apply_env(env, &mut provenance);
        let errors = env.take_errors();
        if !errors.is_empty() {
            return Err(ConfigError::Env(errors));
        }
        settings.validate()?;
        Ok((settings, provenance))
    }

    fn record_file_keys(&self, path: &Path, provenance: &mut Provenance) {
        let defaults = Self::default();
        let source = ConfigSource::File(path.to_path_buf());
        let changed = [
            ("store.url", self.store.url != defaults.store.url),
            ("store.store_id", self.store.store_id != defaults.store.store_id),
            ("ppa.base_url", self.ppa.base_url != defaults.ppa.base_url),
            ("ppa.owner", self.ppa.owner != defaults.ppa.owner),
            ("poll.timeout_secs", self.poll.timeout_secs != defaults.poll.timeout_secs),
            ("poll.interval_secs", self.poll.interval_secs != defaults.poll.interval_secs),
            (
                "poll.request_timeout_secs",
                self.poll.request_timeout_secs != defaults.poll.request_timeout_secs,
            ),
        ];
        for (key, differs) in changed {
            if differs {
                provenance.insert(key, source.clone());
            }
        }
    }

    /// Overlay `PUBWATCH_*` variables. Invalid values stay in `env`'s
    /// error list.
    pub fn apply_env(&mut self, env: &mut EnvParser, provenance: &mut Provenance) {
        let mut set_string =
            |key: &'static str, var: &str, slot: &mut String, env: &mut EnvParser| {
                if let Some(value) = env.get_optional_string(var).value {
                    *slot = value;
                    provenance.insert(key, ConfigSource::Environment);
                }
            };
        set_string("store.url", "STORE_URL", &mut self.store.url, env);
        set_string("store.store_id", "STORE_ID", &mut self.store.store_id, env);
        set_string("ppa.base_url", "PPA_BASE_URL", &mut self.ppa.base_url, env);
        set_string("ppa.owner", "PPA_OWNER", &mut self.ppa.owner, env);

        let durations: [(&'static str, &str, &mut u64); 3] = [
            ("poll.timeout_secs", "TIMEOUT", &mut self.poll.timeout_secs),
            ("poll.interval_secs", "INTERVAL", &mut self.poll.interval_secs),
            (
                "poll.request_timeout_secs",
                "REQUEST_TIMEOUT",
                &mut self.poll.request_timeout_secs,
            ),
        ];
        for (key, var, slot) in durations {
            let max = Duration::from_secs(MAX_DURATION_SECS);
            let sourced = env.get_duration(var, Duration::from_secs(*slot), max);
            if !sourced.is_default() {
                *slot = sourced.value.as_secs();
                provenance.insert(key, ConfigSource::Environment);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::Invalid("poll.interval_secs must be greater than zero".into()));
        }
        if self.poll.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll.request_timeout_secs must be greater than zero".into(),
            ));
        }
        for (key, secs) in [
            ("poll.timeout_secs", self.poll.timeout_secs),
            ("poll.interval_secs", self.poll.interval_secs),
            ("poll.request_timeout_secs", self.poll.request_timeout_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be at most {MAX_DURATION_SECS} (7 days), got {secs}"
                )));
            }
        }
        for (key, url) in [("store.url", &self.store.url), ("ppa.base_url", &self.ppa.base_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.store.store_id.trim().is_empty() {
            return Err(ConfigError::Invalid("store.store_id must not be empty".into()));
        }
        if self.ppa.owner.trim().is_empty() {
            return Err(ConfigError::Invalid("ppa.owner must not be empty".into()));
        }
        Ok(())
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.poll.timeout_secs),
            Duration::from_secs(self.poll.interval_secs),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.request_timeout_secs)
    }
}
