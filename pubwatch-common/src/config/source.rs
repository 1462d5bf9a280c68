//! Where a setting's value came from.

use std::fmt;
use std::path::PathBuf;

/// Origin of a resolved setting, lowest precedence first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    File(PathBuf),
    Environment,
    CommandLine,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Environment => write!(f, "environment"),
            Self::CommandLine => write!(f, "command line"),
        }
    }
}

/// A value tagged with its [`ConfigSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    /// Variable name when the value came from the environment.
    pub env_var: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            env_var: None,
        }
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            env_var: Some(var.into()),
        }
    }

    pub fn is_default(&self) -> bool {
        self.source == ConfigSource::Default
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            value: f(self.value),
            source: self.source,
            env_var: self.env_var,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sourced_constructors() {
        let d = Sourced::default_value(3);
        assert!(d.is_default());
        assert!(d.env_var.is_none());

        let e = Sourced::from_env("x", "PUBWATCH_X");
        assert_eq!(e.source, ConfigSource::Environment);
        assert_eq!(e.env_var.as_deref(), Some("PUBWATCH_X"));
        assert_eq!(e.map(str::len).value, 1);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(ConfigSource::Default.to_string(), "default");
        assert_eq!(
            ConfigSource::File(PathBuf::from("/etc/pubwatch.toml")).to_string(),
            "file /etc/pubwatch.toml"
        );
        assert_eq!(ConfigSource::CommandLine.to_string(), "command line");
    }
}
