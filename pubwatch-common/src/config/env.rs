//! Environment variable parsing with type safety.
//!
//! [`EnvParser`] reads `PUBWATCH_*` variables, collects every invalid value
//! instead of stopping at the first, and tags results with their source.

use super::source::Sourced;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Prefix shared by every pubwatch variable.
pub const ENV_PREFIX: &str = "PUBWATCH_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Invalid duration for {var}: {value}")]
    InvalidDuration { var: String, value: String },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

/// Type-safe environment variable parser.
pub struct EnvParser {
    prefix: &'static str,
    lookup: Lookup,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Parser over the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Parser over an arbitrary variable source.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        Self {
            prefix: ENV_PREFIX,
            lookup: Box::new(lookup),
            errors: Vec::new(),
        }
    }

    /// Parser over a fixed list of `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: std::collections::HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_lookup(move |name| vars.get(name).cloned())
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn raw(&self, var_name: &str) -> Option<String> {
        (self.lookup)(var_name)
    }

    /// Unset and empty both mean "not configured".
    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        let var_name = self.var_name(name);
        match self.raw(&var_name) {
            Some(value) if value.is_empty() => Sourced::from_env(None, var_name),
            Some(value) => Sourced::from_env(Some(value), var_name),
            None => Sourced::default_value(None),
        }
    }

    /// Path value with `~/` expansion.
    pub fn get_optional_path(&mut self, name: &str) -> Sourced<Option<PathBuf>> {
        self.get_optional_string(name).map(|value| {
            value.map(|v| match v.strip_prefix("~/") {
                Some(rest) => dirs::home_dir()
                    .map(|home| home.join(rest))
                    .unwrap_or_else(|| PathBuf::from(&v)),
                None => PathBuf::from(v),
            })
        })
    }

    pub fn get_u64_range(&mut self, name: &str, default: u64, min: u64, max: u64) -> Sourced<u64> {
        let var_name = self.var_name(name);
        match self.raw(&var_name) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(n) if n >= min && n <= max => Sourced::from_env(n, var_name),
                Ok(n) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: var_name.clone(),
                        value: n.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                    Sourced::from_env(default, var_name)
                }
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name.clone(),
                        expected: "unsigned 64-bit integer".to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            None => Sourced::default_value(default),
        }
    }

    /// Duration given as whole seconds (`300`) or in humantime form (`5m`),
    /// capped at `max`.
    pub fn get_duration(
        &mut self,
        name: &str,
        default: Duration,
        max: Duration,
    ) -> Sourced<Duration> {
        let var_name = self.var_name(name);
        let Some(value) = self.raw(&var_name) else {
            return Sourced::default_value(default);
        };
        let trimmed = value.trim();
        let parsed = trimmed
            .parse::<u64>()
            .map(Duration::from_secs)
            .or_else(|_| humantime::parse_duration(trimmed));
        match parsed {
            Ok(duration) if duration <= max => Sourced::from_env(duration, var_name),
            Ok(duration) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name.clone(),
                    value: humantime::format_duration(duration).to_string(),
                    min: "0s".to_string(),
                    max: humantime::format_duration(max).to_string(),
                });
                Sourced::default_value(default)
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidDuration {
                    var: var_name.clone(),
                    value,
                });
                Sourced::default_value(default)
            }
        }
    }

    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match self.raw(&var_name) {
            Some(value) => {
                let lower = value.to_lowercase();
                match lower.as_str() {
                    "trace" | "debug" | "info" | "warn" | "error" | "off" => {
                        Sourced::from_env(lower, var_name)
                    }
                    _ => {
                        self.errors.push(EnvError::InvalidLogLevel {
                            var: var_name.clone(),
                            value,
                        });
                        Sourced::from_env(default.to_string(), var_name)
                    }
                }
            }
            None => Sourced::default_value(default.to_string()),
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;

    // ==========================================================================
    // Strings and paths
    // ==========================================================================

    #[test]
    fn test_optional_string() {
        let mut parser = EnvParser::from_pairs([("PUBWATCH_A", "x"), ("PUBWATCH_EMPTY", "")]);
        assert_eq!(parser.get_optional_string("A").value.as_deref(), Some("x"));
        let empty = parser.get_optional_string("EMPTY");
        assert!(empty.value.is_none());
        assert_eq!(empty.source, ConfigSource::Environment);
        assert!(parser.get_optional_string("MISSING").is_default());
    }

    #[test]
    fn test_optional_path_expands_home() {
        let mut parser =
            EnvParser::from_pairs([("PUBWATCH_DIR", "~/logs"), ("PUBWATCH_ABS", "/var/log")]);
        let dir = parser.get_optional_path("DIR").value.unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(dir, home.join("logs"));
        }
        assert_eq!(
            parser.get_optional_path("ABS").value,
            Some(PathBuf::from("/var/log"))
        );
    }

    // ==========================================================================
    // Numbers and durations
    // ==========================================================================

    #[test]
    fn test_u64_range() {
        let mut parser = EnvParser::from_pairs([
            ("PUBWATCH_OK", "50"),
            ("PUBWATCH_BIG", "200"),
            ("PUBWATCH_BAD", "lots"),
        ]);
        assert_eq!(parser.get_u64_range("OK", 10, 0, 100).value, 50);
        assert!(!parser.has_errors());

        assert_eq!(parser.get_u64_range("BIG", 10, 0, 100).value, 10);
        assert_eq!(parser.get_u64_range("BAD", 10, 0, 100).value, 10);
        let errors = parser.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], EnvError::OutOfRange { .. }));
        assert!(matches!(errors[1], EnvError::InvalidValue { .. }));
        assert!(!parser.has_errors());
    }

    #[test]
    fn test_duration_forms() {
        let mut parser = EnvParser::from_pairs([
            ("PUBWATCH_SECS", "300"),
            ("PUBWATCH_HUMAN", "2m 30s"),
            ("PUBWATCH_BAD", "soon"),
        ]);
        let default = Duration::from_secs(1);
        let max = Duration::from_secs(3600);
        assert_eq!(parser.get_duration("SECS", default, max).value, Duration::from_secs(300));
        assert_eq!(parser.get_duration("HUMAN", default, max).value, Duration::from_secs(150));
        assert_eq!(parser.get_duration("BAD", default, max).value, default);
        assert_eq!(
            parser.errors(),
            &[EnvError::InvalidDuration {
                var: "PUBWATCH_BAD".into(),
                value: "soon".into()
            }]
        );
    }

    #[test]
    fn test_duration_above_max() {
        let mut parser = EnvParser::from_pairs([("PUBWATCH_LONG", "2h")]);
        let got = parser.get_duration("LONG", Duration::from_secs(5), Duration::from_secs(3600));
        assert!(got.is_default());
        assert!(matches!(parser.errors(), [EnvError::OutOfRange { .. }]));
    }

    // ==========================================================================
    // Log level
    // ==========================================================================

    #[test]
    fn test_log_level() {
        let mut parser = EnvParser::from_pairs([("PUBWATCH_LOG_LEVEL", "DEBUG")]);
        let level = parser.get_log_level("LOG_LEVEL", "info");
        assert_eq!(level.value, "debug");
        assert_eq!(level.env_var.as_deref(), Some("PUBWATCH_LOG_LEVEL"));

        let mut parser = EnvParser::from_pairs([("PUBWATCH_LOG_LEVEL", "verbose")]);
        assert_eq!(parser.get_log_level("LOG_LEVEL", "info").value, "info");
        assert!(parser.has_errors());
    }
}
