//! Snap channel model.
//!
//! A channel is a `track/risk/branch` coordinate in the snap store where
//! only one of `track` or `risk` is required. A leading bare risk word
//! (`stable`, `candidate`, `beta`, `edge`) is never a track: `stable` is
//! the risk `stable` on the default track and `stable/hotfix` is the
//! branch `hotfix` of that risk.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Canonical risk levels, most stable first.
pub const RISKS: [&str; 4] = ["stable", "candidate", "beta", "edge"];

/// Risk that untargeted snaps are moved back to.
pub const DEFAULT_RISK: &str = "stable";

/// Errors raised while parsing channel or specifier strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Cannot parse '{0}' as a snap channel")]
    Channel(String),

    #[error("Channel '{0}' sets neither a track nor a risk")]
    EmptyChannel(String),

    #[error("Cannot parse '{0}' as a snap specifier (expected name=channel)")]
    Specifier(String),
}

fn channel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:([\w.-]+)(?:/([\w-]+)(?:/([\w-]+))?)?)?$")
            .expect("channel pattern is a valid regex")
    })
}

fn specifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([\w-]+)=(.+)$").expect("specifier pattern is a valid regex")
    })
}

/// Whether `token` is one of the canonical risk levels.
pub fn is_risk(token: &str) -> bool {
    RISKS.contains(&token)
}

/// A parsed `track/risk/branch` channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel {
    track: Option<String>,
    risk: Option<String>,
    branch: Option<String>,
}

impl Channel {
    /// Build a channel from its components.
    ///
    /// Fails when neither `track` nor `risk` is set.
    pub fn new(
        track: Option<String>,
        risk: Option<String>,
        branch: Option<String>,
    ) -> Result<Self, FormatError> {
        let channel = Self {
            track: track.filter(|t| !t.is_empty()),
            risk: risk.filter(|r| !r.is_empty()),
            branch: branch.filter(|b| !b.is_empty()),
        };
        if channel.track.is_none() && channel.risk.is_none() {
            return Err(FormatError::EmptyChannel(channel.to_string()));
        }
        Ok(channel)
    }

    /// Risk-only channel on the default track (e.g. `edge`).
    pub fn risk_only(risk: impl Into<String>) -> Self {
        Self {
            track: None,
            risk: Some(risk.into()),
            branch: None,
        }
    }

    /// Parse a channel string.
    pub fn parse(input: &str) -> Result<Self, FormatError> {
        let captures = channel_pattern()
            .captures(input)
            .ok_or_else(|| FormatError::Channel(input.to_string()))?;

        let mut components: Vec<String> = captures
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect();

        // A bare risk in first position means the track was omitted.
        let track = if components.first().is_some_and(|first| is_risk(first)) {
            None
        } else if components.is_empty() {
            None
        } else {
            Some(components.remove(0))
        };

        if components.len() > 2 {
            return Err(FormatError::Channel(input.to_string()));
        }
        let mut rest = components.into_iter();
        let risk = rest.next();
        let branch = rest.next();

        if track.is_none() && risk.is_none() {
            return Err(FormatError::EmptyChannel(input.to_string()));
        }

        Ok(Self {
            track,
            risk,
            branch,
        })
    }

    pub fn track(&self) -> Option<&str> {
        self.track.as_deref()
    }

    pub fn risk(&self) -> Option<&str> {
        self.risk.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Copy of this channel with the risk forced to `stable`.
    #[must_use]
    pub fn stabilize(&self) -> Self {
        Self {
            risk: Some(DEFAULT_RISK.to_string()),
            ..self.clone()
        }
    }

    /// Whether both a track and a risk are present, so the channel can be
    /// compared component-wise against store entries.
    pub fn is_qualified(&self) -> bool {
        self.track.is_some() && self.risk.is_some()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = [&self.track, &self.risk, &self.branch]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("/");
        f.write_str(&joined)
    }
}

impl FromStr for Channel {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A `name=channel` pair naming a snap and the channel it should track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapSpecifier {
    pub name: String,
    pub channel: Channel,
}

impl SnapSpecifier {
    pub fn parse(input: &str) -> Result<Self, FormatError> {
        let captures = specifier_pattern()
            .captures(input)
            .ok_or_else(|| FormatError::Specifier(input.to_string()))?;
        let name = captures[1].to_string();
        let channel = Channel::parse(&captures[2])?;
        Ok(Self { name, channel })
    }
}

impl fmt::Display for SnapSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.channel)
    }
}

impl FromStr for SnapSpecifier {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
