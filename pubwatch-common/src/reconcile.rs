//! Snap install/refresh planning.
//!
//! Given the snaps installed on a device and the snaps a test run needs,
//! [`SnapInstaller::plan`] lists the `snap` actions that bring the device
//! to the target state. Installed snaps nobody asked for go back to the
//! stable risk of their track.

use crate::channel::{Channel, DEFAULT_RISK, FormatError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to read snap list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snap list {path} is not a JSON array of {{name, channel}} objects: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid channel for snap '{snap}': {source}")]
    Channel {
        snap: String,
        #[source]
        source: FormatError,
    },
}

/// One element of an installed or target snap list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl SnapEntry {
    pub fn new(name: impl Into<String>, channel: Option<&str>) -> Self {
        Self {
            name: name.into(),
            channel: channel.map(str::to_string),
        }
    }
}

/// Read a JSON snap list from disk.
pub fn load_entries(path: &Path) -> Result<Vec<SnapEntry>, ReconcileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReconcileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Install,
    Refresh,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// A single `snap` command. Renders as `install|refresh <snap> [channel]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapAction {
    pub action: ActionKind,
    pub snap: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

impl SnapAction {
    /// Action for one snap given its target channel and, when installed,
    /// its active channel.
    ///
    /// Whether a snap is installed is decided by its presence in the active
    /// list, not by its channel: an installed snap with no recorded channel
    /// is refreshed to `target`, never installed a second time.
    fn decide(snap: &str, target: Option<&Channel>, installed: Option<Option<&Channel>>) -> Self {
        let (action, channel) = match installed {
            None => (ActionKind::Install, target.cloned()),
            Some(active) if active != target => (ActionKind::Refresh, target.cloned()),
            Some(_) => (ActionKind::Refresh, None),
        };
        Self {
            action,
            snap: snap.to_string(),
            channel,
        }
    }
}

impl fmt::Display for SnapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.snap)?;
        if let Some(channel) = &self.channel {
            write!(f, " {channel}")?;
        }
        Ok(())
    }
}

/// Ordered `name -> channel` index. A repeated name keeps its first
/// position and its last channel.
#[derive(Debug, Clone, Default)]
struct SnapIndex {
    order: Vec<String>,
    channels: HashMap<String, Option<Channel>>,
}

impl SnapIndex {
    fn build(entries: &[SnapEntry]) -> Result<Self, ReconcileError> {
        let mut index = Self::default();
        for entry in entries {
            let channel = match entry.channel.as_deref() {
                None | Some("") => None,
                Some(raw) => Some(Channel::parse(raw).map_err(|source| ReconcileError::Channel {
                    snap: entry.name.clone(),
                    source,
                })?),
            };
            if !index.channels.contains_key(&entry.name) {
                index.order.push(entry.name.clone());
            }
            index.channels.insert(entry.name.clone(), channel);
        }
        Ok(index)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, Option<&Channel>)> {
        self.order.iter().map(|name| {
            let channel = self.channels.get(name).and_then(Option::as_ref);
            (name.as_str(), channel)
        })
    }

    fn get(&self, name: &str) -> Option<Option<&Channel>> {
        self.channels.get(name).map(Option::as_ref)
    }

    fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }
}

/// Plans actions towards a fixed set of target snaps.
#[derive(Debug, Clone)]
pub struct SnapInstaller {
    targets: SnapIndex,
}

impl SnapInstaller {
    pub fn new(targets: &[SnapEntry]) -> Result<Self, ReconcileError> {
        Ok(Self {
            targets: SnapIndex::build(targets)?,
        })
    }

    /// Actions for a device whose installed snaps are `active`.
    ///
    /// Untargeted snaps come first, then every target in input order.
    pub fn plan(&self, active: &[SnapEntry]) -> Result<Vec<SnapAction>, ReconcileError> {
        let active = SnapIndex::build(active)?;
        let mut actions = Vec::new();

        for (snap, channel) in active.iter() {
            if self.targets.contains(snap) {
                continue;
            }
            let stable = match channel {
                Some(channel) => channel.stabilize(),
                None => Channel::risk_only(DEFAULT_RISK),
            };
            actions.push(SnapAction::decide(snap, Some(&stable), Some(channel)));
        }

        for (snap, target) in self.targets.iter() {
            actions.push(SnapAction::decide(snap, target, active.get(snap)));
        }

        debug!(
            installed = active.order.len(),
            targets = self.targets.order.len(),
            actions = actions.len(),
            "Planned snap actions"
        );
        Ok(actions)
    }
}
