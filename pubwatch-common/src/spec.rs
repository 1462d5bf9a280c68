//! Concrete artifact specifications.
//!
//! Each value identifies exactly one artifact that is expected to be
//! published. Specs are plain values with structural equality so they can
//! key the polling state directly.

use crate::channel::Channel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One snap revision expected in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapSpec {
    pub name: String,
    pub version: String,
    pub channel: Channel,
    pub architecture: String,
}

impl SnapSpec {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        channel: Channel,
        architecture: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            channel,
            architecture: architecture.into(),
        }
    }
}

impl fmt::Display for SnapSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on channel '{}' for '{}'",
            self.name, self.version, self.channel, self.architecture
        )
    }
}

/// One `.deb` expected in a PPA pool.
///
/// `ppa` is the archive name, which follows the snap risk the packages
/// were built for (e.g. `edge`, `beta`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageSpec {
    pub ppa: String,
    pub source: String,
    pub package: String,
    pub version: String,
    pub ubuntu_version: String,
    pub architecture: String,
}

impl PackageSpec {
    /// Debian file name of the package in the pool.
    pub fn deb_filename(&self) -> String {
        format!(
            "{}_{}~ubuntu{}.1_{}.deb",
            self.package, self.version, self.ubuntu_version, self.architecture
        )
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} in ppa '{}' for ubuntu {} on '{}'",
            self.package, self.version, self.ppa, self.ubuntu_version, self.architecture
        )
    }
}

/// Any artifact the poller can wait for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSpec {
    Snap(SnapSpec),
    Package(PackageSpec),
}

impl ArtifactSpec {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Snap(_) => ArtifactKind::Snap,
            Self::Package(_) => ArtifactKind::Package,
        }
    }

    pub fn as_snap(&self) -> Option<&SnapSpec> {
        match self {
            Self::Snap(spec) => Some(spec),
            Self::Package(_) => None,
        }
    }

    pub fn as_package(&self) -> Option<&PackageSpec> {
        match self {
            Self::Package(spec) => Some(spec),
            Self::Snap(_) => None,
        }
    }
}

impl From<SnapSpec> for ArtifactSpec {
    fn from(spec: SnapSpec) -> Self {
        Self::Snap(spec)
    }
}

impl From<PackageSpec> for ArtifactSpec {
    fn from(spec: PackageSpec) -> Self {
        Self::Package(spec)
    }
}

impl fmt::Display for ArtifactSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snap(spec) => write!(f, "snap {spec}"),
            Self::Package(spec) => write!(f, "package {spec}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Snap,
    Package,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snap => write!(f, "snap"),
            Self::Package => write!(f, "package"),
        }
    }
}
