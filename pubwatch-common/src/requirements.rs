//! Requirements documents and matrix expansion.
//!
//! A requirements document lists, per snap or package, the channels (or
//! Ubuntu releases) and architectures a release must reach. Expanding it
//! against a version string yields one [`ArtifactSpec`] per combination.
//!
//! ```yaml
//! required-snaps:
//!   - name: checkbox22
//!     channels: [latest/edge]
//!     architectures: [amd64, arm64]
//! required-packages:
//!   - channel: edge
//!     source: checkbox-ng
//!     package: checkbox-ng
//!     versions: ["22.04", "24.04"]
//!     architectures: [amd64, arm64]
//! ```
//!
//! The older archive-only layout with a top-level `channel` and a
//! `required-debs` list (`name`, `deb-name`, `versions`, `architectures`)
//! is accepted as well.
//!
//! Documents are validated field by field so a malformed entry is reported
//! with its exact location (e.g. `required-snaps[1].architectures`) before
//! any network activity starts.

use crate::channel::{Channel, FormatError};
use crate::spec::{ArtifactSpec, PackageSpec, SnapSpec};
use serde_yaml_ng::{Mapping, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const SNAPS_KEY: &str = "required-snaps";
const PACKAGES_KEY: &str = "required-packages";
const LEGACY_DEBS_KEY: &str = "required-debs";
const LEGACY_CHANNEL_KEY: &str = "channel";

/// A requirements document that is structurally invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("requirements document must be a mapping at the top level")]
    NotAMapping,

    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` must be {expected}")]
    WrongType { field: String, expected: &'static str },
}

/// Errors raised while loading or expanding requirements.
#[derive(Debug, Error)]
pub enum RequirementsError {
    #[error("failed to read requirements file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("requirements document is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid channel in `{field}`: {source}")]
    Channel {
        field: String,
        #[source]
        source: FormatError,
    },
}

/// Snap requirement entry: one name, published to several channels and
/// architectures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapRequirement {
    pub name: String,
    pub channels: Vec<Channel>,
    pub architectures: Vec<String>,
}

/// Package requirement entry: one binary package of one source, built for
/// several Ubuntu releases and architectures into one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequirement {
    pub ppa: String,
    pub source: String,
    pub package: String,
    pub ubuntu_versions: Vec<String>,
    pub architectures: Vec<String>,
}

/// Parsed requirements document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub snaps: Vec<SnapRequirement>,
    pub packages: Vec<PackageRequirement>,
}

impl Requirements {
    /// Load and validate a requirements document from disk.
    pub fn load(path: &Path) -> Result<Self, RequirementsError> {
        let content = std::fs::read_to_string(path).map_err(|source| RequirementsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let requirements = Self::from_yaml_str(&content)?;
        debug!(
            path = %path.display(),
            snaps = requirements.snaps.len(),
            packages = requirements.packages.len(),
            "Loaded requirements document"
        );
        Ok(requirements)
    }

    /// Parse and validate a requirements document.
    pub fn from_yaml_str(content: &str) -> Result<Self, RequirementsError> {
        let document: Value = serde_yaml_ng::from_str(content)?;
        Self::from_value(&document)
    }

    pub fn from_value(document: &Value) -> Result<Self, RequirementsError> {
        // An empty file parses as null and requires nothing.
        if document.is_null() {
            return Ok(Self::default());
        }
        let root = document.as_mapping().ok_or(SchemaError::NotAMapping)?;

        let mut requirements = Self::default();

        for (index, entry) in optional_sequence(root, SNAPS_KEY)?.iter().enumerate() {
            requirements
                .snaps
                .push(parse_snap_entry(entry, &format!("{SNAPS_KEY}[{index}]"))?);
        }

        for (index, entry) in optional_sequence(root, PACKAGES_KEY)?.iter().enumerate() {
            requirements
                .packages
                .push(parse_package_entry(entry, &format!("{PACKAGES_KEY}[{index}]"))?);
        }

        let legacy = optional_sequence(root, LEGACY_DEBS_KEY)?;
        if !legacy.is_empty() {
            let ppa = required_string(root, LEGACY_CHANNEL_KEY, LEGACY_CHANNEL_KEY)?;
            for (index, entry) in legacy.iter().enumerate() {
                requirements.packages.push(parse_legacy_deb_entry(
                    entry,
                    &ppa,
                    &format!("{LEGACY_DEBS_KEY}[{index}]"),
                )?);
            }
        }

        Ok(requirements)
    }

    /// Expand snap requirements for `version`.
    pub fn snap_specs(&self, version: &str) -> Vec<SnapSpec> {
        self.snaps
            .iter()
            .flat_map(|snap| {
                snap.channels.iter().flat_map(move |channel| {
                    snap.architectures.iter().map(move |arch| {
                        SnapSpec::new(snap.name.clone(), version, channel.clone(), arch.clone())
                    })
                })
            })
            .collect()
    }

    /// Expand package requirements for `version`, sorted.
    ///
    /// Archive versions use `~` where upstream versions use `-`, so
    /// `3.3.0-dev10` is looked up as `3.3.0~dev10`.
    pub fn package_specs(&self, version: &str) -> Vec<PackageSpec> {
        let archive_version = debian_version(version);
        let mut specs: Vec<PackageSpec> = self
            .packages
            .iter()
            .flat_map(|package| {
                let archive_version = &archive_version;
                package.ubuntu_versions.iter().flat_map(move |ubuntu_version| {
                    package.architectures.iter().map(move |arch| PackageSpec {
                        ppa: package.ppa.clone(),
                        source: package.source.clone(),
                        package: package.package.clone(),
                        version: archive_version.clone(),
                        ubuntu_version: ubuntu_version.clone(),
                        architecture: arch.clone(),
                    })
                })
            })
            .collect();
        specs.sort();
        specs
    }

    /// Expand every requirement: snaps first, then packages.
    pub fn artifact_specs(&self, version: &str) -> Vec<ArtifactSpec> {
        self.snap_specs(version)
            .into_iter()
            .map(ArtifactSpec::from)
            .chain(self.package_specs(version).into_iter().map(ArtifactSpec::from))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.snaps.is_empty() && self.packages.is_empty()
    }
}

/// Convert an upstream version to its archive form.
pub fn debian_version(version: &str) -> String {
    version.replace('-', "~")
}

fn parse_snap_entry(entry: &Value, path: &str) -> Result<SnapRequirement, RequirementsError> {
    let map = entry_mapping(entry, path)?;
    let name = required_string(map, "name", &format!("{path}.name"))?;

    let channels_path = format!("{path}.channels");
    let channels = required_string_list(map, "channels", &channels_path)?
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            Channel::parse(&raw).map_err(|source| RequirementsError::Channel {
                field: format!("{channels_path}[{index}]"),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let architectures =
        required_string_list(map, "architectures", &format!("{path}.architectures"))?;

    Ok(SnapRequirement {
        name,
        channels,
        architectures,
    })
}

fn parse_package_entry(
    entry: &Value,
    path: &str,
) -> Result<PackageRequirement, RequirementsError> {
    let map = entry_mapping(entry, path)?;
    Ok(PackageRequirement {
        ppa: required_string(map, "channel", &format!("{path}.channel"))?,
        source: required_string(map, "source", &format!("{path}.source"))?,
        package: required_string(map, "package", &format!("{path}.package"))?,
        ubuntu_versions: required_string_list(map, "versions", &format!("{path}.versions"))?,
        architectures: required_string_list(
            map,
            "architectures",
            &format!("{path}.architectures"),
        )?,
    })
}

fn parse_legacy_deb_entry(
    entry: &Value,
    ppa: &str,
    path: &str,
) -> Result<PackageRequirement, RequirementsError> {
    let map = entry_mapping(entry, path)?;
    Ok(PackageRequirement {
        ppa: ppa.to_string(),
        source: required_string(map, "name", &format!("{path}.name"))?,
        package: required_string(map, "deb-name", &format!("{path}.deb-name"))?,
        ubuntu_versions: required_string_list(map, "versions", &format!("{path}.versions"))?,
        architectures: required_string_list(
            map,
            "architectures",
            &format!("{path}.architectures"),
        )?,
    })
}

fn entry_mapping<'a>(entry: &'a Value, path: &str) -> Result<&'a Mapping, SchemaError> {
    entry.as_mapping().ok_or_else(|| SchemaError::WrongType {
        field: path.to_string(),
        expected: "a mapping",
    })
}

fn optional_sequence<'a>(root: &'a Mapping, key: &str) -> Result<&'a [Value], SchemaError> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Sequence(items)) => Ok(items.as_slice()),
        Some(_) => Err(SchemaError::WrongType {
            field: key.to_string(),
            expected: "a list",
        }),
    }
}

fn required_string(map: &Mapping, key: &str, path: &str) -> Result<String, SchemaError> {
    let value = map.get(key).ok_or_else(|| SchemaError::MissingField {
        field: path.to_string(),
    })?;
    scalar_string(value, path)
}

fn required_string_list(map: &Mapping, key: &str, path: &str) -> Result<Vec<String>, SchemaError> {
    let value = map.get(key).ok_or_else(|| SchemaError::MissingField {
        field: path.to_string(),
    })?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| scalar_string(item, &format!("{path}[{index}]")))
            .collect(),
        _ => Err(SchemaError::WrongType {
            field: path.to_string(),
            expected: "a list",
        }),
    }
}

/// Accept strings, and numbers for fields like `versions: [22.04]` that
/// YAML reads as floats.
fn scalar_string(value: &Value, path: &str) -> Result<String, SchemaError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => {
            let rendered = n.to_string();
            warn!(
                field = path,
                value = %rendered,
                "Numeric value in requirements document; quote it to avoid float rounding"
            );
            Ok(rendered)
        }
        _ => Err(SchemaError::WrongType {
            field: path.to_string(),
            expected: "a non-empty string",
        }),
    }
}
