//! Requirements files on disk expanded into artifact matrices.

mod common;

use common::{RELEASE_REQUIREMENTS, init_test_logging, write_requirements};
use pubwatch_common::requirements::{RequirementsError, SchemaError};
use pubwatch_common::{ArtifactKind, ArtifactSpec, Channel, ErrorCode, Requirements, classify};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Expansion
// ============================================================================

#[test]
fn test_single_channel_two_architectures() {
    init_test_logging();
    let file = write_requirements(
        "required-snaps:\n  - name: pkg1\n    channels: [edge]\n    architectures: [amd64, arm64]\n",
    );
    let specs = Requirements::load(file.path()).unwrap().snap_specs("1.0");

    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].name, "pkg1");
    assert_eq!(specs[0].version, "1.0");
    assert_eq!(specs[0].channel, Channel::risk_only("edge"));
    assert_eq!(specs[0].channel, specs[1].channel);
    let arches: HashSet<_> = specs.iter().map(|s| s.architecture.as_str()).collect();
    assert_eq!(arches, HashSet::from(["amd64", "arm64"]));
}

#[test]
fn test_cardinality_is_sum_of_products() {
    init_test_logging();
    let file = write_requirements(
        r#"
required-snaps:
  - name: one
    channels: [latest/edge, latest/beta, 22/stable]
    architectures: [amd64, arm64]
  - name: two
    channels: [edge]
    architectures: [amd64, arm64, riscv64, s390x]
required-packages:
  - channel: edge
    source: src
    package: bin
    versions: ["20.04", "22.04", "24.04"]
    architectures: [amd64, arm64]
"#,
    );
    let requirements = Requirements::load(file.path()).unwrap();
    let specs = requirements.artifact_specs("2.0");

    assert_eq!(specs.len(), 3 * 2 + 4 + 3 * 2);
    let unique: HashSet<&ArtifactSpec> = specs.iter().collect();
    assert_eq!(unique.len(), specs.len());
    assert_eq!(
        specs.iter().filter(|s| s.kind() == ArtifactKind::Snap).count(),
        10
    );
}

#[test]
fn test_expansion_is_deterministic() {
    init_test_logging();
    let file = write_requirements(RELEASE_REQUIREMENTS);
    let first = Requirements::load(file.path()).unwrap().artifact_specs("1.0");
    let second = Requirements::load(file.path()).unwrap().artifact_specs("1.0");
    assert_eq!(first, second);
}

#[test]
fn test_legacy_layout_from_file() {
    init_test_logging();
    let file = write_requirements(
        r#"
channel: beta
required-debs:
  - name: checkbox-ng
    deb-name: python3-checkbox-ng
    versions: ["22.04", "24.04"]
    architectures: [amd64]
"#,
    );
    let specs = Requirements::load(file.path()).unwrap().package_specs("4.0.0-dev1");

    assert_eq!(specs.len(), 2);
    assert!(specs.iter().all(|s| s.ppa == "beta" && s.version == "4.0.0~dev1"));
    assert_eq!(
        specs[1].deb_filename(),
        "python3-checkbox-ng_4.0.0~dev1~ubuntu24.04.1_amd64.deb"
    );
}

#[test]
fn test_empty_file_requires_nothing() {
    init_test_logging();
    let file = write_requirements("");
    let requirements = Requirements::load(file.path()).unwrap();
    assert!(requirements.is_empty());
    assert!(requirements.artifact_specs("1.0").is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_file() {
    init_test_logging();
    let err = Requirements::load(Path::new("/nonexistent/pubwatch/reqs.yaml")).unwrap_err();
    assert!(matches!(err, RequirementsError::Io { .. }));
    assert_eq!(classify(&err), Some(ErrorCode::RequirementsReadError));
}

#[test]
fn test_schema_error_names_the_field() {
    init_test_logging();
    let file = write_requirements(
        "required-snaps:\n  - name: ok\n    channels: [edge]\n    architectures: [amd64]\n  - name: bad\n    channels: [edge]\n",
    );
    let err = Requirements::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        RequirementsError::Schema(SchemaError::MissingField { ref field })
            if field == "required-snaps[1].architectures"
    ));
    assert_eq!(classify(&err), Some(ErrorCode::RequirementsSchemaError));
}

#[test]
fn test_bad_channel_is_reported_with_location() {
    init_test_logging();
    let file = write_requirements(
        "required-snaps:\n  - name: a\n    channels: [latest/edge, a/b/c/d]\n    architectures: [amd64]\n",
    );
    let err = Requirements::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        RequirementsError::Channel { ref field, .. } if field == "required-snaps[0].channels[1]"
    ));
    assert_eq!(classify(&err), Some(ErrorCode::ChannelFormatError));
}

#[test]
fn test_invalid_yaml() {
    init_test_logging();
    let file = write_requirements("required-snaps: [unclosed\n");
    let err = Requirements::load(file.path()).unwrap_err();
    assert!(matches!(err, RequirementsError::Yaml(_)));
    assert_eq!(classify(&err), Some(ErrorCode::RequirementsYamlError));
}
