//! Error catalog and classification.
//!
//! Library errors are plain `thiserror` enums. [`classify`] maps any of
//! them to a catalog entry so the CLI can print remediation steps and pick
//! an exit status.

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::channel::FormatError;
use crate::config::{ConfigError, EnvError};
use crate::poll::PollError;
use crate::probe::{InfoError, ProbeError};
use crate::reconcile::ReconcileError;
use crate::requirements::RequirementsError;
use crate::spec::ArtifactSpec;

/// Errors that know their catalog code.
pub trait Cataloged {
    fn error_code(&self) -> ErrorCode;
}

impl Cataloged for FormatError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::ChannelFormatError
    }
}

impl Cataloged for RequirementsError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::RequirementsReadError,
            Self::Yaml(_) => ErrorCode::RequirementsYamlError,
            Self::Schema(_) => ErrorCode::RequirementsSchemaError,
            Self::Channel { .. } => ErrorCode::ChannelFormatError,
        }
    }
}

impl Cataloged for ProbeError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Remote { .. } => ErrorCode::StoreLookupFailed,
            Self::InvalidResponse { .. } => ErrorCode::StoreInvalidResponse,
        }
    }
}

impl Cataloged for InfoError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::StoreUnreachable,
            Self::Probe(e) => e.error_code(),
        }
    }
}

impl<S> Cataloged for PollError<S> {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Timeout(_) => ErrorCode::PollTimeout,
            Self::Remote(_) => ErrorCode::PollAborted,
            Self::Cancelled { .. } => ErrorCode::PollCancelled,
        }
    }
}

impl Cataloged for ReconcileError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } | Self::Json { .. } => ErrorCode::SnapListError,
            Self::Channel { .. } => ErrorCode::ChannelFormatError,
        }
    }
}

impl Cataloged for ConfigError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::ConfigNotFound,
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Invalid(_) => ErrorCode::ConfigValidationError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
        }
    }
}

impl Cataloged for EnvError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::ConfigEnvError
    }
}

/// Catalog code of the first cataloged error in `err`'s source chain.
pub fn classify(err: &(dyn std::error::Error + 'static)) -> Option<ErrorCode> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(code) = code_of(e) {
            return Some(code);
        }
        current = e.source();
    }
    None
}

fn code_of(e: &(dyn std::error::Error + 'static)) -> Option<ErrorCode> {
    if let Some(e) = e.downcast_ref::<PollError<ArtifactSpec>>() {
        return Some(e.error_code());
    }
    if let Some(e) = e.downcast_ref::<RequirementsError>() {
        return Some(e.error_code());
    }
    if let Some(e) = e.downcast_ref::<ConfigError>() {
        return Some(e.error_code());
    }
    if let Some(e) = e.downcast_ref::<EnvError>() {
        return Some(e.error_code());
    }
    if let Some(e) = e.downcast_ref::<ReconcileError>() {
        return Some(e.error_code());
    }
    if let Some(e) = e.downcast_ref::<InfoError>() {
        return Some(e.error_code());
    }
    if let Some(e) = e.downcast_ref::<ProbeError>() {
        return Some(e.error_code());
    }
    if let Some(e) = e.downcast_ref::<FormatError>() {
        return Some(e.error_code());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::SchemaError;

    #[test]
    fn test_classify_direct() {
        let err = RequirementsError::Schema(SchemaError::NotAMapping);
        assert_eq!(classify(&err), Some(ErrorCode::RequirementsSchemaError));
    }

    #[test]
    fn test_classify_follows_source_chain() {
        // Channel errors inside a requirements error stop at the outer error.
        let err = RequirementsError::Channel {
            field: "required-snaps[0].channels[0]".into(),
            source: FormatError::Channel("a/b/c/d".into()),
        };
        assert_eq!(classify(&err), Some(ErrorCode::ChannelFormatError));

        let poll: PollError<ArtifactSpec> = PollError::Remote(ProbeError::Remote {
            name: "x".into(),
            status: 404,
        });
        assert_eq!(classify(&poll), Some(ErrorCode::PollAborted));
    }

    #[test]
    fn test_classify_unknown() {
        let err = std::io::Error::other("boom");
        assert_eq!(classify(&err), None);
    }
}
