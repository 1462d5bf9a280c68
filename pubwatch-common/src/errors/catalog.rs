//! Error catalog for pubwatch.
//!
//! Every failure the CLI can report maps to a stable `PW-Exxx` code with a
//! message and remediation steps.
//!
//! | Range      | Category     | Description                             |
//! |------------|--------------|-----------------------------------------|
//! | E001-E099  | Config       | Settings files and environment          |
//! | E100-E199  | Requirements | Requirements documents and channels     |
//! | E200-E299  | Store        | Snap store lookups                      |
//! | E300-E399  | Poll         | Outcome of a wait                       |

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Settings file not found
    ConfigNotFound,
    /// Settings file could not be read
    ConfigReadError,
    /// Settings file is not valid TOML
    ConfigParseError,
    /// Settings contain invalid values
    ConfigValidationError,
    /// Environment variable has an invalid value
    ConfigEnvError,

    // =========================================================================
    // Requirements Errors (E100-E199)
    // =========================================================================
    /// Requirements file could not be read
    RequirementsReadError,
    /// Requirements file is not valid YAML
    RequirementsYamlError,
    /// Requirements document has the wrong shape
    RequirementsSchemaError,
    /// Channel or snap specifier could not be parsed
    ChannelFormatError,
    /// Snap list for reconciliation is invalid
    SnapListError,

    // =========================================================================
    // Store Errors (E200-E299)
    // =========================================================================
    /// Store rejected the snap lookup
    StoreLookupFailed,
    /// Store response could not be decoded
    StoreInvalidResponse,
    /// Store could not be reached
    StoreUnreachable,
    /// Nothing is released to the requested channel
    StoreChannelEmpty,

    // =========================================================================
    // Poll Errors (E300-E399)
    // =========================================================================
    /// Deadline passed with artifacts still missing
    PollTimeout,
    /// Poll was cancelled
    PollCancelled,
    /// Poll stopped on a hard probe failure
    PollAborted,
}

impl ErrorCode {
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigNotFound => 1,
            Self::ConfigReadError => 2,
            Self::ConfigParseError => 3,
            Self::ConfigValidationError => 4,
            Self::ConfigEnvError => 5,

            Self::RequirementsReadError => 100,
            Self::RequirementsYamlError => 101,
            Self::RequirementsSchemaError => 102,
            Self::ChannelFormatError => 103,
            Self::SnapListError => 104,

            Self::StoreLookupFailed => 200,
            Self::StoreInvalidResponse => 201,
            Self::StoreUnreachable => 202,
            Self::StoreChannelEmpty => 203,

            Self::PollTimeout => 300,
            Self::PollCancelled => 301,
            Self::PollAborted => 302,
        }
    }

    /// Formatted code, e.g. `PW-E001`.
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("PW-E{:03}", self.code_number())
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Requirements,
            200..=299 => ErrorCategory::Store,
            _ => ErrorCategory::Poll,
        }
    }

    /// Process exit status the CLI uses for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::PollTimeout => 1,
            Self::PollCancelled => 130,
            Self::PollAborted
            | Self::StoreLookupFailed
            | Self::StoreInvalidResponse
            | Self::StoreUnreachable
            | Self::StoreChannelEmpty => 3,
            _ => 2,
        }
    }

    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigNotFound => "Settings file not found",
            Self::ConfigReadError => "Failed to read settings file",
            Self::ConfigParseError => "Settings file contains invalid TOML syntax",
            Self::ConfigValidationError => "Settings contain invalid values",
            Self::ConfigEnvError => "Environment variable has invalid value",

            Self::RequirementsReadError => "Failed to read requirements file",
            Self::RequirementsYamlError => "Requirements file is not valid YAML",
            Self::RequirementsSchemaError => {
                "Requirements document does not match the expected layout"
            }
            Self::ChannelFormatError => "Channel or snap specifier is malformed",
            Self::SnapListError => "Snap list is not a JSON array of {name, channel} objects",

            Self::StoreLookupFailed => "Snap store rejected the snap lookup",
            Self::StoreInvalidResponse => "Snap store returned an unreadable response",
            Self::StoreUnreachable => "Snap store could not be reached",
            Self::StoreChannelEmpty => "No release found in the requested channel",

            Self::PollTimeout => "Timed out waiting for artifacts to be published",
            Self::PollCancelled => "Wait was cancelled",
            Self::PollAborted => "Wait aborted on a store error",
        }
    }

    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigNotFound => &[
                "Check the path given with --config or PUBWATCH_CONFIG",
                "Omit --config to run with built-in defaults",
            ],
            Self::ConfigReadError => &["Check that the settings file is readable"],
            Self::ConfigParseError => &[
                "Fix the TOML syntax at the reported location",
                "Valid sections are [store], [ppa] and [poll]",
            ],
            Self::ConfigValidationError => &[
                "Poll interval and request timeout must be greater than zero",
                "Store and PPA URLs must start with http:// or https://",
            ],
            Self::ConfigEnvError => &[
                "Check PUBWATCH_* environment variables for typos",
                "Durations are whole seconds",
            ],

            Self::RequirementsReadError => &["Check the requirements file path and permissions"],
            Self::RequirementsYamlError => &["Fix the YAML syntax at the reported location"],
            Self::RequirementsSchemaError => &[
                "Fix the field named in the error",
                "Run `pubwatch matrix <version> <file>` to validate the document offline",
            ],
            Self::ChannelFormatError => &[
                "Channels look like `track/risk/branch`, e.g. `latest/edge`",
                "Risks are stable, candidate, beta and edge",
            ],
            Self::SnapListError => &[
                "Pass a JSON array such as [{\"name\": \"core22\", \"channel\": \"latest/stable\"}]",
            ],

            Self::StoreLookupFailed => &[
                "Check the snap name for typos",
                "Check --store-id when querying a brand store",
            ],
            Self::StoreInvalidResponse => &["Check --store-url points at a snap store API"],
            Self::StoreUnreachable => &[
                "Check network connectivity to the store",
                "Raise --request-timeout on slow links",
            ],
            Self::StoreChannelEmpty => &[
                "Check that the snap is released to this channel and architecture",
            ],

            Self::PollTimeout => &[
                "Inspect the unmet table for artifacts that never appeared",
                "Raise --timeout if builds are still running",
            ],
            Self::PollCancelled => &["Re-run the wait when ready"],
            Self::PollAborted => &[
                "Check the snap names in the requirements document",
                "Check --store-url and --store-id",
            ],
        }
    }

    #[must_use]
    pub fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigNotFound,
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::RequirementsReadError,
            Self::RequirementsYamlError,
            Self::RequirementsSchemaError,
            Self::ChannelFormatError,
            Self::SnapListError,
            Self::StoreLookupFailed,
            Self::StoreInvalidResponse,
            Self::StoreUnreachable,
            Self::StoreChannelEmpty,
            Self::PollTimeout,
            Self::PollCancelled,
            Self::PollAborted,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Settings and environment (E001-E099)
    Config,
    /// Requirements documents (E100-E199)
    Requirements,
    /// Snap store (E200-E299)
    Store,
    /// Wait outcome (E300-E399)
    Poll,
}

impl ErrorCategory {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Requirements => "Requirements",
            Self::Store => "Store",
            Self::Poll => "Poll",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Multi-line form with numbered remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);
        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }
        output
    }

    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            assert!(
                seen.insert(code.code_number()),
                "Duplicate error code number for {:?}",
                code
            );
        }
    }

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.code_string(), "PW-E001");
        assert_eq!(ErrorCode::RequirementsSchemaError.code_string(), "PW-E102");
        assert_eq!(ErrorCode::StoreLookupFailed.code_string(), "PW-E200");
        assert_eq!(ErrorCode::PollTimeout.code_string(), "PW-E300");
    }

    #[test]
    fn test_category_ranges() {
        for code in ErrorCode::all() {
            let num = code.code_number();
            let range = match code.category() {
                ErrorCategory::Config => 1..=99,
                ErrorCategory::Requirements => 100..=199,
                ErrorCategory::Store => 200..=299,
                ErrorCategory::Poll => 300..=399,
            };
            assert!(range.contains(&num), "{:?} outside its category range", code);
        }
    }

    #[test]
    fn test_all_errors_have_message_and_remediation() {
        for code in ErrorCode::all() {
            assert!(!code.message().is_empty(), "{:?} has empty message", code);
            assert!(!code.remediation().is_empty(), "{:?} has no remediation", code);
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorCode::PollTimeout.exit_code(), 1);
        assert_eq!(ErrorCode::RequirementsSchemaError.exit_code(), 2);
        assert_eq!(ErrorCode::ConfigValidationError.exit_code(), 2);
        assert_eq!(ErrorCode::ChannelFormatError.exit_code(), 2);
        assert_eq!(ErrorCode::PollAborted.exit_code(), 3);
        assert_eq!(ErrorCode::StoreLookupFailed.exit_code(), 3);
        assert_eq!(ErrorCode::PollCancelled.exit_code(), 130);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::PollTimeout).unwrap();
        assert_eq!(json, "\"POLL_TIMEOUT\"");
        let parsed: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ErrorCode::PollTimeout);
    }

    #[test]
    fn test_entry_serialization() {
        let json = serde_json::to_string(&ErrorCode::ConfigNotFound.entry()).unwrap();
        assert!(json.contains("PW-E001"));
        assert!(json.contains("\"config\""));
    }

    #[test]
    fn test_format_full_and_brief() {
        let entry = ErrorCode::PollTimeout.entry();
        let full = entry.format_full();
        assert!(full.starts_with("[PW-E300] Timed out waiting for artifacts to be published\n"));
        assert!(full.contains("Remediation steps:\n  1. "));
        assert_eq!(
            entry.format_brief(),
            "[PW-E300] Timed out waiting for artifacts to be published"
        );
        assert_eq!(entry.to_string(), entry.format_brief());
    }
}
