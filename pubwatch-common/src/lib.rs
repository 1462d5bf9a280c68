//! Shared library for pubwatch.
//!
//! - [`channel`]: snap channel parsing and rendering
//! - [`requirements`]: requirements documents and matrix expansion
//! - [`probe`]: store and archive availability checks
//! - [`poll`]: the retry loop that waits for every artifact
//! - [`reconcile`]: snap install/refresh planning

pub mod channel;
pub mod config;
pub mod errors;
pub mod logging;
pub mod poll;
pub mod probe;
pub mod reconcile;
pub mod report;
pub mod requirements;
pub mod spec;
pub mod testing;

pub use channel::{Channel, FormatError, SnapSpecifier};
pub use config::{ConfigError, EnvParser, Settings};
pub use errors::{Cataloged, ErrorCode, ErrorEntry, classify};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use poll::{
    CancelToken, Clock, PollConfig, PollError, PollObserver, PollReport, PollTimeoutError, Poller,
    SystemClock, await_all,
};
pub use probe::{ArtifactProber, PpaProber, ProbeError, Prober, StoreProber, UreqTransport};
pub use reconcile::{SnapAction, SnapEntry, SnapInstaller};
pub use requirements::{Requirements, RequirementsError, SchemaError};
pub use spec::{ArtifactKind, ArtifactSpec, PackageSpec, SnapSpec};
