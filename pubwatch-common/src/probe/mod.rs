//! Availability probers.
//!
//! A prober answers one question for one spec: is it published yet?
//!
//! - [`PpaProber`] checks package files with `HEAD` against the archive pool.
//!   Every failure is soft: the package is simply "not there yet".
//! - [`StoreProber`] queries the snap store info endpoint and matches the
//!   channel map. An unknown snap name is a hard [`ProbeError::Remote`].
//! - [`ArtifactProber`] dispatches [`ArtifactSpec`]s to the right strategy.

pub mod ppa;
pub mod store;
pub mod transport;

pub use ppa::{DEFAULT_PPA_BASE_URL, DEFAULT_PPA_OWNER, PpaProber, pool_url};
pub use store::{
    ChannelMapEntry, DEFAULT_STORE_ID, DEFAULT_STORE_URL, InfoError, SnapInfo, StoreChannel,
    StoreProber, channel_matches, entry_matches,
};
pub use transport::{
    DEFAULT_REQUEST_TIMEOUT, HttpResponse, HttpTransport, TransportError, UreqTransport,
};

use crate::spec::{ArtifactSpec, PackageSpec, SnapSpec};
use thiserror::Error;

/// Hard probe failures. These abort the whole poll because they point at a
/// configuration mistake rather than a publication delay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("store lookup for snap '{name}' failed with HTTP {status}")]
    Remote { name: String, status: u16 },

    #[error("store returned an unreadable response for snap '{name}': {reason}")]
    InvalidResponse { name: String, reason: String },
}

/// Single availability check for one spec.
pub trait Prober<S: ?Sized> {
    /// `Ok(false)` covers both "not published yet" and transient failures.
    fn is_available(&self, spec: &S) -> Result<bool, ProbeError>;
}

impl<S: ?Sized, P: Prober<S> + ?Sized> Prober<S> for &P {
    fn is_available(&self, spec: &S) -> Result<bool, ProbeError> {
        (**self).is_available(spec)
    }
}

/// Routes snaps to one prober and packages to another.
pub struct ArtifactProber<SP, PP> {
    snaps: SP,
    packages: PP,
}

impl<SP, PP> ArtifactProber<SP, PP>
where
    SP: Prober<SnapSpec>,
    PP: Prober<PackageSpec>,
{
    pub fn new(snaps: SP, packages: PP) -> Self {
        Self { snaps, packages }
    }
}

impl<SP, PP> Prober<ArtifactSpec> for ArtifactProber<SP, PP>
where
    SP: Prober<SnapSpec>,
    PP: Prober<PackageSpec>,
{
    fn is_available(&self, spec: &ArtifactSpec) -> Result<bool, ProbeError> {
        match spec {
            ArtifactSpec::Snap(snap) => self.snaps.is_available(snap),
            ArtifactSpec::Package(package) => self.packages.is_available(package),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recording {
        seen: RefCell<Vec<String>>,
    }

    impl Prober<SnapSpec> for Recording {
        fn is_available(&self, spec: &SnapSpec) -> Result<bool, ProbeError> {
            self.seen.borrow_mut().push(format!("snap:{}", spec.name));
            Ok(true)
        }
    }

    impl Prober<PackageSpec> for Recording {
        fn is_available(&self, spec: &PackageSpec) -> Result<bool, ProbeError> {
            self.seen.borrow_mut().push(format!("package:{}", spec.package));
            Ok(false)
        }
    }

    #[test]
    fn test_artifact_prober_dispatches_by_kind() {
        let snaps = Recording::default();
        let packages = Recording::default();
        let prober = ArtifactProber::new(&snaps, &packages);

        let snap = ArtifactSpec::from(SnapSpec::new(
            "checkbox",
            "1.0",
            Channel::risk_only("edge"),
            "amd64",
        ));
        let package = ArtifactSpec::from(PackageSpec {
            ppa: "edge".into(),
            source: "checkbox-ng".into(),
            package: "checkbox-ng".into(),
            version: "1.0".into(),
            ubuntu_version: "24.04".into(),
            architecture: "amd64".into(),
        });

        assert!(prober.is_available(&snap).unwrap());
        assert!(!prober.is_available(&package).unwrap());
        assert_eq!(*snaps.seen.borrow(), vec!["snap:checkbox".to_string()]);
        assert_eq!(*packages.seen.borrow(), vec!["package:checkbox-ng".to_string()]);
    }

    #[test]
    fn test_probe_error_messages() {
        let err = ProbeError::Remote {
            name: "no-such-snap".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "store lookup for snap 'no-such-snap' failed with HTTP 404"
        );
    }
}
