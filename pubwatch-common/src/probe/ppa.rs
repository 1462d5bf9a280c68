//! Package archive prober.

use super::transport::{HttpTransport, UreqTransport};
use super::{ProbeError, Prober};
use crate::spec::PackageSpec;
use tracing::{debug, warn};

/// Default archive host.
pub const DEFAULT_PPA_BASE_URL: &str = "http://ppa.launchpad.net";

/// Default archive owner.
pub const DEFAULT_PPA_OWNER: &str = "checkbox-dev";

/// Pool URL of the `.deb` described by `spec`.
///
/// `{base}/{owner}/{ppa}/ubuntu/pool/main/{initial}/{source}/{package}_{version}~ubuntu{release}.1_{arch}.deb`
pub fn pool_url(base_url: &str, owner: &str, spec: &PackageSpec) -> String {
    let initial = spec
        .source
        .chars()
        .next()
        .map(|c| c.to_string())
        .unwrap_or_default();
    format!(
        "{}/{}/{}/ubuntu/pool/main/{}/{}/{}",
        base_url.trim_end_matches('/'),
        owner,
        spec.ppa,
        initial,
        spec.source,
        spec.deb_filename()
    )
}

/// Checks package presence with a `HEAD` request on the pool file.
pub struct PpaProber<T = UreqTransport> {
    transport: T,
    base_url: String,
    owner: String,
}

impl<T: HttpTransport> PpaProber<T> {
    pub fn new(transport: T, base_url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            owner: owner.into(),
        }
    }

    pub fn url_for(&self, spec: &PackageSpec) -> String {
        pool_url(&self.base_url, &self.owner, spec)
    }
}

impl<T: HttpTransport> Prober<PackageSpec> for PpaProber<T> {
    /// Never fails: only HTTP 200 counts as published.
    fn is_available(&self, spec: &PackageSpec) -> Result<bool, ProbeError> {
        let url = self.url_for(spec);
        match self.transport.head(&url) {
            Ok(200) => {
                debug!(url = %url, "Package published");
                Ok(true)
            }
            Ok(status) => {
                debug!(url = %url, status, "Package not published yet");
                Ok(false)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to connect to the archive");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn spec() -> PackageSpec {
        PackageSpec {
            ppa: "edge".into(),
            source: "checkbox-ng".into(),
            package: "checkbox-ng".into(),
            version: "3.3.0~dev10".into(),
            ubuntu_version: "22.04".into(),
            architecture: "amd64".into(),
        }
    }

    const URL: &str = "http://ppa.launchpad.net/checkbox-dev/edge/ubuntu/pool/main/c/checkbox-ng/checkbox-ng_3.3.0~dev10~ubuntu22.04.1_amd64.deb";

    #[test]
    fn test_pool_url() {
        assert_eq!(pool_url(DEFAULT_PPA_BASE_URL, DEFAULT_PPA_OWNER, &spec()), URL);
        assert_eq!(
            pool_url("http://ppa.launchpad.net/", DEFAULT_PPA_OWNER, &spec()),
            URL
        );
    }

    #[test]
    fn test_pool_url_uses_source_initial() {
        let mut other = spec();
        other.source = "python-foo".into();
        other.package = "python3-foo".into();
        let url = pool_url("https://example.test", "team", &other);
        assert!(url.starts_with("https://example.test/team/edge/ubuntu/pool/main/p/python-foo/"));
        assert!(url.ends_with("python3-foo_3.3.0~dev10~ubuntu22.04.1_amd64.deb"));
    }

    #[test]
    fn test_available_on_200() {
        let transport = MockTransport::new().with_head(URL, 200);
        let prober = PpaProber::new(&transport, DEFAULT_PPA_BASE_URL, DEFAULT_PPA_OWNER);
        assert!(prober.is_available(&spec()).unwrap());
        assert_eq!(transport.requests(), vec![format!("HEAD {URL}")]);
    }

    #[test]
    fn test_not_available_on_other_status() {
        for status in [404, 403, 500, 301] {
            let transport = MockTransport::new().with_head(URL, status);
            let prober = PpaProber::new(&transport, DEFAULT_PPA_BASE_URL, DEFAULT_PPA_OWNER);
            assert!(!prober.is_available(&spec()).unwrap(), "status {status}");
        }
    }

    #[test]
    fn test_connection_failure_is_soft() {
        let transport = MockTransport::new();
        let prober = PpaProber::new(&transport, DEFAULT_PPA_BASE_URL, DEFAULT_PPA_OWNER);
        assert_eq!(prober.is_available(&spec()), Ok(false));
    }
}
