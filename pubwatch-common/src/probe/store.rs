//! Snap store prober.
//!
//! Uses the `v2/snaps/info/{name}` endpoint, whose `channel-map` lists
//! every (channel, architecture) pair the snap is currently released to.

use super::transport::{HttpTransport, TransportError, UreqTransport};
use super::{ProbeError, Prober};
use crate::channel::Channel;
use crate::spec::SnapSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default store API root.
pub const DEFAULT_STORE_URL: &str = "https://api.snapcraft.io";

/// Default value of the `Snap-Device-Store` header.
pub const DEFAULT_STORE_ID: &str = "ubuntu";

const DEVICE_SERIES: &str = "16";

/// Response of the info endpoint, reduced to the fields we use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "snap-id", default)]
    pub snap_id: Option<String>,
    #[serde(rename = "default-track", default)]
    pub default_track: Option<String>,
    #[serde(rename = "channel-map", default)]
    pub channel_map: Vec<ChannelMapEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapEntry {
    pub channel: StoreChannel,
    pub version: String,
    #[serde(default)]
    pub revision: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChannel {
    pub name: String,
    pub track: String,
    pub risk: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub architecture: String,
}

/// Whether a store channel is the channel that was asked for.
///
/// Channels with both a track and a risk compare component-wise (branch
/// included). Anything shorter (`edge`, `latest`, `beta/hotfix`) compares
/// against the store's flat channel name.
///
/// The branch takes part in the comparison, unlike a plain `(track, risk)`
/// pair match: a release to `latest/edge/fix` does not satisfy a request
/// for `latest/edge`, since branch builds are not the channel's release.
pub fn channel_matches(wanted: &Channel, store: &StoreChannel) -> bool {
    match (wanted.track(), wanted.risk()) {
        (Some(track), Some(risk)) => {
            store.track == track && store.risk == risk && wanted.branch() == store.branch.as_deref()
        }
        _ => store.name == wanted.to_string(),
    }
}

/// Whether one channel-map entry satisfies `spec`.
pub fn entry_matches(spec: &SnapSpec, entry: &ChannelMapEntry) -> bool {
    entry.version == spec.version
        && entry.channel.architecture == spec.architecture
        && channel_matches(&spec.channel, &entry.channel)
}

impl SnapInfo {
    pub fn contains(&self, spec: &SnapSpec) -> bool {
        self.channel_map.iter().any(|entry| entry_matches(spec, entry))
    }

    /// Entry currently released to `channel`, optionally restricted to one
    /// architecture.
    pub fn release_in(
        &self,
        channel: &Channel,
        architecture: Option<&str>,
    ) -> Option<&ChannelMapEntry> {
        self.channel_map.iter().find(|entry| {
            channel_matches(channel, &entry.channel)
                && architecture.is_none_or(|arch| entry.channel.architecture == arch)
        })
    }
}

/// Info lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InfoError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Checks snap availability against the store's channel map.
pub struct StoreProber<T = UreqTransport> {
    transport: T,
    store_url: String,
    store_id: String,
}

impl<T: HttpTransport> StoreProber<T> {
    pub fn new(transport: T, store_url: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            transport,
            store_url: store_url.into(),
            store_id: store_id.into(),
        }
    }

    pub fn info_url(&self, name: &str) -> String {
        format!(
            "{}/v2/snaps/info/{}",
            self.store_url.trim_end_matches('/'),
            name
        )
    }

    /// Fetch the info document of one snap.
    pub fn fetch_info(&self, name: &str) -> Result<SnapInfo, InfoError> {
        let url = self.info_url(name);
        let headers = [
            ("Snap-Device-Series", DEVICE_SERIES),
            ("Snap-Device-Store", self.store_id.as_str()),
        ];
        let response = self.transport.get(&url, &headers)?;
        if !response.is_ok() {
            return Err(ProbeError::Remote {
                name: name.to_string(),
                status: response.status,
            }
            .into());
        }
        serde_json::from_str(&response.body).map_err(|e| {
            ProbeError::InvalidResponse {
                name: name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl<T: HttpTransport> Prober<SnapSpec> for StoreProber<T> {
    fn is_available(&self, spec: &SnapSpec) -> Result<bool, ProbeError> {
        match self.fetch_info(&spec.name) {
            Ok(info) => {
                let found = info.contains(spec);
                debug!(
                    snap = %spec.name,
                    channel = %spec.channel,
                    architecture = %spec.architecture,
                    version = %spec.version,
                    entries = info.channel_map.len(),
                    found,
                    "Queried snap store"
                );
                Ok(found)
            }
            Err(InfoError::Transport(e)) => {
                warn!(snap = %spec.name, error = %e, "Error while querying the snap store");
                Ok(false)
            }
            Err(InfoError::Probe(e)) => Err(e),
        }
    }
}
