//! Subcommand implementations.

use crate::output::TableObserver;
use crate::{MatrixFormat, StoreArgs, WaitArgs};
use anyhow::{Context, Result};
use pubwatch_common::config::{ConfigSource, EnvParser, Provenance, Settings};
use pubwatch_common::probe::{ArtifactProber, PpaProber, StoreProber, UreqTransport};
use pubwatch_common::reconcile::{self, SnapInstaller};
use pubwatch_common::report::matrix_table;
use pubwatch_common::{
    ArtifactKind, ArtifactSpec, Channel, ErrorCode, PollError, Poller, Requirements, SnapSpecifier,
};
use serde_json::json;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Failures detected by the CLI itself rather than the library.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no release of '{snap}' found in channel '{channel}'{}", arch_suffix(.architecture))]
    NoRelease {
        snap: String,
        channel: String,
        architecture: Option<String>,
    },
}

fn arch_suffix(architecture: &Option<String>) -> String {
    architecture
        .as_deref()
        .map(|arch| format!(" for '{arch}'"))
        .unwrap_or_default()
}

impl CommandError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NoRelease { .. } => ErrorCode::StoreChannelEmpty,
        }
    }
}

fn load_settings(config: Option<&Path>) -> Result<(Settings, Provenance)> {
    let mut env = EnvParser::new();
    Ok(Settings::resolve(config, &mut env)?)
}

/// Overlay command-line flags, the highest-precedence layer.
fn apply_store_flags(settings: &mut Settings, provenance: &mut Provenance, store: &StoreArgs) {
    if let Some(url) = &store.store_url {
        settings.store.url = url.clone();
        provenance.insert("store.url", ConfigSource::CommandLine);
    }
    if let Some(id) = &store.store_id {
        settings.store.store_id = id.clone();
        provenance.insert("store.store_id", ConfigSource::CommandLine);
    }
}

fn apply_request_timeout(settings: &mut Settings, provenance: &mut Provenance, secs: Option<u64>) {
    if let Some(secs) = secs {
        settings.poll.request_timeout_secs = secs;
        provenance.insert("poll.request_timeout_secs", ConfigSource::CommandLine);
    }
}

fn apply_wait_flags(settings: &mut Settings, provenance: &mut Provenance, args: &WaitArgs) {
    apply_store_flags(settings, provenance, &args.store);
    apply_request_timeout(settings, provenance, args.request_timeout);
    if let Some(secs) = args.timeout {
        settings.poll.timeout_secs = secs;
        provenance.insert("poll.timeout_secs", ConfigSource::CommandLine);
    }
    if let Some(secs) = args.interval {
        settings.poll.interval_secs = secs;
        provenance.insert("poll.interval_secs", ConfigSource::CommandLine);
    }
    if let Some(url) = &args.ppa_base_url {
        settings.ppa.base_url = url.clone();
        provenance.insert("ppa.base_url", ConfigSource::CommandLine);
    }
    if let Some(owner) = &args.ppa_owner {
        settings.ppa.owner = owner.clone();
        provenance.insert("ppa.owner", ConfigSource::CommandLine);
    }
}

fn log_provenance(provenance: &Provenance) {
    for (key, source) in provenance {
        debug!(key, source = %source, "Setting overridden");
    }
}

/// Keep only the artifact kinds the caller asked for.
fn select_kinds(specs: &mut Vec<ArtifactSpec>, snaps_only: bool, packages_only: bool) {
    if snaps_only {
        specs.retain(|spec| spec.kind() == ArtifactKind::Snap);
    } else if packages_only {
        specs.retain(|spec| spec.kind() == ArtifactKind::Package);
    }
}

pub fn wait(args: &WaitArgs, config: Option<&Path>) -> Result<()> {
    let (mut settings, mut provenance) = load_settings(config)?;
    apply_wait_flags(&mut settings, &mut provenance, args);
    settings.validate()?;
    log_provenance(&provenance);

    let requirements = Requirements::load(&args.requirements)?;
    let mut specs = requirements.artifact_specs(&args.version);
    select_kinds(&mut specs, args.snaps_only, args.packages_only);
    info!(
        version = %args.version,
        requirements = %args.requirements.display(),
        specs = specs.len(),
        "Expanded requirement matrix"
    );

    let transport = UreqTransport::new(settings.request_timeout());
    let prober = ArtifactProber::new(
        StoreProber::new(transport.clone(), &settings.store.url, &settings.store.store_id),
        PpaProber::new(transport, &settings.ppa.base_url, &settings.ppa.owner),
    );
    let observer = TableObserver::stdout();
    let poller = Poller::new(prober, settings.poll_config()).with_observer(&observer);

    match poller.await_all(&specs) {
        Ok(report) => {
            observer.satisfied(specs.len(), &report);
            Ok(())
        }
        Err(PollError::Timeout(timeout)) => {
            observer.timed_out(&timeout);
            Err(PollError::Timeout(timeout).into())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn matrix(version: &str, requirements: &Path, format: MatrixFormat) -> Result<()> {
    let specs = Requirements::load(requirements)?.artifact_specs(version);
    match format {
        MatrixFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&specs).context("serializing matrix")?)
        }
        MatrixFormat::Table => print!("{}", matrix_table(&specs)),
    }
    Ok(())
}

fn describe_channel(input: &str) -> Result<serde_json::Value> {
    if input.contains('=') {
        let specifier = SnapSpecifier::parse(input)?;
        let mut value = describe(&specifier.channel);
        value["input"] = json!(input);
        value["name"] = json!(specifier.name);
        return Ok(value);
    }
    let channel = Channel::parse(input)?;
    let mut value = describe(&channel);
    value["input"] = json!(input);
    Ok(value)
}

fn describe(channel: &Channel) -> serde_json::Value {
    json!({
        "channel": channel.to_string(),
        "track": channel.track(),
        "risk": channel.risk(),
        "branch": channel.branch(),
    })
}

pub fn channel(inputs: &[String]) -> Result<()> {
    let described = inputs
        .iter()
        .map(|input| describe_channel(input))
        .collect::<Result<Vec<_>>>()?;
    let output = if described.len() == 1 {
        serde_json::to_string_pretty(&described[0])
    } else {
        serde_json::to_string_pretty(&described)
    };
    println!("{}", output.context("serializing channels")?);
    Ok(())
}

pub fn store_version(
    snap: &str,
    channel: &str,
    architecture: Option<&str>,
    store: &StoreArgs,
    request_timeout: Option<u64>,
    config: Option<&Path>,
) -> Result<()> {
    let channel = Channel::parse(channel)?;
    let (mut settings, mut provenance) = load_settings(config)?;
    apply_store_flags(&mut settings, &mut provenance, store);
    apply_request_timeout(&mut settings, &mut provenance, request_timeout);
    settings.validate()?;
    log_provenance(&provenance);

    let prober = StoreProber::new(
        UreqTransport::new(settings.request_timeout()),
        &settings.store.url,
        &settings.store.store_id,
    );
    let info = prober.fetch_info(snap)?;
    let entry = info
        .release_in(&channel, architecture)
        .ok_or_else(|| CommandError::NoRelease {
            snap: snap.to_string(),
            channel: channel.to_string(),
            architecture: architecture.map(str::to_string),
        })?;
    println!("{}", entry.version);
    Ok(())
}

pub fn reconcile(active: &Path, targets: &Path, as_json: bool) -> Result<()> {
    let active = reconcile::load_entries(active)?;
    let targets = reconcile::load_entries(targets)?;
    let actions = SnapInstaller::new(&targets)?.plan(&active)?;
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&actions).context("serializing actions")?
        );
    } else {
        for action in &actions {
            println!("{action}");
        }
    }
    Ok(())
}
