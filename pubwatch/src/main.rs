//! pubwatch: wait for a release to show up in the snap store and PPAs.

#![forbid(unsafe_code)]

mod commands;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pubwatch_common::{ErrorCode, LogConfig, LogFormat, classify, init_logging};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "pubwatch")]
#[command(author, version, about = "Wait until a release is published to the snap store and PPAs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format on stderr
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatArg,

    /// Settings file (TOML); defaults to PUBWATCH_CONFIG or the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll until every artifact in a requirements file is published
    Wait(WaitArgs),

    /// Print the artifacts a requirements file expands to, without polling
    Matrix {
        /// Version to expand the matrix for
        version: String,

        /// Requirements file (YAML)
        requirements: PathBuf,

        #[arg(long, value_enum, default_value = "table")]
        format: MatrixFormat,
    },

    /// Parse channels (or name=channel specifiers) and print their components
    Channel {
        #[arg(required = true)]
        channels: Vec<String>,
    },

    /// Print the version currently released to a store channel
    StoreVersion {
        snap: String,

        channel: String,

        /// Restrict to one architecture
        #[arg(long)]
        arch: Option<String>,

        #[command(flatten)]
        store: StoreArgs,

        /// Per-request timeout in seconds
        #[arg(long)]
        request_timeout: Option<u64>,
    },

    /// Plan snap install/refresh actions towards a target list
    Reconcile {
        /// JSON list of installed snaps ([{"name", "channel"}])
        active: PathBuf,

        /// JSON list of target snaps ([{"name", "channel"?}])
        targets: PathBuf,

        /// Print actions as a JSON array
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct WaitArgs {
    /// Version every artifact must carry
    version: String,

    /// Requirements file (YAML)
    requirements: PathBuf,

    /// Give up after this many seconds [default: 300]
    #[arg(long)]
    timeout: Option<u64>,

    /// Seconds between rounds [default: 30]
    #[arg(long)]
    interval: Option<u64>,

    /// Per-request timeout in seconds [default: 10]
    #[arg(long)]
    request_timeout: Option<u64>,

    #[command(flatten)]
    store: StoreArgs,

    /// Archive host [default: http://ppa.launchpad.net]
    #[arg(long)]
    ppa_base_url: Option<String>,

    /// Archive owner [default: checkbox-dev]
    #[arg(long)]
    ppa_owner: Option<String>,

    /// Only wait for snaps
    #[arg(long, conflicts_with = "packages_only")]
    snaps_only: bool,

    /// Only wait for packages
    #[arg(long)]
    packages_only: bool,
}

#[derive(Args)]
struct StoreArgs {
    /// Snap store API root [default: https://api.snapcraft.io]
    #[arg(long)]
    store_url: Option<String>,

    /// Snap-Device-Store header value [default: ubuntu]
    #[arg(long)]
    store_id: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum MatrixFormat {
    Json,
    Table,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info")
        .with_stderr()
        .with_format(cli.log_format.into());
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => Some(guards),
        Err(e) => {
            eprintln!("pubwatch: logging disabled: {e}");
            None
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Wait(args) => commands::wait(&args, config),
        Commands::Matrix {
            version,
            requirements,
            format,
        } => commands::matrix(&version, &requirements, format),
        Commands::Channel { channels } => commands::channel(&channels),
        Commands::StoreVersion {
            snap,
            channel,
            arch,
            store,
            request_timeout,
        } => commands::store_version(
            &snap,
            &channel,
            arch.as_deref(),
            &store,
            request_timeout,
            config,
        ),
        Commands::Reconcile {
            active,
            targets,
            json,
        } => commands::reconcile(&active, &targets, json),
    }
}

/// Catalog code for a failure, if it has one.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    if let Some(e) = err.downcast_ref::<commands::CommandError>() {
        return Some(e.error_code());
    }
    classify(err.as_ref())
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    debug!(error = ?err, "Command failed");
    eprintln!("Error: {err:#}");
    match error_code(err) {
        Some(code) => {
            eprintln!();
            eprint!("{}", code.entry().format_full());
            ExitCode::from(code.exit_code())
        }
        None => ExitCode::from(2),
    }
}
