//! gauss-ctl - Lifecycle commands for openGauss clusters on Kubernetes.
//!
//! Each invocation runs exactly one command against one cluster and exits
//! with its outcome.
//!
//! # Usage
//!
//! ```bash
//! # Provision a cluster from a topology document
//! gauss-ctl create-db-instance -file /path/to/orders.json
//!
//! # Stop and start it again
//! gauss-ctl stop-db-instance -instance orders
//! gauss-ctl start-db-instance -instance orders
//!
//! # Provision two tenants on its primary
//! gauss-ctl --config /etc/gauss/ctl.toml add-database -instance orders -dbnames sales,billing
//! ```
//!
//! Command parameters keep the single-dash `-flag value` form.
//!
//! # Exit codes
//!
//! - `0`: the command succeeded
//! - `1`: the command failed, or the invocation was invalid
//! - `2`: the Kubernetes API kept failing and the command was abandoned

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{CtlConfig, KubernetesConfig};
use gauss_core::{ParamMap, Verb};
use gauss_orchestrator::{
    CommandReport, InvocationContext, KubeControlPlane, KubeExecTransport, Orchestrator,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_FATAL: u8 = 2;

/// CLI arguments for gauss-ctl.
#[derive(Parser, Debug)]
#[command(
    name = "gauss-ctl",
    about = "Provision, start, stop and delete openGauss clusters on Kubernetes",
    version,
    arg_required_else_help = true
)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Namespace of the database workloads.
    #[arg(long, value_name = "NAMESPACE")]
    namespace: Option<String>,

    /// Kubeconfig file.
    #[arg(long, value_name = "FILE")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context.
    #[arg(long, value_name = "NAME")]
    context: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable JSON log output.
    #[arg(long)]
    json_logs: bool,

    /// Print the default configuration and exit.
    #[arg(long)]
    print_config: bool,

    #[command(subcommand)]
    command: Option<VerbCommand>,
}

/// The lifecycle commands.
#[derive(Subcommand, Debug)]
enum VerbCommand {
    /// Provision a cluster from a topology document (-file).
    #[command(name = "create-db-instance")]
    CreateDbInstance(LegacyParams),

    /// Delete a cluster and its member data (-instance).
    #[command(name = "delete-db-instance")]
    DeleteDbInstance(LegacyParams),

    /// Provision tenants on the primary (-instance, -dbnames).
    #[command(name = "add-database")]
    AddDatabase(LegacyParams),

    /// Remove tenants from the primary (-instance, -dbnames).
    #[command(name = "remove-database")]
    RemoveDatabase(LegacyParams),

    /// Start a stopped cluster (-instance, optional -file).
    #[command(name = "start-db-instance")]
    StartDbInstance(LegacyParams),

    /// Stop every member of a cluster (-instance).
    #[command(name = "stop-db-instance")]
    StopDbInstance(LegacyParams),
}

/// `-flag value` pairs.
#[derive(Args, Debug)]
struct LegacyParams {
    /// Command parameters, e.g. `-instance orders`.
    #[arg(value_name = "PARAMS", trailing_var_arg = true, allow_hyphen_values = true)]
    params: Vec<String>,
}

impl VerbCommand {
    fn into_parts(self) -> (Verb, ParamMap) {
        let (verb, raw) = match self {
            Self::CreateDbInstance(p) => (Verb::CreateInstance, p),
            Self::DeleteDbInstance(p) => (Verb::DeleteInstance, p),
            Self::AddDatabase(p) => (Verb::AddDatabase, p),
            Self::RemoveDatabase(p) => (Verb::RemoveDatabase, p),
            Self::StartDbInstance(p) => (Verb::StartInstance, p),
            Self::StopDbInstance(p) => (Verb::StopInstance, p),
        };
        (verb, ParamMap::from_args(raw.params))
    }
}

fn init_tracing(config: &config::LoggingConfig, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Failed to parse log filter")?;

    let format = if json_logs || config.format == "json" {
        "json"
    } else {
        &config.format
    };

    match format {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "compact" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

/// Builds a Kubernetes client from the configured kubeconfig, or from the
/// environment when that file does not exist.
async fn kube_client(config: &KubernetesConfig) -> Result<kube::Client> {
    let client_config = if config.kubeconfig.exists() {
        debug!(kubeconfig = %config.kubeconfig.display(), "Loading kubeconfig");
        let kubeconfig = Kubeconfig::read_from(&config.kubeconfig)
            .with_context(|| format!("Failed to read kubeconfig {:?}", config.kubeconfig))?;
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..Default::default()
        };
        kube::Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .context("Invalid kubeconfig")?
    } else {
        debug!(kubeconfig = %config.kubeconfig.display(), "Kubeconfig not found, inferring configuration");
        kube::Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?
    };
    kube::Client::try_from(client_config).context("Failed to create Kubernetes client")
}

/// Maps a report to the process exit code.
fn exit_code(report: &CommandReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else if report.is_fatal() {
        ExitCode::from(EXIT_FATAL)
    } else {
        ExitCode::FAILURE
    }
}

async fn run(args: CliArgs) -> Result<ExitCode> {
    if args.print_config {
        println!("{}", toml::to_string_pretty(&CtlConfig::default())?);
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = if let Some(ref config_path) = args.config {
        CtlConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        CtlConfig::default()
    };
    config.merge_cli_args(&args);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging, args.json_logs)?;

    let Some(command) = args.command else {
        anyhow::bail!("No command given");
    };
    let (verb, params) = command.into_parts();

    let context = InvocationContext::detect().context("Refusing to run")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        verb = %verb,
        user = %context.user(),
        namespace = %config.kubernetes.namespace,
        "gauss-ctl starting"
    );

    let client = kube_client(&config.kubernetes).await?;
    let orchestrator = Orchestrator::new(
        Arc::new(KubeControlPlane::new(client.clone())),
        Arc::new(KubeExecTransport::new(client)),
        config.orchestrator_settings(),
        context,
    );

    let report = orchestrator.execute(verb, &params).await;
    if report.is_success() {
        info!(steps = report.trail.len(), state = %report.state, "{}", report);
    } else {
        error!(steps = report.trail.len(), state = %report.state, fatal = report.is_fatal(), "{}", report);
    }
    println!("{}", report);
    Ok(exit_code(&report))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("gauss-ctl: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
