//! # Command Line Interface
//!
//! `credflow run` provisions a tenant's dynamic credentials and performs one
//! compute-instance stop with them. `credflow check` only verifies that the
//! broker is reachable and unsealed.

pub mod output;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::action::{ActionInvoker, ActionRequest};
use crate::config::AppConfig;
use crate::material::{load_credentials, load_role_spec};
use crate::observability::{init_logging, log_config_info};
use crate::secrets::{SecretsBroker, TenantId, VaultBroker};
use crate::workflow::{MountConflictPolicy, Workflow, WorkflowInputs};

/// Exit code of a run that failed inside the workflow.
pub const EXIT_WORKFLOW_FAILED: u8 = 1;
/// Exit code for unusable configuration or material.
pub const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "credflow")]
#[command(about = "Provision ephemeral cloud credentials from Vault and use them once")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "CREDFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mount, configure, declare a role, wait for a token and stop an instance
    Run(RunArgs),

    /// Check that the broker is reachable and unsealed
    Check,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Tenant identifier (the cloud project the mount is created for)
    #[arg(long)]
    pub tenant: String,

    /// Root credential file (service-account key) for the secrets engine
    #[arg(long)]
    pub credentials: PathBuf,

    /// JSON role definition document
    #[arg(long)]
    pub role_spec: PathBuf,

    /// Role name to declare and mint tokens from
    #[arg(long)]
    pub role_name: Option<String>,

    /// Project owning the instance (defaults to the tenant identifier)
    #[arg(long)]
    pub project: Option<String>,

    /// Zone of the instance
    #[arg(long)]
    pub zone: Option<String>,

    /// Instance to stop
    #[arg(long)]
    pub instance: Option<String>,

    /// Compute API base URL
    #[arg(long)]
    pub action_url: Option<String>,

    /// Seconds to wait for the token
    #[arg(long)]
    pub token_timeout: Option<u64>,

    /// Milliseconds between token reads
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Fail instead of reusing an existing mount
    #[arg(long)]
    pub abort_on_existing_mount: bool,
}

impl RunArgs {
    /// Applies flags on top of file and environment configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(role_name) = &self.role_name {
            config.workflow.role_name = role_name.clone();
        }
        if let Some(project) = &self.project {
            config.action.project = Some(project.clone());
        }
        if let Some(zone) = &self.zone {
            config.action.zone = Some(zone.clone());
        }
        if let Some(instance) = &self.instance {
            config.action.instance = Some(instance.clone());
        }
        if let Some(url) = &self.action_url {
            config.action.compute_base_url = url.clone();
        }
        if let Some(timeout) = self.token_timeout {
            config.token.timeout_secs = timeout;
        }
        if let Some(interval) = self.poll_interval_ms {
            config.token.poll_interval_ms = interval;
        }
        if self.abort_on_existing_mount {
            config.workflow.on_existing_mount = MountConflictPolicy::Abort;
        }
    }
}

/// Resolves configuration for `cli`: defaults, file, environment, flags.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Commands::Run(args) = &cli.command {
        args.apply(&mut config);
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Builds the downstream request from the action section.
pub fn build_action(config: &AppConfig, tenant: &TenantId) -> anyhow::Result<ActionRequest> {
    let project = config.action.project.clone().unwrap_or_else(|| tenant.to_string());
    let Some(zone) = config.action.zone.as_deref() else {
        bail!("No zone configured: pass --zone or set CREDFLOW_ZONE");
    };
    let Some(instance) = config.action.instance.as_deref() else {
        bail!("No instance configured: pass --instance or set CREDFLOW_INSTANCE");
    };

    ActionRequest::compute_instance_stop(&config.action.compute_base_url, &project, zone, instance)
        .context("Invalid compute action")
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    init_logging(&config.logging)?;
    log_config_info(&config);

    match &cli.command {
        Commands::Run(args) => run_workflow(args, &config, cli.json).await,
        Commands::Check => check_broker(&config).await,
    }
}

async fn run_workflow(args: &RunArgs, config: &AppConfig, json: bool) -> anyhow::Result<ExitCode> {
    let tenant = TenantId::new(args.tenant.clone()).context("Invalid tenant identifier")?;
    let credentials = load_credentials(&args.credentials)?;
    let role_spec = load_role_spec(&args.role_spec)?;
    let action = build_action(config, &tenant)?;

    let broker = Arc::new(VaultBroker::new(config.vault_config()).context("Invalid broker settings")?);
    let invoker = ActionInvoker::new(config.action.request_timeout())?;
    let settings = config.workflow_settings()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling workflow");
            on_interrupt.cancel();
        }
    });

    let outcome = Workflow::new(broker.clone() as Arc<dyn SecretsBroker>, invoker, settings)
        .run(WorkflowInputs { tenant, credentials, role_spec, action }, &cancel)
        .await;

    // The workflow has released its handles; drop the broker token now.
    if let Ok(mut broker) = Arc::try_unwrap(broker) {
        broker.clear_token()?;
    }

    match outcome {
        Ok(report) => {
            output::print_summary(&output::RunSummary::from(&report), json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            output::print_summary(&output::RunSummary::from(&failure), json)?;
            Ok(ExitCode::from(EXIT_WORKFLOW_FAILED))
        }
    }
}

async fn check_broker(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let broker = VaultBroker::new(config.vault_config()).context("Invalid broker settings")?;
    let span = crate::broker_span!("health", broker.address());

    match broker.health().instrument(span).await {
        Ok(()) => {
            info!(address = %broker.address(), "Broker healthy");
            println!("✓ Broker at {} is reachable and unsealed", broker.address());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("✗ Broker at {} failed its health check: {}", broker.address(), e);
            Ok(ExitCode::from(EXIT_WORKFLOW_FAILED))
        }
    }
}
