//! Apply and resolve commands

use crate::cli::display::TableRenderer;
use crate::cli::retry::{retry_retryable, RetryPolicy};
use crate::domain::apply::{ApplyResult, ApplySummary, ManifestApplier};
use crate::domain::config::{apply_to_apply_config, parse_dynamic_configs, ApplyConfig};
use crate::domain::manifest::ManifestSource;
use crate::domain::resource::ResourceCoordinate;
use crate::shared::error::{KubeError, ResourceRef};
use clap::{Args, Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Options shared by every command that talks to the API server.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Path to kubeconfig file
    /// If not specified, uses default kubeconfig resolution (KUBECONFIG env or ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubernetes context to use
    /// If not specified, uses current context from kubeconfig
    #[arg(long)]
    pub context: Option<String>,

    /// Path to kube-apply configuration file (TOML)
    /// If not provided, KUBE_APPLY_CONFIG is consulted, then built-in defaults
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// Per-request timeout in seconds for discovery and apply calls
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Dynamic configuration properties to override file settings (-D key=value)
    ///
    /// Apply: apply.field-manager, apply.force-conflicts, apply.retries
    /// Discovery: discovery.ttl-secs
    /// Requests: request.timeout-secs
    /// Connection: kubernetes.context, kubernetes.config.file
    ///
    /// Example: -Dapply.field-manager=ci -Ddiscovery.ttl-secs=60
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

impl ConnectionArgs {
    /// Resolve configuration: command line > -D properties > config file > defaults.
    pub fn load_config(&self) -> Result<ApplyConfig, KubeError> {
        let mut config = ApplyConfig::load(self.config_file.as_deref())?;

        if !self.properties.is_empty() {
            let dynamic_configs = parse_dynamic_configs(&self.properties)?;
            apply_to_apply_config(&dynamic_configs, &mut config)?;
        }

        if let Some(kubeconfig) = &self.kubeconfig {
            config.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &self.context {
            config.context = Some(context.clone());
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.request_timeout_secs = timeout_secs;
        }

        Ok(config)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ApplyCommand {
    /// Inline manifest text (YAML or JSON, `---` separates documents)
    #[arg(long, conflicts_with = "file")]
    pub manifest: Option<String>,

    /// Path to a manifest file
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// The manifests target a namespaced resource type
    #[arg(long)]
    pub namespaced: bool,

    /// Field manager recorded as owner of the applied fields
    #[arg(long)]
    pub field_manager: Option<String>,

    /// Take ownership of fields held by other managers
    #[arg(long)]
    pub force_conflicts: bool,

    /// Extra attempts after a transport failure or timeout
    #[arg(long)]
    pub retries: Option<usize>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ResolveCommand {
    /// apiVersion to resolve, e.g. `apps/v1` or `v1`
    #[arg(long)]
    pub api_version: String,

    /// Kind to resolve, e.g. `Deployment`
    #[arg(long)]
    pub kind: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppliedOutput<'a> {
    resource: &'a ResourceRef,
    coordinate: &'a ResourceCoordinate,
    #[serde(flatten)]
    summary: ApplySummary,
}

impl ApplyCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let output = self.connection.output;
        match self.run().await {
            Ok((results, field_manager)) => {
                render_results(&results, &field_manager, output)?;
                Ok(())
            }
            Err(err) => {
                render_failure(&err, output)?;
                Err(err.into())
            }
        }
    }

    /// Resolve configuration with the apply-specific flags on top.
    pub fn load_config(&self) -> Result<ApplyConfig, KubeError> {
        let mut config = self.connection.load_config()?;
        if let Some(field_manager) = &self.field_manager {
            config.field_manager = field_manager.clone();
        }
        if self.force_conflicts {
            config.force_conflicts = true;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        config.validate()?;
        Ok(config)
    }

    async fn run(&self) -> Result<(Vec<ApplyResult>, String), KubeError> {
        let source = ManifestSource::from_inputs(self.manifest.clone(), self.file.clone())
            .map_err(|source| KubeError::validation(ResourceRef::default(), source))?;
        let config = self.load_config()?;
        let applier = ManifestApplier::from_config(&config).await?;
        let cancel = cancel_on_ctrl_c();

        let policy = RetryPolicy::new(config.retries);
        let (applier_ref, source_ref, cancel_ref) = (&applier, &source, &cancel);
        let namespaced = self.namespaced;
        let results = retry_retryable(&policy, &cancel, move || {
            applier_ref.apply_source(source_ref, namespaced, cancel_ref)
        })
        .await?;

        Ok((results, config.field_manager))
    }
}

impl ResolveCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let output = self.connection.output;
        match self.run().await {
            Ok(coordinate) => {
                match output {
                    OutputFormat::Table => {
                        println!("{}", TableRenderer::new().render_coordinate(&coordinate))
                    }
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&coordinate)?)
                    }
                }
                Ok(())
            }
            Err(err) => {
                render_failure(&err, output)?;
                Err(err.into())
            }
        }
    }

    async fn run(&self) -> Result<ResourceCoordinate, KubeError> {
        let config = self.connection.load_config()?;
        let applier = ManifestApplier::from_config(&config).await?;
        let cancel = cancel_on_ctrl_c();
        applier.resolve(&self.api_version, &self.kind, &cancel).await
    }
}

fn render_results(
    results: &[ApplyResult],
    field_manager: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    match output {
        OutputFormat::Table => {
            println!(
                "{}",
                TableRenderer::new().render_apply_results(results, field_manager)
            );
        }
        OutputFormat::Json => {
            let applied: Vec<AppliedOutput<'_>> = results
                .iter()
                .map(|result| AppliedOutput {
                    resource: &result.resource,
                    coordinate: &result.coordinate,
                    summary: result.summary(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&applied)?);
        }
    }
    Ok(())
}

fn render_failure(err: &KubeError, output: OutputFormat) -> anyhow::Result<()> {
    let report = err.report();
    match output {
        OutputFormat::Table => eprintln!("{}", TableRenderer::new().render_failure(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling in-flight requests");
            child.cancel();
        }
    });
    token
}
