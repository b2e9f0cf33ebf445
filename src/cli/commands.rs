// CLI command definitions

use super::apply::{ApplyCommand, ResolveCommand};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "kube-apply",
    version,
    about = "Apply Kubernetes manifests with server-side apply",
    long_about = "Validates manifests, resolves their resource types through API discovery and applies them with server-side apply under a single field manager"
)]
pub struct CliArgs {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Apply one or more manifests (server-side apply)
    Apply(ApplyCommand),

    /// Resolve an apiVersion/kind to its REST resource
    Resolve(ResolveCommand),
}
