use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

/// Capacity controller: scales a release's deployments on target clusters
/// to their declared share of the release's replica budget.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    /// Kubeconfig holding the management and target cluster contexts.
    /// Defaults to the usual kubeconfig discovery.
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,
    /// Context of the management cluster. In-cluster or default config when unset.
    #[arg(long)]
    pub management_context: Option<String>,
    /// Kubeconfig contexts of the target clusters; each context name is the
    /// cluster name used in capacity targets.
    #[arg(long, value_delimiter = ',', required = true)]
    pub clusters: Vec<String>,
    /// Seconds between periodic reconciliations of a healthy capacity target.
    #[arg(long, default_value_t = 1800)]
    pub resync_seconds: u64,
    /// Seconds before a capacity target that asked for a retry is reconciled again.
    #[arg(long, default_value_t = 30)]
    pub retry_seconds: u64,
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,
    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,
}

/// Requeue timing for the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub resync: Duration,
    pub retry: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resync: Duration::from_secs(1800),
            retry: Duration::from_secs(30),
        }
    }
}

impl From<&Cli> for Settings {
    fn from(cli: &Cli) -> Self {
        Self {
            resync: Duration::from_secs(cli.resync_seconds),
            retry: Duration::from_secs(cli.retry_seconds),
        }
    }
}
