use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kube::CustomResourceExt;
use owop_core::{Function, Rule};
use owop_kubehub::{ControllerConfig, DuckResolver, KubeStore};
use owop_reconcile::Engine;
use owop_whisk::{SecretBackendProvider, DEFAULT_CREDENTIALS_SECRET};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "owopctl", version, about = "Rule operator for the function backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Yaml, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Rule controller until interrupted
    Run(RunArgs),
    /// Print the CustomResourceDefinitions this operator serves
    Crd {
        /// Output format
        #[arg(short = 'o', long = "output", value_enum, default_value_t = Output::Yaml)]
        output: Output,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Watch a single namespace (default: all)
    #[arg(long = "ns", env = "OWOP_NAMESPACE")]
    namespace: Option<String>,

    /// Max concurrent reconciliations across rules
    #[arg(long, env = "OWOP_CONCURRENCY", default_value_t = 32)]
    concurrency: u16,

    /// Secret holding backend credentials when a rule names none
    #[arg(long = "credentials-secret", env = "OWOP_CREDENTIALS_SECRET", default_value = DEFAULT_CREDENTIALS_SECRET)]
    credentials_secret: String,

    /// Seconds before re-invoking after a retryable failure
    #[arg(long = "requeue-secs", env = "OWOP_REQUEUE_SECS", default_value_t = 10)]
    requeue_secs: u64,

    /// Backend HTTP timeout in seconds
    #[arg(long = "request-timeout-secs", env = "OWOP_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,
}

fn init_tracing() {
    let env = std::env::var("OWOP_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("OWOP_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid OWOP_METRICS_ADDR; expected host:port");
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let client = owop_kubehub::get_kube_client().await?;
    let backends = SecretBackendProvider::new(client.clone())
        .with_default_secret(args.credentials_secret.clone())
        .with_timeout(Duration::from_secs(args.request_timeout_secs));
    let engine = Engine::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(backends),
        Arc::new(DuckResolver::new(client.clone())),
    );
    let cfg = ControllerConfig {
        namespace: args.namespace,
        concurrency: args.concurrency.max(1),
        requeue: Duration::from_secs(args.requeue_secs),
    };
    info!(credentials_secret = %args.credentials_secret, "starting");
    owop_kubehub::run_controller(client, engine, cfg).await
}

fn print_crds(output: Output) -> Result<()> {
    let crds = [Rule::crd(), Function::crd()];
    match output {
        Output::Yaml => {
            for crd in crds.iter() {
                println!("---\n{}", serde_yaml::to_string(crd).context("rendering CRD yaml")?);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(&crds)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => {
            init_tracing();
            init_metrics();
            run(args).await
        }
        Commands::Crd { output } => print_crds(output),
    }
}
