use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use hotel_incident_triage::{
    config::{Config, ObservabilityConfig},
    escalation::{ApprovalBroker, ApprovalNotifier, ApprovalRequest, LoggingApprovalNotifier},
    metrics::{gather_metrics, init_metrics},
    Incident, TriagePipeline,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hotel-triage")]
#[command(about = "Hotel incident triage pipeline", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage an incident and print the sealed record as JSON
    Triage {
        /// Incident JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Approve the run if it requires human review
        #[arg(long, conflicts_with = "reject")]
        approve: bool,

        /// Reject the run if it requires human review
        #[arg(long)]
        reject: bool,

        /// Operator recorded on the decision
        #[arg(long, default_value = "cli-operator")]
        operator: String,

        /// Give up waiting for a decision after this many seconds
        #[arg(long, env = "TRIAGE_APPROVAL_TIMEOUT_SECS")]
        approval_timeout_secs: Option<u64>,
    },

    /// Print the effective decision tables as YAML
    Tables,

    /// Print the metrics exposition
    Metrics,
}

/// Answers approval requests with a decision given on the command line
struct CommandLineApprover {
    broker: Arc<ApprovalBroker>,
    approve: bool,
    operator: String,
}

#[async_trait]
impl ApprovalNotifier for CommandLineApprover {
    async fn request_approval(&self, request: &ApprovalRequest) -> hotel_incident_triage::Result<()> {
        LoggingApprovalNotifier.request_approval(request).await?;
        if self.approve {
            self.broker.approve(request.incident_id, self.operator.clone())
        } else {
            self.broker
                .reject(request.incident_id, self.operator.clone(), "rejected from command line")
        }
    }
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hotel_incident_triage={}", observability.log_level).into());

    // stdout carries command output, logs go to stderr
    if observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    init_tracing(&config.observability);

    if config.observability.prometheus_enabled {
        if let Err(e) = init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    match cli.command {
        Commands::Triage {
            input,
            approve,
            reject,
            operator,
            approval_timeout_secs,
        } => {
            let contents = std::fs::read_to_string(&input)
                .with_context(|| format!("reading incident from {}", input.display()))?;
            let incident: Incident =
                serde_json::from_str(&contents).context("parsing incident JSON")?;

            let mut pipeline = TriagePipeline::from_config(&config)?;
            if let Some(secs) = approval_timeout_secs {
                pipeline = pipeline.with_approval_timeout((secs > 0).then(|| Duration::from_secs(secs)));
            }
            if approve || reject {
                let broker = Arc::new(ApprovalBroker::new());
                pipeline = pipeline.with_broker(broker.clone()).with_approval_notifier(Arc::new(
                    CommandLineApprover {
                        broker,
                        approve,
                        operator,
                    },
                ));
            }

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown signal received");
                    ctrl_c.cancel();
                }
            });

            let record = pipeline.triage_with_cancellation(incident, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Tables => {
            let pipeline = TriagePipeline::from_config(&config)?;
            print!("{}", pipeline.tables().snapshot().to_yaml()?);
        }
        Commands::Metrics => {
            print!("{}", gather_metrics());
        }
    }

    Ok(())
}
