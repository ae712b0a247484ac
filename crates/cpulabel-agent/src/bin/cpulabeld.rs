//! Main binary for the cpulabel daemon (cpulabeld)

use clap::{Parser, Subcommand};
use cpulabel_agent::{init_logging, AgentBuilder, AgentConfig, AgentError, Result};
use cpulabel_core::{classify, Error, NodeOutcome, ReconcileReport};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "cpulabeld")]
#[command(about = "Keeps the cpu-speed label of every node in sync with its CPU model")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller until interrupted
    Run,
    /// Run a single reconciliation pass
    Once {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the label for a CPU model string
    Classify {
        /// CPU model, e.g. "Intel(R) Xeon(R) Gold 6248"
        model: String,
    },
    /// Probe one node and print its CPU model and label
    Probe {
        /// Node name
        node: String,
    },
    /// Generate default configuration
    Config {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run) | None => run_agent(&cli).await,
        Some(Commands::Once { json }) => run_once(&cli, json).await,
        Some(Commands::Classify { ref model }) => {
            println!("{}", classify(model));
            Ok(())
        }
        Some(Commands::Probe { ref node }) => probe_node(&cli, node).await,
        Some(Commands::Config { ref output }) => generate_config(output.clone()),
        Some(Commands::Validate) => validate_config(&cli),
    }
}

fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = AgentConfig::load(cli.config.as_deref())?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
        config.validate()?;
    }

    init_logging(&config.logging)?;
    Ok(config)
}

async fn run_agent(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let mut agent = AgentBuilder::new().with_config(config).build()?;

    info!("Starting cpulabel agent: {}", agent.config().agent.name);

    if let Err(e) = agent.run().await {
        error!("Agent failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run_once(cli: &Cli, json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let agent = AgentBuilder::new().with_config(config).build()?;

    match agent.run_once().await {
        Ok(report) => {
            print_report(&report, json)?;
            Ok(())
        }
        Err(Error::Incomplete(report)) => {
            print_report(&report, json)?;
            error!("{} of {} nodes failed", report.failed(), report.outcomes.len());
            std::process::exit(1);
        }
        Err(e) => {
            error!("Reconciliation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_report(report: &ReconcileReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Pass {}", report.pass_id);
    for entry in &report.outcomes {
        match &entry.outcome {
            NodeOutcome::Unchanged { label } => {
                println!("  {:<32} {} (unchanged)", entry.node.as_str(), label)
            }
            NodeOutcome::Updated { previous, current } => println!(
                "  {:<32} {} (was {})",
                entry.node.as_str(),
                current,
                previous.as_deref().unwrap_or("unset")
            ),
            NodeOutcome::Failed { stage, message } => {
                println!("  {:<32} FAILED at {}: {}", entry.node.as_str(), stage, message)
            }
        }
    }
    println!(
        "{} nodes: {} updated, {} unchanged, {} failed",
        report.outcomes.len(),
        report.updated(),
        report.unchanged(),
        report.failed()
    );
    Ok(())
}

async fn probe_node(cli: &Cli, node: &str) -> Result<()> {
    let config = load_config(cli)?;
    let agent = AgentBuilder::new().with_config(config).build()?;

    let signal = agent.probe(node).await?;
    if signal.is_empty() {
        println!("{}: no CPU model reported", node);
    } else {
        println!("{}: {}", node, signal);
    }
    println!("cpu-speed: {}", signal.classify());
    Ok(())
}

fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let config = AgentConfig::default();

    if let Some(output_path) = output {
        config.to_file(&output_path)?;
        println!("Generated configuration file: {}", output_path.display());
    } else {
        println!("{}", config.to_yaml()?);
    }

    Ok(())
}

fn validate_config(cli: &Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .ok_or_else(|| AgentError::Config("--config is required to validate".to_string()))?;
    println!("Validating configuration: {}", config_path.display());

    let config = AgentConfig::load(Some(&config_path))?;

    println!("Configuration is valid");
    println!("Agent name: {}", config.agent.name);
    println!("Reconcile policy: {:?}", config.reconcile.policy);
    println!("Probe backend: {:?}", config.probe.backend);
    println!("Inventory backend: {:?}", config.inventory.backend);
    if config.metrics.enabled {
        println!("Metrics: {}", config.metrics.bind_addr);
    }

    Ok(())
}
