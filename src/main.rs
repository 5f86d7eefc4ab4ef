use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use canvasflow_core::config::AppConfig;
use canvasflow_core::event::to_ndjson_line;
use canvasflow_core::types::{ExecutionEvent, Graph};
use canvasflow_engine::{GraphIndex, HandlerRegistry, WorkflowExecutor};
use canvasflow_gateway::GatewayServer;

#[derive(Parser)]
#[command(
    name = "canvasflow",
    version,
    about = "Workflow execution engine for canvas-built AI agent graphs"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "canvasflow.toml", env = "CANVASFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a graph and print its events as NDJSON
    Run {
        /// Graph JSON file (`-` for stdin)
        graph: PathBuf,
    },
    /// Check a graph without running it
    Validate {
        /// Graph JSON file (`-` for stdin)
        graph: PathBuf,
    },
    /// Start the HTTP gateway
    Serve {
        /// Override the bind address from the config file
        #[arg(long)]
        bind: Option<String>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pure NDJSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("canvasflow=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)?;
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "No config file, using defaults");
    }

    match cli.command {
        Commands::Run { graph } => {
            let graph = read_graph(&graph)?;
            run_graph(&config, graph).await?;
        }
        Commands::Validate { graph } => {
            let graph = read_graph(&graph)?;
            let index = GraphIndex::build(graph)?;
            println!("valid: {} nodes", index.len());
            println!("entry nodes: {}", index.entry_nodes().join(", "));
        }
        Commands::Serve { bind } => {
            let mut gateway_config = config.gateway.clone();
            if let Some(bind) = bind {
                gateway_config.bind = bind;
            }
            let server = GatewayServer::new(gateway_config, build_executor(&config)?);

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn build_executor(config: &AppConfig) -> anyhow::Result<WorkflowExecutor> {
    let registry = HandlerRegistry::with_builtins(config)?;
    Ok(WorkflowExecutor::new(Arc::new(registry)).with_event_buffer(config.engine.event_buffer))
}

fn read_graph(path: &Path) -> anyhow::Result<Graph> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?
    };
    Ok(serde_json::from_str(&content)?)
}

/// Stream a run to stdout. Ctrl-C drops the stream, which cancels the run.
async fn run_graph(config: &AppConfig, graph: Graph) -> anyhow::Result<()> {
    let executor = build_executor(config)?;
    let mut events = executor.stream(graph);
    let mut failure = None;

    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling run");
                anyhow::bail!("run cancelled");
            }
        };
        let Some(event) = event else { break };

        if let ExecutionEvent::Error { error } = &event {
            failure = Some(error.clone());
        }
        let line = to_ndjson_line(&event)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.flush()?;
    }

    match failure {
        Some(error) => anyhow::bail!("workflow failed: {}", error),
        None => Ok(()),
    }
}
