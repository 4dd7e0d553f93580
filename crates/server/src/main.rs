//! Conductor Server
//!
//! Axum surface over the engine. `conductor serve` exposes the JSON API;
//! `conductor run` executes one request from the command line without a
//! server.

mod api;

use api::{AppState, SharedState};
use clap::{Parser, Subcommand};
use conductor_core::context::MemoryRetriever;
use conductor_core::swarm::SwarmManager;
use conductor_core::{tools, EngineConfig, Orchestrator, PipelineResult};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Conductor - Multi-Agent Code Generation Engine")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the Conductor server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Execute one request from the command line, no server
    Run {
        /// The request to execute
        request: String,
        /// Decompose into a concurrent task swarm instead of the linear
        /// pipeline
        #[arg(long)]
        swarm: bool,
        /// Project root to scan; its structure summary lets questions
        /// about the project be answered directly
        #[arg(long)]
        project: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Run {
            request,
            swarm,
            project,
        }) => run_once(&request, swarm, project.as_deref()).await,
        Some(CliCommand::Serve { port }) => serve(port).await,
        None => serve(8080).await,
    }
}

async fn serve(port: u16) -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    let orchestrator = Arc::new(Orchestrator::new(config)?);
    let state: SharedState = Arc::new(AppState {
        orchestrator,
        retriever: Arc::new(MemoryRetriever::new()),
    });

    let app = api::router(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("conductor listening on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_once(request: &str, swarm: bool, project: Option<&Path>) -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    let orchestrator = Arc::new(Orchestrator::new(config)?);

    if swarm {
        let manager = SwarmManager::new(orchestrator);
        let result = manager.run(request, None).await?;
        println!("{}", result.synthesis);
        return Ok(());
    }

    let structure = match project {
        Some(root) => Some(tools::summarize(root)?.render()),
        None => None,
    };
    match orchestrator
        .run_pipeline(request, None, structure.as_deref())
        .await?
    {
        PipelineResult::Answer { answer, .. } => println!("{}", answer),
        PipelineResult::Completed { plan } => {
            for (phase, artifact) in plan.phases() {
                println!("## {}\n", phase);
                println!("{}\n", serde_json::to_string_pretty(artifact)?);
            }
        }
    }
    Ok(())
}
