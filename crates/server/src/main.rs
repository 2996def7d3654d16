//! SolarFlow Server
//!
//! Axum server exposing the project lifecycle engine over a JSON API, with a
//! server-sent event stream for live updates.

mod api;
mod config;
mod error;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use solarflow_core::lifecycle::{emit, BroadcastSink, ProjectEvent, TransitionEngine};
use solarflow_core::state::{ProjectStore, SolarDb};

use config::{ResolvedConfig, ServerConfig, CONFIG_PATH, ENV_PATH};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    store: Arc<ProjectStore>,
    engine: TransitionEngine,
    sink: Arc<BroadcastSink>,
    events: broadcast::Sender<ProjectEvent>,
    config: Arc<ResolvedConfig>,
}

impl AppState {
    pub fn new(db: &SolarDb, config: ResolvedConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let sink = Arc::new(BroadcastSink::from_sender(events.clone()));
        let store = Arc::new(ProjectStore::new(db));
        let engine = TransitionEngine::new(store.clone(), sink.clone());

        Self {
            store,
            engine,
            sink,
            events,
            config: Arc::new(config),
        }
    }

    /// Publish an event outside the engine; failures are only logged
    pub fn emit(&self, event: ProjectEvent) {
        emit(self.sink.as_ref(), event);
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        let db = SolarDb::open_in_memory().expect("in-memory database");
        Self::new(&db, ServerConfig::default().resolve())
    }
}

#[derive(Parser, Clone)]
#[command(author, version, about = "SolarFlow - solar project lifecycle tracking")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the API server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,
        /// SQLite database path
        #[arg(long)]
        db: Option<String>,
    },
    /// Create the database and write a default config file
    Init {
        /// SQLite database path
        #[arg(long)]
        db: Option<String>,
    },
    /// Print project counters
    Status {
        /// SQLite database path
        #[arg(long)]
        db: Option<String>,
    },
}

impl CliCommand {
    /// Flags given on the command line, as the top config layer
    fn overrides(&self) -> ServerConfig {
        match self {
            Self::Serve { port, bind, db } => ServerConfig {
                port: *port,
                bind: bind.clone(),
                db_path: db.clone(),
                ..Default::default()
            },
            Self::Init { db } | Self::Status { db } => ServerConfig {
                db_path: db.clone(),
                ..Default::default()
            },
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

pub async fn run_server(config: ResolvedConfig) -> anyhow::Result<()> {
    let db = SolarDb::open_at(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    let address = config.address();
    let state = AppState::new(&db, config);
    let app = api::router().with_state(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("SolarFlow server running at http://{}", address);
    tracing::info!("   Projects: /api/v1/clients, /api/v1/projects, /api/v1/stats");
    tracing::info!("   Events:   /api/v1/events (SSE)");
    tracing::info!("   OpenAPI:  /api/v1/openapi.json");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn init_workspace(file_layer: ServerConfig, config: &ResolvedConfig) -> anyhow::Result<()> {
    SolarDb::open_at(&config.db_path)
        .with_context(|| format!("Failed to create database at {}", config.db_path.display()))?;
    tracing::info!(path = %config.db_path.display(), "Database ready");

    if std::path::Path::new(CONFIG_PATH).exists() {
        tracing::info!("{} already present, left unchanged", CONFIG_PATH);
    } else {
        let mut layer = file_layer;
        layer.db_path = Some(config.db_path.display().to_string());
        layer.save(CONFIG_PATH).await?;
        tracing::info!("Wrote {}", CONFIG_PATH);
    }
    Ok(())
}

fn print_status(config: &ResolvedConfig) -> anyhow::Result<()> {
    let db = SolarDb::open_at(&config.db_path)?;
    let stats = ProjectStore::new(&db).stats()?;

    println!("Database:               {}", config.db_path.display());
    println!("Active projects:        {}", stats.active_projects);
    println!("Pending inspections:    {}", stats.pending_inspections);
    println!("Pending installations:  {}", stats.pending_installations);
    println!("Pending homologations:  {}", stats.pending_homologations);
    println!("Completed projects:     {}", stats.completed_projects);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _ = dotenvy::from_path(ENV_PATH);
    let _ = dotenvy::dotenv();

    let command = args.command.unwrap_or(CliCommand::Serve {
        port: None,
        bind: None,
        db: None,
    });

    let file_layer = ServerConfig::load(CONFIG_PATH).await;
    let mut layered = file_layer.clone();
    layered.merge(ServerConfig::from_env());
    layered.merge(command.overrides());
    let config = layered.resolve();

    init_tracing(&config.log_filter);

    match command {
        CliCommand::Serve { .. } => run_server(config).await,
        CliCommand::Init { .. } => init_workspace(file_layer, &config).await,
        CliCommand::Status { .. } => print_status(&config),
    }
}
