//! Stepcount Service - Background step tracker and HTTP API.
//!
//! Run with: `cargo run -p stepcount-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use stepcount_service::{AppState, Collector, Config, api, ws};
use stepcount_types::StepDate;

/// Stepcount Service - Background step tracker and HTTP REST API.
#[derive(Parser, Debug)]
#[command(name = "stepcount-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Disable the step collector (API only mode).
    #[arg(long, global = true)]
    no_collector: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service in the foreground (default behavior).
    Run,

    #[command(flatten)]
    Query(Query),
}

/// One-shot history queries against the database.
#[derive(Subcommand, Debug)]
enum Query {
    /// Print today's stored total.
    Today,

    /// Print per-day totals for an inclusive date range.
    Range {
        /// First day (YYYY-MM-DD).
        start: String,
        /// Last day (YYYY-MM-DD).
        end: String,
    },

    /// Print the total for a calendar month.
    Month {
        /// Year, e.g. 2024.
        year: i32,
        /// Month, 1-12.
        month: u8,
    },

    /// Print the most recent recorded days.
    Recent {
        /// Number of days.
        #[arg(short, long, default_value_t = api::DEFAULT_RECENT_LIMIT)]
        limit: u32,
    },

    /// Delete stored history.
    Wipe {
        /// Only delete this day (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stepcount_service=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Run) | None => run_server(config, args.no_collector).await,
        Some(Command::Query(query)) => run_query(config, query).await,
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_else(|e| {
            warn!("Ignoring unreadable default config: {}", e);
            Config::default()
        }),
    };

    // Override config with CLI args
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run_query(config: Config, query: Query) -> anyhow::Result<()> {
    let state = AppState::open(config)?;
    let store = state.store();

    match query {
        Query::Today => {
            println!("{}: {}", store.today(), store.today_steps().await?);
        }
        Query::Range { start, end } => {
            let start = StepDate::parse(&start)?;
            let end = StepDate::parse(&end)?;
            for day in store.get_steps_in_range(start, end).await? {
                println!("{}: {}", day.date, day.steps);
            }
            println!("total: {}", store.get_total_in_range(start, end).await?);
        }
        Query::Month { year, month } => {
            let total = store.get_monthly_total(year, month).await?;
            println!("{}-{:02}: {}", year, month, total);
        }
        Query::Recent { limit } => {
            for day in store.recent_days(limit).await? {
                println!("{}: {}", day.date, day.steps);
            }
        }
        Query::Wipe { date: Some(date) } => {
            let date = StepDate::parse(&date)?;
            if store.delete_date(date).await? {
                println!("Deleted {}", date);
            } else {
                println!("No record for {}", date);
            }
        }
        Query::Wipe { date: None } => {
            println!("Deleted {} days", store.delete_all().await?);
        }
    }
    Ok(())
}

async fn run_server(config: Config, no_collector: bool) -> anyhow::Result<()> {
    info!("Opening database at {:?}", config.storage.path);
    let state = AppState::open(config.clone())?;

    let collector = Collector::new(Arc::clone(&state));
    if !no_collector {
        if let Err(e) = collector.start().await {
            warn!("Step collector not started: {}", e);
        }
    } else {
        info!("Step collector disabled");
    }

    let app = Router::new()
        .merge(api::router())
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = config.server.bind.parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    collector.stop().await;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
