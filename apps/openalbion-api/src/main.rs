use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openalbion_api::{
    AppState, build_router,
    cli::{self, KeyAction},
    config::AppConfig,
    services::{
        key_service::KeyService,
        rate_limit::{MemoryRateLimiter, NoopRateLimiter, RateLimiter, RedisRateLimiter},
    },
};
use openalbion_db::{memory::MemoryStore, store::Stores};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "openalbion")]
#[command(about = "OpenAlbion dataset API gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Use a process-local store instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },
    /// Manage API keys
    Keys {
        #[command(subcommand)]
        subcommand: KeyCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Issue a new key and print its secret once
    Create {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// List a user's keys with masked secrets
    List {
        #[arg(long)]
        user_id: String,
    },
    /// Deactivate a key
    Revoke {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        user_id: String,
    },
    /// Reactivate a revoked key
    Unrevoke {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        user_id: String,
    },
    /// Remove a key permanently
    Delete {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        user_id: String,
    },
}

fn init_tracing(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "openalbion=debug,openalbion_api=debug,tower_http=info,sqlx=warn".into());

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let appender = tracing_appender::rolling::never(".", path);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(file_layer)
        .init();

    guard
}

async fn postgres_stores(config: &AppConfig) -> Result<Stores> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set (or pass --in-memory)")?;
    let pool = openalbion_db::connect(url, config.database_max_connections).await?;
    Ok(Stores::postgres(pool))
}

async fn build_rate_limiter(config: &AppConfig) -> Result<Arc<dyn RateLimiter>> {
    if config.rate_limit.max_requests == 0 {
        warn!("RATE_LIMIT_REQUESTS=0, rate limiting disabled");
        return Ok(Arc::new(NoopRateLimiter));
    }

    match &config.redis_url {
        Some(url) => Ok(Arc::new(RedisRateLimiter::connect(url, config.rate_limit).await?)),
        None => {
            warn!("REDIS_URL not set, using in-process rate limiter");
            Ok(Arc::new(MemoryRateLimiter::new(config.rate_limit)))
        }
    }
}

async fn run_server(config: AppConfig, in_memory: bool) -> Result<()> {
    let stores = if in_memory {
        warn!("Running with in-memory store; data is lost on exit");
        Stores::memory(Arc::new(MemoryStore::new()))
    } else {
        postgres_stores(&config).await?
    };
    let rate_limiter = build_rate_limiter(&config).await?;

    let addr = config.bind_addr;
    let state = AppState::new(config, stores, rate_limiter);
    let app = build_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let _guard = init_tracing(&config);

    match cli.command {
        Commands::Serve { in_memory } => run_server(config, in_memory).await?,
        Commands::Keys { subcommand } => {
            let stores = postgres_stores(&config).await?;
            let keys = KeyService::new(stores.api_keys);

            match subcommand {
                KeyCommands::Create {
                    user_id,
                    name,
                    expires_in_days,
                } => cli::create_key(&keys, &user_id, &name, expires_in_days).await?,
                KeyCommands::List { user_id } => cli::list_keys(&keys, &user_id).await?,
                KeyCommands::Revoke { id, user_id } => {
                    cli::apply_key_action(&keys, KeyAction::Revoke, id, &user_id).await?
                }
                KeyCommands::Unrevoke { id, user_id } => {
                    cli::apply_key_action(&keys, KeyAction::Unrevoke, id, &user_id).await?
                }
                KeyCommands::Delete { id, user_id } => {
                    cli::apply_key_action(&keys, KeyAction::Delete, id, &user_id).await?
                }
            }
        }
    }

    Ok(())
}
