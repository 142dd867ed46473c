use clap::Parser;
use referral_node::{
    api::ApiServer,
    config::{ensure_default_config, Config, DEFAULT_DATABASE_PATH},
    referral::ReferralService,
    storage::{StorageBackend, StorageFactory},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Storage backend override: memory or sqlite
    #[arg(short, long)]
    storage_backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration, writing a default file on first run
    let config: Config = ensure_default_config(&args.config)?;

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    info!("Loaded configuration from {}", args.config);

    // Resolve the storage backend, letting the CLI override the config file
    let backend = match args.storage_backend.as_deref() {
        Some("memory") => StorageBackend::Memory,
        Some("sqlite") => match &config.storage.backend {
            StorageBackend::Sqlite { database_path } => StorageBackend::Sqlite {
                database_path: database_path.clone(),
            },
            StorageBackend::Memory => StorageBackend::Sqlite {
                database_path: DEFAULT_DATABASE_PATH.to_string(),
            },
        },
        Some(other) => {
            return Err(format!("Unknown storage backend: {}", other).into());
        }
        None => config.storage.backend.clone(),
    };

    match &backend {
        StorageBackend::Sqlite { database_path } => {
            info!("Using SQLite referral store at {}", database_path)
        }
        StorageBackend::Memory => info!("Using in-memory referral store"),
    }

    // Build the store and the referral service over it
    let store = StorageFactory::create(&backend)?;
    let referral = Arc::new(ReferralService::new(store));

    if config.api.enable_debug_endpoint {
        info!("Debug state-dump endpoint is enabled");
    }

    // Create and start the API server
    let api_server = ApiServer::new(
        referral,
        config.api.bind_address.clone(),
        config.api.enable_debug_endpoint,
    );
    api_server.start().await?;

    Ok(())
}
