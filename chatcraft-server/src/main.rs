use clap::Parser;
use chatcraft_core::ChatcraftConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use chatcraft_server::http::{self, HttpState};
use chatcraft_server::seed;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chatcraft.toml")]
    config: String,

    /// Probe the store and exit
    #[arg(long)]
    health: bool,

    /// Insert the demo user, chatbot and API key before serving
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ChatcraftConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging: RUST_LOG wins, otherwise service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store = match chatcraft_core::open_store(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open {:?} store: {}", config.database.backend, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.ping().await {
            Ok(v) => println!("✅ Store connected ({}): {}", store.name(), v),
            Err(e) => {
                println!("❌ Store connection failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ ChatCraft health check passed");
        return Ok(());
    }

    if args.seed {
        seed::seed_demo_data(store.as_ref()).await?;
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
        }
        let _ = shutdown_tx.send(());
    });

    let state = HttpState::new(store, config);
    tracing::info!(
        store = state.store().name(),
        generation = state.generator.is_configured(),
        "ChatCraft starting"
    );

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
