//! Kaline CLI - drive the commerce engine from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Seed (or re-seed) the local catalog
//! kaline seed --reset
//!
//! # Browse the catalog
//! kaline products list --category vestidos
//! kaline products show 3
//!
//! # Manage products (synced to KALINE_CATALOG_ENDPOINT)
//! kaline products add --name "Saia Midi" --price "R$ 189,90" --size P --size M
//! kaline products update prod-42 --price "R$ 159,90"
//! kaline products remove prod-42
//!
//! # Shop
//! kaline cart add 3 --size M --color Terracota --quantity 2
//! kaline cart show
//! kaline cart checkout
//! kaline favorites toggle 3
//! ```
//!
//! # Commands
//!
//! - `seed` - Ingest the seed feed into an empty (or reset) catalog
//! - `products` - List, show, add, update and remove catalog products
//! - `cart` - Add, change, remove and check out cart lines
//! - `favorites` - Toggle and list favorites

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use kaline_commerce::{CommerceConfig, LogFormat};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::cart::CartAction;
use commands::favorites::FavoritesAction;
use commands::products::ProductsAction;

#[derive(Parser)]
#[command(name = "kaline")]
#[command(author, version, about = "Kaline storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the seed feed into the local catalog
    Seed {
        /// Discard the local catalog first
        #[arg(long)]
        reset: bool,
    },
    /// Browse and manage catalog products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CommerceConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kaline_commerce=info,kaline_cli=info".into());

    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed before tracing (log format, Sentry DSN)
    let config = match CommerceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::default());
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CommerceConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed { reset } => commands::seed::run(config, reset).await?,
        Commands::Products { action } => commands::products::run(config, action).await?,
        Commands::Cart { action } => commands::cart::run(config, action).await?,
        Commands::Favorites { action } => commands::favorites::run(config, action).await?,
    }
    Ok(())
}
