//! Tradepost CLI - list, delete and watch marketplace products.
//!
//! # Usage
//!
//! ```bash
//! # List a product with two images
//! tradepost --user uid-1 add --name "Desk lamp" --description "Brass" \
//!     --price 15 --category Electronics --location "Brooklyn, NY" \
//!     --image front.jpg --image back.jpg
//!
//! # Delete a product
//! tradepost --user uid-1 delete -NqX4c2h7Vb0aZkLm3Qe
//!
//! # Print your listings and bookmarks on every change until Ctrl+C
//! tradepost --user uid-1 watch
//! ```
//!
//! # Commands
//!
//! - `add` - Fill in and submit the add-product form
//! - `delete` - Delete a product by id
//! - `watch` - Follow the live product and bookmark grids
//!
//! Backends are configured from the environment; see `ListingsConfig`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradepost_listings::ListingsConfig;

mod commands;

#[derive(Parser)]
#[command(name = "tradepost")]
#[command(author, version, about = "Tradepost listing tools")]
struct Cli {
    /// Id of the signed-in user
    #[arg(short, long)]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a new product
    Add {
        /// Product name (at most 30 characters)
        #[arg(long)]
        name: String,

        /// Product description (at most 150 characters)
        #[arg(long)]
        description: String,

        /// Asking price (at most 5 characters)
        #[arg(long)]
        price: String,

        /// Category (`Toy`, `Electronics`, `Clothing`)
        #[arg(long)]
        category: String,

        /// Address used to place the listing on the map
        #[arg(long)]
        location: String,

        /// Image file to attach (repeat up to 3 times)
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
    },
    /// Delete a product
    Delete {
        /// Product id (push ids start with `-`)
        #[arg(allow_hyphen_values = true)]
        product_id: String,
    },
    /// Follow your products and bookmarks until Ctrl+C
    Watch,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ListingsConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
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

/// Install the tracing subscriber: env filter, fmt output, Sentry layer.
fn init_tracing(log_json: bool) {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tradepost_listings=info,tradepost=info".into());

    let (json, plain) = if log_json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(plain)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed for Sentry, which must start before tracing
    let config = ListingsConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing(config.as_ref().is_ok_and(|c| c.log_json));

    let result: Result<(), Box<dyn std::error::Error>> = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ListingsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let view = commands::connect(config, &cli.user)?;

    match cli.command {
        Commands::Add {
            name,
            description,
            price,
            category,
            location,
            images,
        } => {
            let listing = commands::add::NewListing {
                name,
                description,
                price,
                category,
                location,
                images,
            };
            commands::add::add(&view, listing).await?;
        }
        Commands::Delete { product_id } => {
            commands::delete::delete(&view, &product_id).await;
        }
        Commands::Watch => commands::watch::watch(&view).await?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_add_collects_repeated_images() {
        let cli = Cli::try_parse_from([
            "tradepost", "--user", "uid-1", "add", "--name", "Kite", "--description", "Red",
            "--price", "5", "--category", "Toy", "--location", "Austin", "--image", "a.png",
            "--image", "b.png",
        ])
        .unwrap();

        assert_eq!(cli.user, "uid-1");
        let Commands::Add { images, .. } = cli.command else {
            panic!("expected add");
        };
        assert_eq!(images, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
    }

    #[test]
    fn test_delete_accepts_push_id() {
        let cli =
            Cli::try_parse_from(["tradepost", "--user", "uid-1", "delete", "-NqX4c2h7Vb0aZkLm3Qe"])
                .unwrap();

        let Commands::Delete { product_id } = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(product_id, "-NqX4c2h7Vb0aZkLm3Qe");
    }

    #[test]
    fn test_user_is_required() {
        assert!(Cli::try_parse_from(["tradepost", "watch"]).is_err());
    }
}
