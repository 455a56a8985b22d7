//! # Storefront CLI
//!
//! Command line front-end for the storefront checkout.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  storefront cart                           show cart and summary       │
//! │  storefront add <product> [-q N] [--variant V]                         │
//! │  storefront remove <item-id>                                            │
//! │  storefront set-quantity <item-id> <N>     N < 1 removes the line      │
//! │  storefront clear --yes                                                 │
//! │  storefront quote [--country FR] [--promo CODE] [--carrier ID]         │
//! │  storefront wishlist [list|add|remove|move] ...                        │
//! │                                                                         │
//! │  Global: --config <path>  --json                                       │
//! │  Env:    STOREFRONT_API_URL, STOREFRONT_API_TOKEN, ... (see config)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures are printed inline; the process only exits non-zero.

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use storefront_checkout::{CheckoutConfig, CheckoutSession, NoOpEmitter};
use storefront_core::Destination;

use crate::render::Output;

/// Storefront cart and checkout from the command line.
#[derive(Debug, Parser)]
#[command(name = "storefront", version, about)]
struct Cli {
    /// Path to checkout.toml (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the cart and its checkout summary.
    Cart,

    /// Add a product to the cart.
    Add {
        product_id: String,

        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,

        /// Supplier variant id for drop-shipped products.
        #[arg(long)]
        variant: Option<String>,
    },

    /// Remove a cart line.
    Remove { item_id: String },

    /// Set a line's quantity (below 1 removes it).
    SetQuantity {
        item_id: String,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },

    /// Empty the cart.
    Clear {
        /// Confirm emptying the cart.
        #[arg(long)]
        yes: bool,
    },

    /// Resolve shipping and print the payable total.
    Quote {
        #[arg(long, default_value_t = Destination::Fr)]
        country: Destination,

        #[arg(long)]
        promo: Option<String>,

        /// Carrier to select instead of the default.
        #[arg(long)]
        carrier: Option<String>,
    },

    /// Manage saved-for-later products.
    Wishlist {
        #[command(subcommand)]
        action: Option<WishlistAction>,
    },
}

#[derive(Debug, Subcommand)]
enum WishlistAction {
    /// List saved products.
    List,
    /// Save a product.
    Add { product_id: String },
    /// Forget a product.
    Remove { product_id: String },
    /// Move one unit of a saved product into the cart.
    Move { product_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let output = Output::new(cli.json);

    let config = CheckoutConfig::load_or_default(cli.config.clone());
    let session = match CheckoutSession::from_config(&config, Arc::new(NoOpEmitter)) {
        Ok(session) => session,
        Err(e) => {
            output.error(&e);
            return ExitCode::FAILURE;
        }
    };
    debug!(?session, "Session ready");

    let result = match cli.command {
        Command::Cart => commands::cart::show(&session, &output).await,
        Command::Add {
            product_id,
            quantity,
            variant,
        } => commands::cart::add(&session, &output, &product_id, quantity, variant).await,
        Command::Remove { item_id } => commands::cart::remove(&session, &output, &item_id).await,
        Command::SetQuantity { item_id, quantity } => {
            commands::cart::set_quantity(&session, &output, &item_id, quantity).await
        }
        Command::Clear { yes } => commands::cart::clear(&session, &output, yes).await,
        Command::Quote {
            country,
            promo,
            carrier,
        } => {
            commands::quote::run(&session, &output, country, promo.as_deref(), carrier.as_deref())
                .await
        }
        Command::Wishlist { action } => {
            commands::wishlist::run(&session, &output, action.unwrap_or(WishlistAction::List)).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.failure(&e);
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=storefront_checkout=trace` - Trace the checkout crate only
/// - Default: warnings, plus info for the storefront crates
///
/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,storefront_checkout=info,storefront_cli=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
