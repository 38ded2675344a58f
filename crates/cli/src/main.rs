//! Bakehouse CLI - browse, fill a cart, sign in and check out from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! bakehouse cakes list --category birthday
//!
//! # Build a cart (persisted under BAKEHOUSE_DATA_DIR)
//! bakehouse cart add cake-1 --quantity 2 --notes "Happy birthday Asha"
//! bakehouse cart sync
//!
//! # Sign in through the identity provider
//! bakehouse login
//!
//! # Pay for the cart
//! bakehouse checkout --address "12 Baker Street" --phone +919800000000
//! ```
//!
//! # Commands
//!
//! - `cakes` - Catalog listing and details
//! - `cart` - Local cart editing and remote sync
//! - `login`, `signup`, `logout`, `whoami`, `confirm-signup` - Account
//! - `checkout` - Sync, create the order, pay, confirm
//! - `orders` - Order lookup, history and cancellation

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use bakehouse_storefront::Storefront;
use bakehouse_storefront::config::StorefrontConfig;

mod callback;
#[allow(clippy::print_stdout)]
mod commands;
mod error;
mod gateway;

use error::CliError;

#[derive(Parser)]
#[command(name = "bakehouse")]
#[command(author, version, about = "Bakehouse storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the cake catalog
    Cakes {
        #[command(subcommand)]
        action: CakesAction,
    },
    /// Edit and sync the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in through the identity provider
    Login {
        /// Path to report back after sign-in
        #[arg(long, default_value = "/")]
        return_to: String,
    },
    /// Create an account on the identity provider
    Signup {
        /// Path to report back after sign-up
        #[arg(long, default_value = "/")]
        return_to: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Confirm a sign-up with the emailed code
    ConfirmSignup {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        code: String,
    },
    /// Pay for the cart
    Checkout {
        /// Delivery address
        #[arg(long)]
        address: String,
        /// Contact phone number
        #[arg(long)]
        phone: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Reuse the key of an earlier attempt to pick its order up again
        #[arg(long)]
        idempotency_key: Option<Uuid>,
    },
    /// Look up orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum CakesAction {
    /// List cakes
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        min_price: Option<Decimal>,
        #[arg(long)]
        max_price: Option<Decimal>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Show one cake
    Show { id: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a cake
    Add {
        id: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
        /// Message or instructions for this cake
        #[arg(short, long)]
        notes: Option<String>,
        /// Extras (repeatable)
        #[arg(short, long = "addon")]
        addons: Vec<String>,
    },
    /// Remove a cake
    Remove { id: String },
    /// Set a cake's quantity (0 removes it)
    Set {
        id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Reconcile with the remote cart
    Sync,
    /// Empty the cart
    Clear {
        /// Also delete the remote cart
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Show one order
    Show { id: String },
    /// List orders of the signed-in customer
    List {
        /// Customer id (defaults to the signed-in user)
        #[arg(long)]
        customer: Option<String>,
    },
    /// Cancel an unpaid order
    Cancel { id: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
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

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bakehouse_storefront=info,bakehouse_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        report(&e);
        std::process::exit(1);
    }
}

#[allow(clippy::print_stderr)]
fn report(error: &CliError) {
    eprintln!("{}", error.user_message());
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CliError> {
    let storefront = Storefront::connect(config).await?;

    match cli.command {
        Commands::Cakes { action } => match action {
            CakesAction::List {
                search,
                category,
                min_price,
                max_price,
                page,
                page_size,
            } => {
                let filters = bakehouse_storefront::types::CakeFilters {
                    search,
                    category,
                    min_price,
                    max_price,
                    page,
                    page_size,
                };
                commands::cakes::list(&storefront, &filters).await?;
            }
            CakesAction::Show { id } => commands::cakes::show(&storefront, &id.into()).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await,
            CartAction::Add {
                id,
                quantity,
                notes,
                addons,
            } => commands::cart::add(&storefront, &id.into(), quantity, notes, addons).await?,
            CartAction::Remove { id } => commands::cart::remove(&storefront, &id.into()).await,
            CartAction::Set { id, quantity } => {
                commands::cart::set(&storefront, &id.into(), quantity).await;
            }
            CartAction::Sync => commands::cart::sync(&storefront).await?,
            CartAction::Clear { remote } => commands::cart::clear(&storefront, remote).await?,
        },
        Commands::Login { return_to } => {
            commands::account::login(&storefront, &return_to, false).await?;
        }
        Commands::Signup { return_to } => {
            commands::account::login(&storefront, &return_to, true).await?;
        }
        Commands::Logout => commands::account::logout(&storefront).await?,
        Commands::Whoami => commands::account::whoami(&storefront).await?,
        Commands::ConfirmSignup { username, code } => {
            commands::account::confirm_sign_up(&storefront, &username, &code).await?;
        }
        Commands::Checkout {
            address,
            phone,
            name,
            email,
            idempotency_key,
        } => {
            let form = bakehouse_storefront::checkout::CheckoutForm {
                address,
                phone,
                name,
                email,
                customer_id: storefront.customer_id().await,
            };
            commands::checkout::run(&storefront, form, idempotency_key).await?;
        }
        Commands::Orders { action } => match action {
            OrdersAction::Show { id } => commands::orders::show(&storefront, &id.into()).await?,
            OrdersAction::List { customer } => {
                commands::orders::list(&storefront, customer.map(Into::into)).await?;
            }
            OrdersAction::Cancel { id } => {
                commands::orders::cancel(&storefront, &id.into()).await?;
            }
        },
    }

    Ok(())
}
