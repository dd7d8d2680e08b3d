//! RedSeam CLI - Command-line storefront for the RedSeam commerce API.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (stores the session in .redseam-session)
//! redseam login -e shopper@example.com -p secret
//!
//! # Browse the catalog
//! redseam products --page 2 --price-from 10 --price-to 100 --sort price
//! redseam product 42
//!
//! # Work with the cart
//! redseam add 42 --quantity 2 --color Red --size M
//! redseam update 42-Red-M 3
//! redseam remove 42-Red-M
//! redseam cart
//!
//! # Place the order
//! redseam checkout --name Nino --surname Beridze --address "1 Rustaveli Ave" --zip-code 0108
//! ```
//!
//! # Environment Variables
//!
//! See `redseam_storefront::config` for API settings. `RUST_LOG` controls log
//! output (default `redseam_storefront=info,redseam_cli=info`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use redseam_storefront::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "redseam")]
#[command(author, version, about = "RedSeam storefront CLI")]
struct Cli {
    /// File the cookie session is kept in between runs
    #[arg(long, env = "REDSEAM_SESSION_FILE", default_value = ".redseam-session")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "REDSEAM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "REDSEAM_PASSWORD", hide_env_values = true)]
        password: String,
        /// Repeat the password (defaults to --password)
        #[arg(long, hide_env_values = true)]
        confirm_password: Option<String>,
        /// Avatar image (JPEG, PNG or WebP, up to 5MB)
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// List products
    Products {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "")]
        price_from: String,
        #[arg(long, default_value = "")]
        price_to: String,
        /// `-created_at`, `price` or `-price`
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,
    },
    /// Show a product's details
    Product { id: i64 },
    /// Show the cart
    Cart,
    /// Add a product to the cart
    Add {
        product_id: i64,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
        /// Defaults to the product's first color
        #[arg(long)]
        color: Option<String>,
        /// Defaults to the product's first size
        #[arg(long)]
        size: Option<String>,
    },
    /// Change a cart line's quantity (0 removes it)
    Update {
        /// Line key, e.g. `42-Red-M` or `7-no-color-M`
        key: String,
        quantity: u32,
    },
    /// Remove a cart line
    Remove {
        /// Line key, e.g. `42-Red-M`
        key: String,
    },
    /// Place the order for the current cart
    Checkout {
        #[arg(long)]
        name: String,
        #[arg(long)]
        surname: String,
        /// Defaults to the signed-in user's email
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: String,
        #[arg(long)]
        zip_code: String,
    },
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

    Some(guard)
}

/// Map tracing levels to Sentry: warnings and errors become events, the
/// rest become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "redseam_storefront=info,redseam_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = commands::Context::open(config, cli.session_file).await?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::account::login(&ctx, email, password).await?;
        }
        Commands::Logout => commands::account::logout(&ctx),
        Commands::Register {
            username,
            email,
            confirm_password,
            password,
            avatar,
        } => {
            let confirm_password = confirm_password.unwrap_or_else(|| password.clone());
            commands::account::register(&ctx, username, email, password, confirm_password, avatar)
                .await?;
        }
        Commands::Products {
            page,
            price_from,
            price_to,
            sort,
        } => {
            commands::catalog::list(&ctx, page, &price_from, &price_to, sort.as_deref()).await?;
        }
        Commands::Product { id } => commands::catalog::show(&ctx, id).await?,
        Commands::Cart => commands::cart::show(&ctx).await,
        Commands::Add {
            product_id,
            quantity,
            color,
            size,
        } => commands::cart::add(&ctx, product_id, quantity, color, size).await?,
        Commands::Update { key, quantity } => commands::cart::update(&ctx, &key, quantity).await?,
        Commands::Remove { key } => commands::cart::remove(&ctx, &key).await?,
        Commands::Checkout {
            name,
            surname,
            email,
            address,
            zip_code,
        } => {
            commands::cart::checkout(&ctx, name, surname, email, address, zip_code).await?;
        }
    }

    ctx.save().await?;
    Ok(())
}
