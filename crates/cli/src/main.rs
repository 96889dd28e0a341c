//! Pennyshop CLI - the command-line caller of the storefront core.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! pshop migrate
//!
//! # Create an account and log in
//! pshop register -u alice -p 'correct horse'
//! pshop login -u alice -p 'correct horse'
//!
//! # Authorized ledger calls (session and CSRF token from `login`)
//! pshop deposit 200.00 --session <id> --csrf <token>
//! pshop purchase 1 --session <id> --csrf <token>
//!
//! # Run the expired-session sweeper until Ctrl+C
//! pshop serve
//! ```
//!
//! Every command prints one JSON object per line on stdout. Failures print a
//! JSON error object on stderr and exit with a code per error class:
//! 2 validation, 3 auth, 4 business, 5 infrastructure.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::IpAddr;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pennyshop_core::{ItemId, Money};
use pennyshop_storefront::config::ShopConfig;

mod commands;
mod error;
mod output;

use error::CliError;

#[derive(Parser)]
#[command(name = "pshop")]
#[command(author, version, about = "Pennyshop account, session and ledger CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Session credentials for authorized commands.
#[derive(Args)]
pub(crate) struct SessionArgs {
    /// Session ID returned by `login`
    #[arg(long)]
    pub session: String,

    /// CSRF token returned by `login`
    #[arg(long)]
    pub csrf: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Create an account
    Register {
        /// Account name
        #[arg(short, long)]
        username: String,

        /// Password (8-256 bytes)
        #[arg(short, long)]
        password: String,
    },
    /// Log in and print a new session
    Login {
        /// Account name
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(short, long)]
        password: String,

        /// Network address to record on the session
        #[arg(long)]
        addr: Option<IpAddr>,
    },
    /// Show the balance
    Balance {
        #[command(flatten)]
        auth: SessionArgs,
    },
    /// Add funds, e.g. `200.00`
    Deposit {
        /// Amount in major units
        amount: Money,

        #[command(flatten)]
        auth: SessionArgs,
    },
    /// Buy one item
    Purchase {
        /// Item ID
        item: ItemId,

        #[command(flatten)]
        auth: SessionArgs,
    },
    /// List past purchases
    Purchases {
        #[command(flatten)]
        auth: SessionArgs,
    },
    /// List items
    Items,
    /// Delete expired sessions once
    Sweep,
    /// Run the periodic session sweep until interrupted
    Serve,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ShopConfig) -> Option<sentry::ClientInitGuard> {
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

/// Install the tracing subscriber. Logs go to stderr; stdout carries results.
fn init_tracing(with_sentry: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pennyshop_storefront=info,pennyshop_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(with_sentry.then(|| sentry_tracing::layer().event_filter(sentry_event_filter)))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ShopConfig::from_env() {
        Ok(config) => config,
        Err(e) => return error::report(&CliError::from(e)),
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing(sentry_guard.is_some());

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => error::report(&e),
    }
}

async fn run(cli: Cli, config: ShopConfig) -> Result<(), CliError> {
    let state = commands::connect(&config).await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(state.store().pool()).await,
        Commands::Register { username, password } => {
            commands::account::register(&state, &username, &password).await
        }
        Commands::Login {
            username,
            password,
            addr,
        } => commands::account::login(&state, &username, &password, addr).await,
        Commands::Balance { auth } => commands::ledger::balance(&state, auth).await,
        Commands::Deposit { amount, auth } => {
            commands::ledger::deposit(&state, auth, amount).await
        }
        Commands::Purchase { item, auth } => commands::ledger::purchase(&state, auth, item).await,
        Commands::Purchases { auth } => commands::ledger::purchases(&state, auth).await,
        Commands::Items => commands::ledger::items(&state).await,
        Commands::Sweep => commands::sessions::sweep(&state).await,
        Commands::Serve => commands::sessions::serve(&state).await,
    }
}
