//! duochat - terminal client for a two-party chat backend
//!
//! Log in, pick someone from the user list and chat in real time.

mod api;
mod auth;
mod config;
mod models;
mod realtime;
mod session;
mod tui;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::client::ChatClient;
use auth::{require_identity, IdentityStore};
use config::Config;
use models::UserId;

#[derive(Parser)]
#[command(name = "duochat")]
#[command(about = "Terminal client for a two-party chat backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "DUOCHAT_BACKEND_URL")]
    backend: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember who you are
    Login {
        #[arg(short, long)]
        username: Option<String>,

        /// Prompted for (hidden) when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        #[arg(short, long)]
        username: Option<String>,

        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored identity
    Logout,

    /// Show the stored identity and backend
    Status,

    /// List the users you can chat with
    Users,

    /// Print recent messages with a user
    Read {
        /// User id (from `users` output)
        #[arg(short, long)]
        with: UserId,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// User id (from `users` output)
        #[arg(short, long)]
        to: UserId,

        /// Message content
        message: String,
    },

    /// Upload a file and send it as a message
    Upload {
        /// User id (from `users` output)
        #[arg(short, long)]
        to: UserId,

        file: PathBuf,
    },

    /// Print incoming messages from a conversation as they arrive
    Listen {
        /// User id (from `users` output)
        #[arg(short, long)]
        with: UserId,
    },

    /// Open the chat screen
    Chat {
        /// Open the conversation with this user (defaults to the last one)
        #[arg(short, long)]
        with: Option<UserId>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        || tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    // The chat screen owns the terminal, so its logs go to a buffer instead.
    let logs = tui::LogBuffer::new();
    if matches!(cli.command, Commands::Chat { .. }) {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(logs.clone()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }

    let mut config = Config::load()?;
    let backend_url = config.backend_url(cli.backend.as_deref());
    let client = ChatClient::new(backend_url.clone());

    match cli.command {
        Commands::Login { username, password } => {
            auth::login(&client, &mut config, username, password).await?;
        }
        Commands::Signup { username, password } => {
            auth::signup(&client, username, password).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout(&mut config)?;
        }
        Commands::Status => {
            auth::status(&config, &backend_url)?;
        }
        Commands::Users => {
            api::list_users(&client, &config).await?;
        }
        Commands::Read { with, limit } => {
            api::read_messages(&client, &config, with, limit).await?;
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            realtime::send_message(&client, &config, to, &message).await?;
        }
        Commands::Upload { to, file } => {
            tracing::info!("Uploading {}...", file.display());
            realtime::upload(&client, &config, to, &file).await?;
        }
        Commands::Listen { with } => {
            realtime::listen(&client, &config, with).await?;
        }
        Commands::Chat { with } => {
            // Checked before the terminal is taken over or anything is fetched.
            let me = require_identity(&config)?;
            let resume = with.or_else(|| config.resume_partner());
            if tui::run(client, &mut config, me, resume, logs).await? == tui::Exit::LoggedOut {
                println!("Logged out.");
            }
        }
    }

    Ok(())
}
