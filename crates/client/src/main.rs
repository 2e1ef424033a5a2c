//! `slotbook` command-line client.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use slotbook_auth::{Role, decode, is_expired};
use slotbook_client::{
    AuthController, ClientConfig, Credentials, HttpAuthApi, KeyValueStore, MemoryStore,
    PersistentSlot, Registration, SqliteStore,
};
use slotbook_events::LogoutBus;

#[derive(Debug, Parser)]
#[command(name = "slotbook", version, about = "SlotBook session client")]
struct Cli {
    /// Override the API base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep the session in memory only.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an account.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "SLOTBOOK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "trainer")]
        role: Role,
    },
    /// Log in and store the issued token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SLOTBOOK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the current session.
    Whoami,
    /// Forget the stored token.
    Logout,
    /// Print the claims carried by a token without storing it.
    Decode { token: String },
}

#[derive(Debug, Serialize)]
struct DecodedToken {
    claims: slotbook_auth::Claims,
    expired: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
        config.validate().context("invalid --api-url")?;
    }

    slotbook_observability::init(config.log_format);
    tracing::debug!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "configuration loaded");

    match cli.command {
        Command::Register {
            name,
            email,
            password,
            role,
        } => {
            let api = HttpAuthApi::from_config(&config)?;
            let message = api
                .register(&Registration {
                    name,
                    email,
                    password,
                    role,
                })
                .await
                .context("registration failed")?;
            println!("{message}");
        }
        Command::Login { email, password } => {
            let controller = open_session(&config, cli.ephemeral).await;
            let api = HttpAuthApi::from_config(&config)?;
            let outcome = controller
                .login_with(&api, &Credentials::new(email, password))
                .await
                .context("login failed")?;
            print_json(&outcome)?;
            warn_if_degraded(&controller);
        }
        Command::Whoami => {
            let controller = open_session(&config, cli.ephemeral).await;
            print_json(&controller.state())?;
            warn_if_degraded(&controller);
        }
        Command::Logout => {
            let controller = open_session(&config, cli.ephemeral).await;
            controller.logout().await;
            print_json(&controller.state())?;
            warn_if_degraded(&controller);
        }
        Command::Decode { token } => {
            let claims = decode(&token).context("token could not be decoded")?;
            let expired = is_expired(&claims);
            print_json(&DecodedToken { claims, expired })?;
        }
    }

    Ok(())
}

/// Build a controller over the configured store and restore its session.
async fn open_session(config: &ClientConfig, ephemeral: bool) -> AuthController {
    let store: Arc<dyn KeyValueStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(config.database_path()))
    };
    let controller = AuthController::new(PersistentSlot::new(store), LogoutBus::new());
    controller.init().await;
    controller
}

fn warn_if_degraded(controller: &AuthController) {
    if controller.slot().is_degraded() {
        tracing::warn!("session was kept in memory only and will not survive this process");
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}
