//! tokengate - command line frontend for a persisted auth session.
//!
//! `login` and `logout` act on the store directly. Every other command
//! restores the session first (verifying it remotely unless `autoVerify` is
//! off), runs one operation, and prints the resulting session snapshot as
//! JSON.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tokengate_core::{
    AccessGuard, DurableStore, FileStore, HttpClient, KeyringStore, MemoryStore, Principal,
    RemoteAuthEndpoint, Session, SessionConfig, SessionScope,
};

#[derive(Parser, Debug)]
#[command(name = "tokengate", version, about = "Manage a persisted auth session")]
struct Cli {
    /// Base URL of the auth server
    #[arg(long, env = "TOKENGATE_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Session config file (JSON); defaults to the user config directory
    #[arg(long, env = "TOKENGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Where credentials are persisted
    #[arg(long, env = "TOKENGATE_STORE", value_enum, default_value_t = StoreKind::File)]
    store: StoreKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    File,
    Keyring,
    Memory,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the restored session
    Status,
    /// Store a credential as the current session
    Login {
        credential: String,
        #[arg(long)]
        refresh_token: Option<String>,
        /// Principal as a JSON object
        #[arg(long)]
        user: Option<String>,
    },
    /// End the session and clear stored credentials
    Logout,
    /// Check the stored credential against the verify endpoint
    Verify,
    /// Exchange the renewal credential for a new credential
    Refresh,
    /// Replace the stored principal
    SetUser {
        /// Principal as a JSON object
        user: String,
    },
    /// Report what an access guard would do for a protected view
    Guard {
        #[arg(long, default_value = tokengate_core::guard::DEFAULT_REDIRECT)]
        redirect: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn build_store(kind: StoreKind) -> Result<Arc<dyn DurableStore>> {
    Ok(match kind {
        StoreKind::File => Arc::new(FileStore::in_cache_dir()?),
        StoreKind::Keyring => Arc::new(KeyringStore::default()),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    })
}

fn parse_principal(raw: &str) -> Result<Principal> {
    Principal::from_json(raw).context("Principal must be a JSON object with id and email")
}

fn print_snapshot(session: &Session, extra: serde_json::Value) -> Result<()> {
    let mut output = serde_json::to_value(session.snapshot())?;
    if let (Some(output), serde_json::Value::Object(extra)) = (output.as_object_mut(), extra) {
        output.extend(extra);
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    let config_path = match cli.config {
        Some(path) => path,
        None => SessionConfig::default_path()?,
    };
    let config = SessionConfig::load(&config_path)?;
    info!(path = %config_path.display(), auto_verify = config.auto_verify, "Config loaded");

    let endpoint = RemoteAuthEndpoint::new(HttpClient::new(cli.base_url)?);
    let session = Session::new(config, build_store(cli.store)?, Arc::new(endpoint))?;

    // Both replace whatever is stored, so restoring first would only cost a
    // verify round trip
    match cli.command {
        Command::Login {
            credential,
            refresh_token,
            user,
        } => {
            let principal = user.as_deref().map(parse_principal).transpose()?;
            session.login(credential, refresh_token, principal);
            print_snapshot(&session, json!({}))
        }
        Command::Logout => {
            session.logout();
            print_snapshot(&session, json!({}))
        }
        command => run_restored(session, command).await,
    }
}

async fn run_restored(session: Session, command: Command) -> Result<()> {
    let scope = SessionScope::provide(session);
    scope.settled().await;
    let session = scope.session();

    match command {
        Command::Status => print_snapshot(session, json!({})),
        Command::Verify => {
            let ok = session.verify_token(None).await;
            print_snapshot(session, json!({ "ok": ok }))
        }
        Command::Refresh => {
            let ok = session.refresh_access_token().await;
            print_snapshot(session, json!({ "ok": ok }))
        }
        Command::SetUser { user } => {
            session.update_user(parse_principal(&user)?);
            print_snapshot(session, json!({}))
        }
        Command::Guard { redirect } => {
            let guard = AccessGuard::new(session.clone()).with_redirect(redirect);
            let decision = guard.mount().await;
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(())
        }
        Command::Login { .. } | Command::Logout => Ok(()),
    }
}
