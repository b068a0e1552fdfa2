//! Conclave host CLI and reference authority.
//!
//! Usage:
//!   conclave serve --port 4020
//!   conclave check com.example.notes --user ada@example.com
//!   conclave decide com.example.notes ada@example.com accepted
//!
//! Host commands keep gate state in a SQLite file (`--db`, default under the
//! user data directory) and reach the authority described by `--config`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use conclave_cli::{AuthorityState, DecisionRequest, build_router};
use conclave_license::{
    EntitlementGate, EntitlementRecord, EntitlementStatus, GateConfig, IdentityProvider,
    LicenseError, Origin, RemoteService,
};
use conclave_remote::{
    CodePrompt, FixedIdentity, HttpEntitlementStore, HttpStoreConfig, MemoryEntitlementStore,
    OAuthConfig, OAuthIdentityProvider,
};
use conclave_storage::SqlitePreferences;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Conclave entitlement gate host and reference authority")]
struct Args {
    /// JSON configuration file (gate, store and oauth sections)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Preference database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reference entitlement authority
    Serve {
        /// HTTP port to listen on
        #[arg(short, long, default_value = "4020")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Check whether an application may run, then sync with the authority
    Check {
        app: String,

        /// Sign in as this email instead of running OAuth
        #[arg(long)]
        user: Option<String>,

        /// Decide locally only
        #[arg(long)]
        offline: bool,
    },
    /// Sync with the authority without spending a trial launch
    Sync {
        app: String,

        /// Sign in as this email instead of running OAuth
        #[arg(long)]
        user: Option<String>,
    },
    /// Print the local gate state
    Status { app: String },
    /// Set the remaining trial launches
    SetTrial { app: String, allowance: u32 },
    /// Approve or reject a user on the authority
    Decide {
        app: String,
        user: String,
        #[arg(value_parser = parse_status)]
        status: EntitlementStatus,
    },
}

/// Contents of the `--config` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct CliConfig {
    gate: GateConfig,
    store: HttpStoreConfig,
    oauth: OAuthConfig,
}

impl CliConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Reads the authorization code from stdin; an empty line cancels.
struct StdinPrompt;

#[async_trait]
impl CodePrompt for StdinPrompt {
    async fn request_code(&self, auth_url: &str) -> Option<String> {
        eprintln!("Open this URL to sign in:\n\n  {auth_url}\n");
        eprint!("Paste the authorization code (empty to cancel): ");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .ok()?;
        let code = line.trim();
        (!code.is_empty()).then(|| code.to_string())
    }
}

fn parse_status(raw: &str) -> Result<EntitlementStatus, LicenseError> {
    raw.to_ascii_uppercase().parse()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = CliConfig::load(args.config.as_deref())?;
    debug!("Loaded config: {:?}", config.gate);

    match args.command {
        Command::Serve { port, bind } => serve(&config, &bind, port).await,
        Command::Check { app, user, offline } => {
            let gate = open_gate(&args.db, &config, &app, user.as_deref(), !offline)?;
            check(&gate).await
        }
        Command::Sync { app, user } => {
            let gate = open_gate(&args.db, &config, &app, user.as_deref(), true)?;
            let outcome = gate.synchronize().await.context("sync failed")?;
            println!("{outcome:?}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Status { app } => {
            let gate = open_gate(&args.db, &config, &app, None, false)?;
            let snapshot = gate.snapshot()?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::SetTrial { app, allowance } => {
            let gate = open_gate(&args.db, &config, &app, None, false)?;
            gate.set_trial_allowance(allowance)?;
            println!("{app}: {allowance} trial launches left");
            Ok(ExitCode::SUCCESS)
        }
        Command::Decide { app, user, status } => {
            let record = decide(&config.store, &app, &user, status).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn serve(config: &CliConfig, bind: &str, port: u16) -> Result<ExitCode> {
    let mut state = AuthorityState::new(Arc::new(MemoryEntitlementStore::new()));
    if let Some(token) = &config.store.api_token {
        state = state.with_api_token(token.clone());
    }
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("binding {bind}:{port}"))?;
    info!("Entitlement authority listening on {}:{}", bind, port);
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;
    Ok(ExitCode::SUCCESS)
}

fn open_gate(
    db: &Option<PathBuf>,
    config: &CliConfig,
    app: &str,
    user: Option<&str>,
    with_remote: bool,
) -> Result<EntitlementGate> {
    let path = match db {
        Some(path) => path.clone(),
        None => conclave_storage::default_database_path()
            .context("no data directory on this platform, pass --db")?,
    };
    let prefs = SqlitePreferences::open(&path)
        .with_context(|| format!("opening preferences at {}", path.display()))?;

    let mut builder = EntitlementGate::builder(app)
        .config(config.gate.clone())
        .preferences(Arc::new(prefs))
        .on_first_run(|gate| {
            println!("First launch of {}", gate.application_id());
            Ok(())
        });

    if with_remote {
        let store = config.store.clone();
        let oauth = config.oauth.clone();
        let user = user.map(str::to_string);
        builder = builder.remote(move |name| {
            let identity: Arc<dyn IdentityProvider> = match &user {
                Some(email) => Arc::new(FixedIdentity::email(email.clone())),
                None => Arc::new(OAuthIdentityProvider::new(
                    oauth.clone(),
                    Arc::new(StdinPrompt),
                )?),
            };
            let store = HttpEntitlementStore::new(store.clone())?;
            Ok(RemoteService::new(name, identity, Arc::new(store)))
        });
    }

    Ok(builder.build()?)
}

async fn check(gate: &EntitlementGate) -> Result<ExitCode> {
    // Latest decision wins: the remote one, when it arrives, follows the local one.
    let usable = Arc::new(AtomicBool::new(false));
    let latest = usable.clone();
    let check = gate.check_validity(move |decision| {
        let origin = match decision.origin {
            Origin::Local => "local",
            Origin::Remote => "remote",
        };
        let verdict = if decision.usable { "usable" } else { "blocked" };
        println!("[{}] {} ({})", origin, verdict, decision.token);
        latest.store(decision.usable, Ordering::SeqCst);
    })?;
    check.finished().await;

    info!("{} is {} locally", gate.application_id(), gate.status()?);
    Ok(if usable.load(Ordering::SeqCst) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn decide(
    store: &HttpStoreConfig,
    app: &str,
    user: &str,
    status: EntitlementStatus,
) -> Result<EntitlementRecord> {
    let url = format!(
        "{}/v1/apps/{}/users/{}/decision",
        store.base_url.trim_end_matches('/'),
        urlencoding::encode(app),
        urlencoding::encode(user)
    );
    let mut request = reqwest::Client::new()
        .post(&url)
        .json(&DecisionRequest { status });
    if let Some(token) = &store.api_token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.with_context(|| format!("POST {url}"))?;
    if !response.status().is_success() {
        let code = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("authority refused decision: {code} {body}");
    }
    response.json().await.context("parsing decision response")
}
