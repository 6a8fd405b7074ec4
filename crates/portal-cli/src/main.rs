//! Executive portal CLI - manage events, registrations and the team from a
//! terminal.
//!
//! The session is kept in the platform cache directory between runs, so
//! `portal sign-in` only has to be run once per refresh-token lifetime.

mod commands;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portal_core::api::ApiClient;
use portal_core::auth::{SessionProvider, SessionStore};
use portal_core::cache::QueryCache;
use portal_core::config::Config;
use portal_core::models::{EventStatus, RegistrationStatus, UserRole};
use portal_core::{ApiError, AuthSync, Portal};

#[derive(Parser)]
#[command(name = "portal", version, about = "UTESCA executive portal")]
struct Cli {
    /// Backend base URL, overriding config and environment
    #[arg(long, global = true, env = "PORTAL_API_URL")]
    api_url: Option<String>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: Option<String>,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Sign out and forget the stored session
    SignOut {
        /// Also remove the remembered password
        #[arg(long)]
        forget: bool,
    },
    /// Show the signed-in member
    Whoami,
    /// Change the signed-in member's password
    ChangePassword,
    /// Email a password reset link
    ForgotPassword { email: String },
    /// Set a new password using the token from a reset link
    ResetPassword {
        #[arg(long)]
        token: String,
    },
    /// Finish an invite: choose a password and create the member record
    AcceptInvite {
        #[arg(long)]
        preferred_name: Option<String>,
    },
    #[command(subcommand)]
    Events(EventsCommand),
    #[command(subcommand)]
    Registrations(RegistrationsCommand),
    #[command(subcommand)]
    Members(MembersCommand),
    #[command(subcommand)]
    Departments(DepartmentsCommand),
}

#[derive(Subcommand)]
enum EventsCommand {
    List {
        #[arg(long)]
        status: Option<EventStatus>,
    },
    Show {
        id: String,
    },
    Create(EventFields),
    Update {
        id: String,
        #[command(flatten)]
        fields: EventFields,
    },
    Delete {
        id: String,
    },
}

/// Event fields; dates are Toronto local time, `YYYY-MM-DDTHH:MM`
#[derive(Args, Default)]
struct EventFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    deadline: Option<String>,
    #[arg(long)]
    capacity: Option<i64>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    status: Option<EventStatus>,
}

#[derive(Subcommand)]
enum RegistrationsCommand {
    List {
        event_id: String,
        #[arg(long)]
        status: Option<RegistrationStatus>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        search: Option<String>,
    },
    Counts {
        event_id: String,
    },
    Show {
        id: String,
    },
    Accept {
        id: String,
    },
    Reject {
        id: String,
    },
    /// Save the CSV export to a directory
    Export {
        event_id: String,
        #[arg(long)]
        status: Option<RegistrationStatus>,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum MembersCommand {
    List {
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        role: Option<UserRole>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },
    Show {
        id: String,
    },
    Invite {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        role: UserRole,
        #[arg(long)]
        display_role: String,
        #[arg(long)]
        department: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        display_role: Option<String>,
        #[arg(long)]
        role: Option<UserRole>,
        #[arg(long)]
        department: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum DepartmentsCommand {
    List {
        #[arg(long)]
        year: Option<i32>,
        /// Include every year
        #[arg(long)]
        all: bool,
    },
    Years,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level, e.g. RUST_LOG=portal_core=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Everything a command needs, wired the same way for every invocation
pub struct Context {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub portal: Portal,
    pub json: bool,
    // Keeps the sync manager alive for as long as the portal is
    _sync: AuthSync,
}

fn build_context(api_url: Option<String>, json: bool) -> Result<Context> {
    let mut config = Config::load()?;
    if let Some(url) = api_url {
        config.api_url = Some(url);
    }

    let cache_dir = config.cache_dir()?;
    let store = Arc::new(
        SessionStore::new(config.auth_url.clone(), config.auth_anon_key.clone())?
            .with_persistence(&cache_dir),
    );
    let provider: Arc<dyn SessionProvider> = store.clone();

    let cache = Arc::new(QueryCache::default());
    let sync = AuthSync::new(provider.clone(), Arc::clone(&cache), config.token_refresh_policy);
    let api = ApiClient::new(&config.api_base_url(), provider)?
        .with_unauthorized_policy(config.unauthorized_policy);
    let portal = Portal::new(api, cache, &sync);

    // Load after the portal is listening so the initial-session event lands
    let restored = store.initialize()?;
    debug!(restored, api_url = %config.api_base_url(), "Context ready");

    Ok(Context {
        config,
        store,
        portal,
        json,
        _sync: sync,
    })
}

fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(api_err) => api_err.user_message(),
        None => format!("{:#}", err),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();
    info!("Portal CLI starting");

    let result = match build_context(cli.api_url, cli.json) {
        Ok(mut ctx) => commands::run(&mut ctx, cli.command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", error_message(&e));
            ExitCode::FAILURE
        }
    }
}
