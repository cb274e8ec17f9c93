//! proxam-sessionctl - Session control CLI for the Proxam client
//!
//! Drives the session layer from a terminal: log in and out, inspect the
//! persisted session, evaluate route access, and manage the
//! configuration file.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use proxam_session::claims::Role;
use proxam_session::config::{self, SessionConfig};
use proxam_session::error::SessionError;
use proxam_session::gateway::{LoginContext, LoginCredentials, SignupRequest};
use proxam_session::guard::{AccessDecision, AccessGuard, Surface};
use proxam_session::permissions;
use proxam_session::store::SessionStore;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // First run writes a default config file, except for the config
    // subcommands, which manage the file explicitly.
    let config_path = resolve_config_path(cli.config.as_deref())?;
    if !matches!(cli.command, Command::Config { .. }) && !config_path.exists() {
        config::write_default_config(&config_path)?;
    }

    let mut config = SessionConfig::load_from(&config_path)?;
    if let Some(server) = cli.server.clone() {
        config.server_url = server;
    }

    match cli.command {
        Command::Login {
            email,
            password,
            context,
        } => handle_login(&config, &email, password, &context, cli.json).await,
        Command::Signup {
            name,
            email,
            password,
            role,
            organization,
            department,
        } => {
            handle_signup(
                &config,
                name,
                email,
                password,
                role,
                organization,
                department,
                cli.json,
            )
            .await
        }
        Command::Logout => handle_logout(&config, cli.json),
        Command::Status => handle_status(&config, cli.json).await,
        Command::CheckAccess { path, role } => {
            handle_check_access(&config, &path, role.as_deref(), cli.json).await
        }
        Command::Routes => handle_routes(cli.json),
        Command::HashPassword { password, cost } => handle_hash_password(password, cost),
        Command::Config { command } => {
            handle_config(&config, command, cli.config.as_deref(), cli.json)
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "proxam-sessionctl",
    author,
    version,
    about = "Session control CLI for the Proxam client - log in, inspect, and check access."
)]
struct Cli {
    /// Identity service URL (overrides the configured one)
    #[arg(long, short = 's', env = "PROXAM_SERVER_URL")]
    server: Option<String>,

    /// Output machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to config file (auto-detected if not set)
    #[arg(long, short = 'c', env = "PROXAM_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and persist the session
    Login {
        /// Account email
        email: String,

        /// Password (prompted when omitted)
        #[arg(long, short = 'p')]
        password: Option<String>,

        /// Login surface: admin or candidate
        #[arg(long, default_value = "candidate")]
        context: String,
    },

    /// Create an account and persist the granted session
    Signup {
        /// Display name
        name: String,

        /// Account email
        email: String,

        /// Password (prompted when omitted)
        #[arg(long, short = 'p')]
        password: Option<String>,

        /// Requested role (defaults to candidate)
        #[arg(long)]
        role: Option<String>,

        /// Organization name, for examiner accounts
        #[arg(long)]
        organization: Option<String>,

        /// Department within the organization
        #[arg(long)]
        department: Option<String>,
    },

    /// Drop the current session
    Logout,

    /// Show the current session
    Status,

    /// Evaluate access to a route, for the signed-in user or a given role
    CheckAccess {
        /// Route path, e.g. /dashboard/settings
        path: String,

        /// Evaluate for this role instead of the current session
        #[arg(long)]
        role: Option<String>,
    },

    /// List the route permission table
    Routes,

    /// Hash a password with bcrypt (for fallback user entries)
    HashPassword {
        /// Password to hash (prompted or read from stdin when omitted)
        password: Option<String>,

        /// Bcrypt cost factor
        #[arg(long, default_value = "12")]
        cost: u32,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proxam_session={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

async fn handle_login(
    config: &SessionConfig,
    email: &str,
    password: Option<String>,
    context: &str,
    json: bool,
) -> Result<()> {
    let context: LoginContext = context.parse().map_err(|err: String| anyhow!(err))?;
    let password = resolve_password(password)?;

    let store = SessionStore::from_config(config)?;
    let credentials = LoginCredentials {
        email: email.to_string(),
        password,
    };

    match store.login(&credentials, context).await {
        Ok(user) => {
            if json {
                let result = serde_json::json!({
                    "success": true,
                    "user": user,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Logged in as {} ({})", user.email, user.role);
            }
            Ok(())
        }
        Err(SessionError::Denied(message)) => report_denied(message, json),
        Err(err) => Err(err.into()),
    }
}

async fn handle_signup(
    config: &SessionConfig,
    name: String,
    email: String,
    password: Option<String>,
    role: Option<String>,
    organization: Option<String>,
    department: Option<String>,
    json: bool,
) -> Result<()> {
    let role = role
        .map(|role| role.parse::<Role>())
        .transpose()
        .map_err(|err| anyhow!(err))?;
    let password = resolve_password(password)?;

    let store = SessionStore::from_config(config)?;
    let request = SignupRequest {
        name,
        email,
        password,
        role,
        organization_name: organization,
        department,
    };

    match store.signup(&request).await {
        Ok(user) => {
            if json {
                let result = serde_json::json!({
                    "success": true,
                    "user": user,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Account created for {} ({})", user.email, user.role);
            }
            Ok(())
        }
        Err(SessionError::Denied(message)) => report_denied(message, json),
        Err(err) => Err(err.into()),
    }
}

fn report_denied(message: String, json: bool) -> Result<()> {
    if json {
        let result = serde_json::json!({
            "success": false,
            "error": message,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    } else {
        Err(anyhow!(message))
    }
}

fn handle_logout(config: &SessionConfig, json: bool) -> Result<()> {
    let store = SessionStore::from_config(config)?;
    store.logout()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "success": true }))?
        );
    } else {
        println!("Logged out");
    }
    Ok(())
}

async fn handle_status(config: &SessionConfig, json: bool) -> Result<()> {
    let store = SessionStore::from_config(config)?;
    let snapshot = store.check_auth().await;

    if json {
        let result = serde_json::json!({
            "authenticated": snapshot.is_authenticated,
            "initialized": snapshot.initialized,
            "user": snapshot.user,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match snapshot.user {
        Some(user) => {
            println!("Signed in");
            println!("  Email:        {}", user.email);
            println!("  Name:         {}", user.name);
            println!("  Role:         {}", user.role);
            if let Some(org) = user.organization_id {
                println!("  Organization: {}", org);
            }
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn handle_check_access(
    config: &SessionConfig,
    path: &str,
    role: Option<&str>,
    json: bool,
) -> Result<()> {
    // With an explicit role this is a pure table lookup; without one, run
    // the full decision for the persisted session.
    if let Some(role) = role {
        let role: Role = role.parse().map_err(|err: String| anyhow!(err))?;
        let allowed = permissions::evaluate(path, role);
        if json {
            let result = serde_json::json!({
                "path": path,
                "role": role,
                "allowed": allowed,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if allowed {
            println!("{} may access {}", role, path);
        } else {
            println!("{} is denied access to {}", role, path);
        }
        return Ok(());
    }

    let store = Arc::new(SessionStore::from_config(config)?);
    let guard = AccessGuard::new(store);
    let decision = guard.authorize(&Surface::restricted(path)).await;

    if json {
        let label = match &decision {
            AccessDecision::Allowed => "allowed",
            AccessDecision::Forbidden => "forbidden",
            AccessDecision::RedirectToLogin { .. } => "redirect_to_login",
            AccessDecision::Initializing => "initializing",
        };
        let result = serde_json::json!({
            "path": path,
            "decision": label,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match decision {
        AccessDecision::Allowed => println!("Access granted to {}", path),
        AccessDecision::Forbidden => println!("Access to {} is forbidden for the signed-in role", path),
        AccessDecision::RedirectToLogin { return_to } => {
            println!("Not signed in (login would return to {})", return_to)
        }
        AccessDecision::Initializing => println!("Session not initialized yet"),
    }
    Ok(())
}

fn handle_routes(json: bool) -> Result<()> {
    if json {
        let entries: Vec<_> = permissions::ROUTE_PERMISSIONS
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "path": entry.path,
                    "allowedRoles": entry.allowed_roles,
                    "description": entry.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<24} {:<20} {}", "PATH", "ROLES", "DESCRIPTION");
    println!("{}", "-".repeat(76));
    for entry in permissions::ROUTE_PERMISSIONS {
        let roles = entry
            .allowed_roles
            .iter()
            .map(|role| role.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<24} {:<20} {}", entry.path, roles, entry.description);
    }
    println!();
    println!("Paths not listed are admin-only.");
    Ok(())
}

/// Hash a password using bcrypt and print only the hash to stdout, for
/// pasting into `[[fallback.users]]` entries.
fn handle_hash_password(password: Option<String>, cost: u32) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            if io::stdin().is_terminal() {
                read_password("Password: ")?
            } else {
                // Reading from a pipe
                let mut buf = String::new();
                io::stdin().read_line(&mut buf)?;
                buf.trim().to_string()
            }
        }
    };

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let hash = bcrypt::hash(&password, cost).context("Failed to hash password")?;
    println!("{hash}");
    Ok(())
}

fn handle_config(
    config: &SessionConfig,
    command: ConfigCommand,
    override_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                print!("{}", toml::to_string_pretty(config)?);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            let path = resolve_config_path(override_path)?;
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Init => {
            let path = resolve_config_path(override_path)?;
            if path.exists() {
                anyhow::bail!("config file already exists at {}", path.display());
            }
            config::write_default_config(&path)?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
    }
}

fn resolve_config_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config::default_config_file()?),
    }
}

fn resolve_password(password: Option<String>) -> Result<String> {
    let password = match password {
        Some(password) => password,
        None => read_password("Password: ")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}

// Prompt on stderr so stdout stays machine-readable.
fn read_password(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    Ok(buf.trim().to_string())
}
