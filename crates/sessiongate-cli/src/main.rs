//! sessiongate - sign in to an auth service from the terminal.
//!
//! Each invocation restores the session from the stored token, runs one
//! command, and prints where the application would navigate next.

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sessiongate_core::auth::token;
use sessiongate_core::models::DEFAULT_ROLE;
use sessiongate_core::{AuthContext, Config, NavigationReceiver, Registration, Route, Session};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Read passwords from here instead of prompting (scripts, CI)
const PASSWORD_ENV: &str = "SESSIONGATE_PASSWORD";

#[derive(Parser)]
#[command(name = "sessiongate", version, about = "Token session manager for the auth service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the token
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show session and token status
    Status,
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        /// Date of birth, YYYY-MM-DD
        #[arg(long)]
        dob: NaiveDate,
        #[arg(long, default_value = DEFAULT_ROLE)]
        role: String,
    },
    /// Request a password reset
    Forgot {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset token
    Reset {
        #[arg(long)]
        token: String,
    },
    /// Check whether a route may be entered
    Open { route: String },
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

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    debug!(api = %config.api_base_url, storage = %config.storage, "Config loaded");

    let (ctx, mut navigation) = AuthContext::new(config.clone())?;
    let _session_log = ctx.state.subscribe(|session: &Session| {
        debug!(
            authenticated = session.is_authenticated,
            user_id = session.user.as_ref().map(|u| u.id),
            "Session changed"
        );
    });

    ctx.gateway.initialize().settled().await;

    let result = run(&ctx, &config, cli.command).await;
    print_navigation(&mut navigation);

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(ctx: &AuthContext, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email {
                Some(e) => e,
                None => prompt_email(config.last_email.as_deref())?,
            };
            let password = password("Password: ")?;

            let response = ctx.gateway.login(&email, &password).await?;
            if let Some(user) = response.user {
                println!("Signed in as {} <{}>", user.full_name, user.email);
            }

            if let Err(e) = Config::remember_email(&email) {
                warn!(error = %e, "Failed to save config");
            }
        }
        Command::Logout => {
            ctx.gateway.logout();
            println!("Signed out");
        }
        Command::Whoami { json } => {
            let session = ctx.state.current();
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_session(&session);
            }
        }
        Command::Status => {
            let live = ctx.gateway.revalidate();
            println!("Storage:  {}", ctx.store.backend());
            println!("Service:  {}", config.api_base_url);
            match ctx.store.read() {
                Some(stored) if live => {
                    let minutes = token::minutes_until_expiry(&stored, Utc::now());
                    println!("Session:  active, token expires in {}m", minutes);
                }
                _ => println!("Session:  none"),
            }
        }
        Command::Register {
            name,
            email,
            phone,
            dob,
            role,
        } => {
            let password = password("Password: ")?;
            let confirm_password = password_confirm("Confirm password: ", &password)?;
            let registration = Registration {
                full_name: name,
                email,
                password,
                confirm_password,
                phone_number: phone,
                date_of_birth: dob,
                role,
            };
            ctx.gateway.register(&registration).await?;
            println!("Registration successful! You can now log in.");
        }
        Command::Forgot { email } => {
            let response = ctx.gateway.forgot_password(&email).await?;
            if let Some(message) = response.message {
                println!("{}", message);
            }
            if let Some(reset_token) = response.token {
                if confirm("Reset the password now? [Y/n]: ")? {
                    reset(ctx, &reset_token).await?;
                } else {
                    println!("Reset token: {}", reset_token);
                }
            }
        }
        Command::Reset { token } => reset(ctx, &token).await?,
        Command::Open { route } => {
            let route = Route::new(route);
            if ctx.gate.can_enter(&route) {
                println!("Access to {} allowed", route);
            } else {
                println!("Access to {} denied", route);
            }
        }
    }
    Ok(())
}

async fn reset(ctx: &AuthContext, reset_token: &str) -> Result<()> {
    let new_password = password("New password: ")?;
    let confirm_password = password_confirm("Confirm new password: ", &new_password)?;
    let response = ctx
        .gateway
        .reset_password(reset_token, &new_password, &confirm_password)
        .await?;
    println!(
        "{}",
        response.message.as_deref().unwrap_or("Password has been reset.")
    );
    Ok(())
}

fn print_session(session: &Session) {
    match session.user {
        Some(ref user) => {
            println!("{}", user.full_name);
            println!("  Email:      {}", user.email);
            println!("  Phone:      {}", user.phone_number);
            println!("  Born:       {}", user.birth_date_display());
            println!("  Role:       {}", user.role);
            println!("  Status:     {}", user.status_display());
            println!("  Member since {}", user.created_display());
        }
        None if session.is_loading() => println!("Signed in, user details unavailable"),
        None => println!("Not signed in"),
    }
}

fn print_navigation(navigation: &mut NavigationReceiver) {
    while let Ok(route) = navigation.try_recv() {
        info!(route = %route, "Navigate");
        eprintln!("-> {}", route);
    }
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last) {
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => Err(anyhow::anyhow!("Email required")),
        (false, _) => Ok(input.to_string()),
    }
}

fn password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(prompt).context("Failed to read password")
}

/// Second entry of a password; the service checks that both match
fn password_confirm(prompt: &str, first: &str) -> Result<String> {
    if std::env::var(PASSWORD_ENV).is_ok() {
        return Ok(first.to_string());
    }
    rpassword::prompt_password(prompt).context("Failed to read password")
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase() != "n")
}
