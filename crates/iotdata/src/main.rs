//! `iotdata` — operations console for the IoTData telemetry platform.

mod cli;
mod commands;
mod error;
mod output;

use std::str::FromStr;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use iotdata_core::{Engine, Role, Session};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    run(cli).await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;

    let config = iotdata_config::load()?;
    let stored = iotdata_config::load_session()?;

    // --server / profile beat the stored session's server.
    let server_override = global
        .server
        .clone()
        .or_else(|| stored.as_ref().map(|s| s.server.clone()));
    let (mut engine_config, profile_token) =
        iotdata_config::resolve(&config, global.profile.as_deref(), server_override.as_deref())?;
    if global.insecure {
        engine_config.accept_invalid_certs = true;
    }

    // Login and logout never need a connected engine.
    let command = match command {
        Command::Login(args) => {
            return commands::auth::login(&engine_config, args, &global).await;
        }
        Command::Logout => return commands::auth::logout(&global),
        other => other,
    };

    let session = build_session(&global, stored, profile_token)?;
    let engine = Engine::new(engine_config, session);

    if let Err(e) = engine.connect().await {
        return Err(handle_session_expiry(CliError::from(e)));
    }

    let result = dispatch(&engine, command, &global).await;
    engine.disconnect().await;
    result.map_err(handle_session_expiry)
}

async fn dispatch(engine: &Engine, command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        Command::Monitor(args) => commands::monitor::handle(engine, args).await,
        Command::Devices(args) => commands::devices::handle(engine, args, global).await,
        Command::Access(args) => commands::access::handle(engine, args, global).await,
        Command::Users(args) => commands::users::handle(engine, args, global).await,
        Command::Audit(args) => commands::audit::handle(engine, args, global).await,
        Command::Login(_) | Command::Logout => unreachable!("handled before connect"),
    }
}

/// Build the session context: an explicit --token wins, then the stored
/// login, then a token carried by the profile.
fn build_session(
    global: &GlobalOpts,
    stored: Option<iotdata_config::StoredSession>,
    profile_token: Option<SecretString>,
) -> Result<Session, CliError> {
    if let Some(ref token) = global.token {
        let role = global
            .role
            .as_deref()
            .map(Role::from_str)
            .transpose()
            .map_err(|_| CliError::message("invalid --role (user, support, admin, master)"))?
            .unwrap_or(Role::User);
        return Ok(Session::new(
            "operator",
            role,
            SecretString::from(token.clone()),
        ));
    }

    if let Some(stored) = stored {
        return Ok(stored.to_session());
    }

    if let Some(token) = profile_token {
        return Ok(Session::new("operator", Role::User, token));
    }

    Err(CliError::Config(iotdata_config::ConfigError::NoSession))
}

/// On a 401, the stored token is dead: clear it so the next invocation
/// prompts for a fresh login.
fn handle_session_expiry(err: CliError) -> CliError {
    if err.is_session_expired() {
        if let Err(e) = iotdata_config::clear_session() {
            tracing::warn!(error = %e, "failed to clear stored session");
        }
        return CliError::message("session expired — run `iotdata login` to sign in again");
    }
    err
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "iotdata={default},iotdata_core={default},iotdata_api={default}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
