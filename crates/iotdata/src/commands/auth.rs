//! Login / logout: obtain and store the bearer session.

use dialoguer::{Input, Password};
use secrecy::SecretString;

use iotdata_api::{Client, TransportConfig};
use iotdata_config::StoredSession;
use iotdata_core::EngineConfig;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::error::CliError;
use crate::output;

/// Exchange credentials for a token and persist the session. The role
/// in the reply is the backend's verdict — it is stored verbatim.
pub async fn login(
    engine_config: &EngineConfig,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let username = match args.username {
        Some(name) => name,
        None => Input::<String>::new()
            .with_prompt("Username")
            .interact_text()?,
    };
    let password: SecretString = Password::new().with_prompt("Password").interact()?.into();

    let transport = TransportConfig {
        timeout: engine_config.timeout,
        accept_invalid_certs: engine_config.accept_invalid_certs,
    };
    let reply = Client::login(&engine_config.base_url, &username, &password, &transport).await?;

    iotdata_config::save_session(&StoredSession {
        server: engine_config.base_url.to_string(),
        username: reply.username.clone(),
        role: reply.role.clone(),
        token: reply.token,
    })?;

    output::print_status(
        &format!("logged in as {} ({})", reply.username, reply.role),
        global.quiet,
    );
    Ok(())
}

/// Discard the stored session.
pub fn logout(global: &GlobalOpts) -> Result<(), CliError> {
    iotdata_config::clear_session()?;
    output::print_status("logged out", global.quiet);
    Ok(())
}
