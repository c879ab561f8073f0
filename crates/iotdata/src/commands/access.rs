//! Access-grant command handlers: the permission matrix and the
//! grant/revoke intents it issues.

use serde::Serialize;
use tabled::Tabled;

use iotdata_core::{AccessAction, AccessIntent, Engine, permission_matrix};

use crate::cli::{AccessArgs, AccessCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled, Serialize)]
struct MatrixTableRow {
    #[tabled(rename = "Access")]
    access: String,
    #[tabled(rename = "ESN")]
    esn: String,
    #[tabled(rename = "Name")]
    name: String,
}

pub async fn handle(
    engine: &Engine,
    args: AccessArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AccessCommand::Show { username } => {
            let user = engine
                .store()
                .user_by_username(&username)
                .ok_or_else(|| CliError::message(format!("unknown user: {username}")))?;
            let devices = engine.store().devices_snapshot();

            let rows: Vec<MatrixTableRow> = permission_matrix(&user, &devices)
                .into_iter()
                .map(|row| MatrixTableRow {
                    access: if row.granted { "granted".into() } else { "-".into() },
                    esn: row.device.esn.clone(),
                    name: row.device.name.clone().unwrap_or_default(),
                })
                .collect();

            let rendered = output::render_list(&global.output, &rows, |r| r.esn.clone());
            output::print_output(&rendered, global.quiet);
        }

        AccessCommand::Grant { username, esn } => {
            let intent = resolve_intent(engine, &username, &esn, AccessAction::Grant)?;
            engine.set_permission(intent).await?;
            output::print_status(&format!("granted {esn} to {username}"), global.quiet);
        }

        AccessCommand::Revoke { username, esn } => {
            let intent = resolve_intent(engine, &username, &esn, AccessAction::Revoke)?;
            engine.set_permission(intent).await?;
            output::print_status(&format!("revoked {esn} from {username}"), global.quiet);
        }
    }
    Ok(())
}

/// Map username + ESN onto the id-based intent the coordinator expects.
fn resolve_intent(
    engine: &Engine,
    username: &str,
    esn: &str,
    action: AccessAction,
) -> Result<AccessIntent, CliError> {
    let user = engine
        .store()
        .user_by_username(username)
        .ok_or_else(|| CliError::message(format!("unknown user: {username}")))?;
    let device = engine
        .store()
        .device_by_esn(esn)
        .ok_or_else(|| CliError::message(format!("unknown device: {esn}")))?;
    Ok(AccessIntent {
        user_id: user.id,
        device_id: device.id,
        action,
    })
}
