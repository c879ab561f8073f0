//! Device command handlers.

use serde::Serialize;
use tabled::Tabled;

use iotdata_core::Engine;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled, Serialize)]
struct DeviceRow {
    #[tabled(rename = "ESN")]
    esn: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Messages")]
    messages: usize,
    #[tabled(rename = "Shared With")]
    shared_with: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    engine: &Engine,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let rows: Vec<DeviceRow> = engine
                .store()
                .groups()
                .into_iter()
                .map(|g| DeviceRow {
                    esn: g.esn.clone(),
                    name: g.device_name.clone().unwrap_or_default(),
                    messages: g.len(),
                    shared_with: g.shared_with.join(", "),
                })
                .collect();

            let rendered = output::render_list(&global.output, &rows, |r| r.esn.clone());
            output::print_output(&rendered, global.quiet);
        }

        DevicesCommand::Rename { esn, name } => {
            // Route through the edit guard so the rename is shielded
            // from concurrent refreshes until the backend confirms.
            engine.begin_rename(&esn)?;
            engine.update_rename_draft(&esn, &name)?;
            if let Err(e) = engine.commit_rename(&esn).await {
                engine.cancel_rename(&esn);
                return Err(e.into());
            }
            output::print_status(&format!("renamed {esn} to {name}"), global.quiet);
        }
    }
    Ok(())
}
