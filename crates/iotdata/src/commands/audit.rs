//! Audit trail viewer.

use serde::Serialize;
use tabled::Tabled;

use iotdata_core::Engine;

use crate::cli::{AuditArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled, Serialize)]
struct AuditRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Details")]
    details: String,
    #[tabled(rename = "IP")]
    ip: String,
}

pub async fn handle(engine: &Engine, args: AuditArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let search = args.search.unwrap_or_default();

    let rows: Vec<AuditRow> = engine
        .audit_log()
        .await?
        .into_iter()
        .filter(|entry| entry.matches_search(&search))
        .map(|entry| AuditRow {
            when: entry.created_at,
            user: entry.username,
            action: entry.action,
            details: entry.details,
            ip: entry.ip_address,
        })
        .collect();

    let rendered = output::render_list(&global.output, &rows, |r| {
        format!("{} {} {}", r.when, r.user, r.action)
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}
