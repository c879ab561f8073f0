//! Output formatting: table, JSON, plain.
//!
//! Table uses `tabled`, JSON serializes via serde, plain emits one
//! identifier per line for scripting.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;

/// Render a list of rows in the chosen format.
///
/// Rows serve both renderers: `Tabled` for the table, serde for JSON.
/// `id_fn` picks the one-per-line value for plain output.
pub fn render_list<R>(format: &OutputFormat, rows: &[R], id_fn: impl Fn(&R) -> String) -> String
where
    R: Tabled + serde::Serialize,
{
    match format {
        OutputFormat::Table => Table::new(rows).with(Style::rounded()).to_string(),
        OutputFormat::Json => render_json(rows),
        OutputFormat::Plain => rows.iter().map(id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Print rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// A short status line (mutation confirmations), suppressed by quiet.
pub fn print_status(message: &str, quiet: bool) {
    if !quiet {
        println!("{message}");
    }
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}
