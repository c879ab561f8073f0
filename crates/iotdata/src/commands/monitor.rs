//! Live monitor: grouped message view that re-renders on store changes.

use owo_colors::OwoColorize;

use iotdata_core::{DeviceGroup, Engine};

use crate::cli::MonitorArgs;
use crate::error::CliError;

pub async fn handle(engine: &Engine, args: MonitorArgs) -> Result<(), CliError> {
    let search = args.search.clone().unwrap_or_default();

    render(&engine.store().groups(), &search, args.tail);
    if args.once {
        return Ok(());
    }

    let mut messages = engine.store().subscribe_messages();
    let mut state = engine.connection_state();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = messages.changed() => {
                if changed.is_none() {
                    break;
                }
                println!();
                render(&engine.store().groups(), &search, args.tail);
            }

            Ok(()) = state.changed() => {
                let current = state.borrow_and_update().clone();
                if current == iotdata_core::ConnectionState::SessionExpired {
                    return Err(CliError::from(iotdata_core::CoreError::SessionExpired));
                }
            }
        }
    }

    Ok(())
}

fn render(groups: &[DeviceGroup], search: &str, tail: usize) {
    let visible: Vec<&DeviceGroup> = groups.iter().filter(|g| g.matches_search(search)).collect();

    if visible.is_empty() {
        println!("{}", "no messages yet — waiting for devices".dimmed());
        return;
    }

    for group in visible {
        let name = group.device_name.as_deref().unwrap_or("(unnamed)");
        println!(
            "{}  {}  {}",
            name.bold(),
            format!("ESN {}", group.esn).dimmed(),
            format!("{} msgs", group.len()).cyan(),
        );
        if !group.shared_with.is_empty() {
            println!("  {}", format!("shared with: {}", group.shared_with.join(", ")).dimmed());
        }
        for message in group.messages.iter().take(tail) {
            println!(
                "  {}  {}",
                message.received_at.format("%d/%m %H:%M:%S").to_string().dimmed(),
                message.payload
            );
        }
        if group.len() > tail {
            println!("  {}", format!("… {} older", group.len() - tail).dimmed());
        }
    }
}
