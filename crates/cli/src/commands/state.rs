use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;

use shipwatch_core::state::SnapshotLoad;

use crate::config::AppConfig;

#[derive(Args)]
pub struct StateArgs {
    /// Show a single order
    #[arg(long)]
    order: Option<String>,

    /// Only show orders with this status
    #[arg(long)]
    status: Option<String>,
}

pub async fn run(args: StateArgs, config_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let store = config.state_store();

    let snapshot = match store.try_load().await {
        SnapshotLoad::Loaded(snapshot) => snapshot,
        SnapshotLoad::Absent => {
            println!("No state file at {}.", store.path().display());
            return Ok(());
        }
        SnapshotLoad::Corrupt { reason } => {
            anyhow::bail!("state file {} is unreadable: {reason}", store.path().display())
        }
    };

    let rows: Vec<_> = snapshot
        .entries
        .iter()
        .filter(|(id, _)| args.order.as_deref().is_none_or(|o| o == id.as_str()))
        .filter(|(_, status)| args.status.as_deref().is_none_or(|s| s == status.as_str()))
        .collect();

    if rows.is_empty() {
        println!("No matching orders.");
        return Ok(());
    }

    let shipped = &config.poll.transition_to;
    println!("{:<30} {:<20}", "ORDER", "STATUS");
    println!("{}", "-".repeat(50));
    for (id, status) in &rows {
        let shown = if *status == shipped {
            style(format!("{status:<20}")).green()
        } else {
            style(format!("{status:<20}"))
        };
        println!("{id:<30} {shown}");
    }
    println!();
    println!("{} of {} orders", rows.len(), snapshot.len());
    Ok(())
}
