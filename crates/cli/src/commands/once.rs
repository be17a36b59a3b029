use std::path::Path;

use anyhow::Result;
use clap::Args;

use shipwatch_core::poll::{CycleOutcome, CycleReport};

use crate::config::AppConfig;
use crate::progress;

#[derive(Args)]
pub struct OnceArgs;

pub async fn run(_args: OnceArgs, config_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(config_path)?.resolve()?;
    let mut poll = config.open_poll_loop().await?;

    let spinner = progress::create_spinner("Polling orders...");
    let report = poll.run_cycle().await;
    spinner.finish_and_clear();

    print_report(&report);
    if let CycleOutcome::Aborted(reason) = &report.outcome {
        anyhow::bail!("cycle aborted: {reason}");
    }
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!(
        "Cycle at {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if report.is_aborted() {
        return;
    }
    println!("  Orders seen:     {}", report.seen);
    println!("  First sightings: {}", report.seeded);
    println!("  Status changes:  {}", report.changed);
    println!("  Notified:        {}", report.dispatched);
    if report.dispatch_failures > 0 {
        println!("  Not sent:        {}", report.dispatch_failures);
    }
    println!("  Skipped:         {}", report.skipped);
    if !report.saved {
        println!("  State file could not be written.");
    }
}
