use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;

#[derive(Args)]
pub struct CheckArgs;

pub async fn run(_args: CheckArgs, config_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    let secret = |v: &Option<String>| if v.is_some() { "set" } else { "MISSING" };
    println!("CRM");
    println!("  Token URL:      {}", config.crm.token_url);
    println!("  Orders URL:     {}", config.crm.orders_url);
    println!("  Client ID:      {}", config.crm.client_id.as_deref().unwrap_or("MISSING"));
    println!("  Client secret:  {}", secret(&config.crm.client_secret));
    println!("  Refresh token:  {}", secret(&config.crm.refresh_token));
    println!(
        "  Paging:         {} per page, up to {} page(s)",
        config.crm.page_size, config.crm.max_pages
    );
    println!("  Token cache:    {}", if config.crm.cache_token { "on" } else { "off" });
    println!("Notification");
    println!("  URL:            {}", config.notify.url);
    println!("  Access token:   {}", secret(&config.notify.access_token));
    println!(
        "  Template ID:    {}",
        config.notify.template_id.as_deref().unwrap_or("-")
    );
    println!("Poll");
    println!("  Interval:       {}s", config.poll.interval_secs);
    println!("  State file:     {}", config.poll.state_file.display());
    println!(
        "  Trigger:        {} -> {}",
        config.poll.transition_from, config.poll.transition_to
    );

    config.resolve()?;
    println!("\nConfiguration OK.");
    Ok(())
}
