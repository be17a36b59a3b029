use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Args)]
pub struct RunArgs;

pub async fn run(_args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(config_path)?.resolve()?;
    let shutdown = shutdown_signal().context("failed to install signal handlers")?;
    let poll = config.open_poll_loop().await?;

    poll.run(shutdown).await;
    info!("shipwatch stopped");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM. Handlers are installed
/// immediately so a signal arriving mid-cycle is not lost; a second signal
/// exits without waiting for the cycle to finish.
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    let (tx, rx) = mpsc::channel(4);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = terminate.recv() => "SIGTERM",
                    _ = interrupt.recv() => "SIGINT",
                };
                if tx.send(name).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send("Ctrl-C").await.is_err() {
                break;
            }
        }
    });

    Ok(wait_for_signals(rx, || {
        std::process::exit(130);
    }))
}

async fn wait_for_signals<F>(mut signals: mpsc::Receiver<&'static str>, force: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Some(name) = signals.recv().await {
        info!(signal = name, "Finishing current cycle, signal again to exit now");
    }
    tokio::spawn(async move {
        if let Some(name) = signals.recv().await {
            warn!(signal = name, "Exiting without flushing state");
            force();
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn second_signal_forces_exit() {
        let (tx, rx) = mpsc::channel(4);
        let (forced_tx, forced_rx) = oneshot::channel();

        tx.send("SIGINT").await.unwrap();
        wait_for_signals(rx, move || {
            let _ = forced_tx.send(());
        })
        .await;

        tx.send("SIGTERM").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), forced_rx)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn single_signal_only_requests_shutdown() {
        let (tx, rx) = mpsc::channel(4);
        let (forced_tx, forced_rx) = oneshot::channel::<()>();

        tx.send("SIGINT").await.unwrap();
        wait_for_signals(rx, move || {
            let _ = forced_tx.send(());
        })
        .await;
        drop(tx);

        assert!(forced_rx.await.is_err());
    }
}
