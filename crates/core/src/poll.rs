use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{error, info, warn};

use crate::source::{Notifier, OrderSource, TokenSource};
use crate::state::{Snapshot, StateStore};
use crate::transition::{TransitionRule, plan_cycle};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub rule: TransitionRule,
    pub dispatch_concurrency: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            rule: TransitionRule::default(),
            dispatch_concurrency: DEFAULT_DISPATCH_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub seen: usize,
    pub seeded: usize,
    pub changed: usize,
    pub dispatched: usize,
    pub dispatch_failures: usize,
    pub skipped: usize,
    pub saved: bool,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            outcome: CycleOutcome::Completed,
            seen: 0,
            seeded: 0,
            changed: 0,
            dispatched: 0,
            dispatch_failures: 0,
            skipped: 0,
            saved: false,
        }
    }

    fn aborted(started_at: DateTime<Utc>, reason: String) -> Self {
        Self {
            outcome: CycleOutcome::Aborted(reason),
            ..Self::new(started_at)
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Aborted(_))
    }
}

/// Drives token refresh → fetch → diff → dispatch → persist, one cycle at a time.
pub struct PollLoop<T, F, N> {
    tokens: T,
    feed: F,
    notifier: N,
    store: StateStore,
    state: Snapshot,
    settings: PollSettings,
}

impl<T, F, N> PollLoop<T, F, N>
where
    T: TokenSource,
    F: OrderSource,
    N: Notifier,
{
    /// Create the loop, loading the last snapshot from `store`.
    pub async fn new(
        tokens: T,
        feed: F,
        notifier: N,
        store: StateStore,
        settings: PollSettings,
    ) -> Self {
        let state = store.load().await;
        Self {
            tokens,
            feed,
            notifier,
            store,
            state,
            settings,
        }
    }

    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    /// Run a single cycle. Token or feed failures abort the cycle before any
    /// state is touched.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started_at = Utc::now();

        let token = match self.tokens.refresh().await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Token refresh failed, skipping cycle");
                return CycleReport::aborted(started_at, e.to_string());
            }
        };

        let orders = match self.feed.fetch(&token).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "Order fetch failed, skipping cycle");
                return CycleReport::aborted(started_at, e.to_string());
            }
        };
        info!(orders = orders.len(), "Fetched orders");

        let plan = plan_cycle(&self.state, orders, &self.settings.rule);
        let mut report = CycleReport::new(started_at);
        report.seen = plan.seen;
        report.seeded = plan.seeded;
        report.changed = plan.changed;
        report.skipped = plan.skipped;

        let notifier = &self.notifier;
        let results: Vec<bool> = futures::stream::iter(plan.dispatches.iter())
            .map(|order| notifier.send(order))
            .buffer_unordered(self.settings.dispatch_concurrency.max(1))
            .collect()
            .await;
        report.dispatched = results.iter().filter(|ok| **ok).count();
        report.dispatch_failures = results.len() - report.dispatched;
        if report.dispatch_failures > 0 {
            warn!(
                failures = report.dispatch_failures,
                "Some notifications could not be sent"
            );
        }

        // Dispatch outcome does not hold back the recorded status.
        self.state = plan.next;
        report.saved = self.store.save(&self.state).await;

        info!(
            seen = report.seen,
            seeded = report.seeded,
            changed = report.changed,
            dispatched = report.dispatched,
            skipped = report.skipped,
            "Cycle complete"
        );
        report
    }

    /// Write the in-memory state to disk.
    pub async fn flush(&self) -> bool {
        self.store.save(&self.state).await
    }

    /// Poll until `shutdown` resolves. Shutdown is only observed between
    /// cycles; the state is flushed before returning.
    pub async fn run<S>(mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            interval_secs = self.settings.interval.as_secs(),
            state_file = %self.store.path().display(),
            "Starting poll loop"
        );

        loop {
            self.run_cycle().await;
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        if self.flush().await {
            info!("State flushed");
        }
    }
}
