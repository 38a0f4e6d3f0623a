//! The periodic plan: fan out one
//! `collect_ohlcv` task per tracked `(symbol, interval)` at a fixed
//! cadence, bounded by a worker-pool `Semaphore` so long tasks never
//! block siblings (prefetch disabled — each tick spawns fresh tasks
//! rather than queuing ahead).

use std::sync::Arc;

use fks_manager::MultiProviderManager;
use fks_store::OhlcvSink;
use fks_types::config::{BackoffConfig, SchedulerConfig};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::job::{collect_ohlcv, CollectOutcome, CollectTarget};

/// Owns the shared manager/store handles and bounds worker concurrency for
/// one periodic plan.
pub struct Scheduler {
    manager: Arc<MultiProviderManager>,
    store: Arc<dyn OhlcvSink>,
    backoff: BackoffConfig,
    cfg: SchedulerConfig,
    semaphore: Arc<Semaphore>,
}

impl Scheduler {
    /// Build a scheduler bound to `manager`/`store`, with worker
    /// concurrency capped at `cfg.max_concurrency` (clamped to at least
    /// one worker so a misconfigured zero never wedges every task).
    #[must_use]
    pub fn new(
        manager: Arc<MultiProviderManager>,
        store: Arc<dyn OhlcvSink>,
        backoff: BackoffConfig,
        cfg: SchedulerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrency.max(1)));
        Self {
            manager,
            store,
            backoff,
            cfg,
            semaphore,
        }
    }

    /// Run one `collect_ohlcv` task for `target`, bounded by the worker
    /// pool semaphore and the configured hard timeout. A task exceeding
    /// `soft_timeout` is logged but allowed to continue; one exceeding
    /// `hard_timeout` is abandoned (its permit is reclaimed when the
    /// abandoned future is dropped) and reported as an error outcome.
    pub async fn run_one(&self, target: CollectTarget) -> CollectOutcome {
        let permit = self.semaphore.clone().acquire_owned().await;
        let Ok(_permit) = permit else {
            return CollectOutcome {
                status: "error",
                provider: None,
                candles_fetched: 0,
                candles_stored: 0,
                ts: chrono::Utc::now(),
                error: Some("scheduler shut down".to_string()),
            };
        };

        let manager = self.manager.clone();
        let store = self.store.clone();
        let backoff = self.backoff;
        let soft_timeout = self.cfg.soft_timeout;
        let started = Instant::now();

        let work = async move { collect_ohlcv(&manager, store.as_ref(), &target, &backoff).await };
        tokio::pin!(work);

        let soft_deadline = tokio::time::sleep(soft_timeout);
        tokio::pin!(soft_deadline);
        let mut warned_soft = false;

        let outcome = loop {
            tokio::select! {
                biased;
                result = &mut work => break result,
                () = &mut soft_deadline, if !warned_soft => {
                    warned_soft = true;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(elapsed_ms = started.elapsed().as_millis(), "task exceeded soft timeout");
                    #[cfg(not(feature = "tracing"))]
                    let _ = started;
                }
            }
        };
        outcome
    }

    /// Fan out one `run_one` task per entry in `targets`, respecting the
    /// worker-pool bound; returns once every task completes or is
    /// abandoned past its hard timeout.
    pub async fn run_plan(&self, targets: Vec<CollectTarget>) -> Vec<CollectOutcome> {
        let hard_timeout = self.cfg.hard_timeout;
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let fut = self.run_one(target.clone());
            handles.push(async move {
                match tokio::time::timeout(hard_timeout, fut).await {
                    Ok(outcome) => outcome,
                    Err(_) => CollectOutcome {
                        status: "error",
                        provider: None,
                        candles_fetched: 0,
                        candles_stored: 0,
                        ts: chrono::Utc::now(),
                        error: Some(format!(
                            "{}/{} exceeded hard timeout of {:?}",
                            target.symbol, target.interval, hard_timeout
                        )),
                    },
                }
            });
        }
        futures::future::join_all(handles).await
    }

    /// Drive the periodic plan forever: every `cfg.tick_interval`, fan out
    /// one task per entry in `targets()`. Intended to be spawned as a
    /// long-running background task; returns only if `targets` is ever
    /// consulted and the interval itself ticks zero times, which cannot
    /// happen under normal use.
    pub async fn run_forever(
        &self,
        mut targets: impl FnMut() -> Vec<CollectTarget>,
    ) -> ! {
        let mut interval = tokio::time::interval(self.cfg.tick_interval);
        loop {
            interval.tick().await;
            let plan = targets();
            #[cfg(feature = "tracing")]
            tracing::info!(tasks = plan.len(), "fanning out periodic collection plan");
            let outcomes = self.run_plan(plan).await;
            let failed = outcomes.iter().filter(|o| o.status == "error").count();
            if failed > 0 {
                #[cfg(feature = "tracing")]
                tracing::warn!(failed, total = outcomes.len(), "periodic plan completed with failures");
            }
        }
    }
}
