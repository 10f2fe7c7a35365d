//! Main controller implementation.
//!
//! The `Controller` owns the Ceph and Kubernetes clients and drives the
//! reconciliation cycle: once at startup, then on every tick of the polling
//! interval until shutdown. Between ticks it reloads the configuration and
//! applies whatever changed.

use crate::config::{ConfigDiff, ConfigSource, RunConfig};
use crate::error::ControllerError;
use crate::intent::build_intents;
use crate::logging::LogControl;
use crate::reconciler::{CycleReport, Outcome, Reconciler};
use crate::store::EndpointStore;
use ceph_client::{AdminChannel, CephClient};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Main controller for publishing mgr endpoints.
#[derive(Debug)]
pub struct Controller<C, S, P> {
    ceph: CephClient<C>,
    store: Option<S>,
    source: P,
    config: RunConfig,
    log: LogControl,
}

impl<C, S, P> Controller<C, S, P>
where
    C: AdminChannel,
    S: EndpointStore,
    P: ConfigSource,
{
    /// Creates a new controller instance.
    ///
    /// `store` may be `None` when nothing is published; a cycle that needs
    /// to publish without a store fails.
    pub fn new(
        ceph: CephClient<C>,
        store: Option<S>,
        source: P,
        config: RunConfig,
        log: LogControl,
    ) -> Self {
        Self {
            ceph,
            store,
            source,
            config,
            log,
        }
    }

    /// Configuration the next cycle will use.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Log control shared with the subscriber.
    pub fn log(&self) -> &LogControl {
        &self.log
    }

    /// Runs one full cycle: query, build intents, reconcile each.
    ///
    /// Query and build failures abort the cycle. Publish failures are
    /// collected in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, ControllerError> {
        let config = &self.config;

        let services = self.ceph.mgr_services().await?;
        let intents = build_intents(&services, config).await?;
        if intents.is_empty() {
            debug!("No endpoint slice targets configured, nothing to publish");
            return Ok(CycleReport::default());
        }

        let store = self.store.as_ref().ok_or_else(|| {
            ControllerError::Connection("Kubernetes client is not initialized".to_string())
        })?;

        let reconciler = Reconciler::new(store, &config.namespace, &config.parent_service);
        let report = reconciler.reconcile_all(&intents).await;

        let changed = report
            .results
            .iter()
            .filter(|r| matches!(r.result, Ok(Outcome::Created | Outcome::Updated)))
            .count();
        debug!(
            services = report.results.len(),
            changed,
            failed = report.failed(),
            "Cycle complete"
        );
        Ok(report)
    }

    /// Swap in `next` and apply the changes that need immediate action.
    pub fn apply_config(&mut self, next: RunConfig) -> ConfigDiff {
        let diff = self.config.diff(&next);
        if let Some(enabled) = diff.debug {
            info!(debug = enabled, "Debug logging changed");
            self.log.set_debug(enabled);
        }
        if let Some(interval) = diff.interval {
            info!(
                old = ?self.config.interval,
                new = ?interval,
                "Polling interval changed"
            );
        }
        if !diff.other.is_empty() {
            info!(fields = ?diff.other, "Configuration changed, applying on this cycle");
        }
        self.config = next;
        diff
    }

    fn reload(&mut self) -> Option<ConfigDiff> {
        if !self.source.is_reloadable() {
            return None;
        }
        match self.source.load() {
            Ok(next) => Some(self.apply_config(next)),
            Err(e) => {
                warn!(error = %e, "Failed to reload configuration, keeping previous");
                None
            }
        }
    }

    /// Runs the controller until `shutdown` resolves.
    ///
    /// With a zero interval a single cycle runs and its failure is returned.
    /// Otherwise failed cycles are logged and retried on the next tick, and
    /// the loop only ends on shutdown or when a reload sets the interval to
    /// zero. A cycle in progress always finishes first.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()>,
    {
        let first = self.run_cycle().await.and_then(CycleReport::into_result);

        if self.config.interval.is_zero() {
            return first;
        }
        if let Err(e) = first {
            error!(error = %e, "Run failed");
        }

        info!(interval = ?self.config.interval, "Polling for mgr service changes");
        let mut ticker = new_ticker(self.config.interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Some(diff) = self.reload() {
                if let Some(interval) = diff.interval {
                    if interval.is_zero() {
                        info!("Polling interval set to zero, stopping");
                        return Ok(());
                    }
                    ticker = new_ticker(interval);
                }
            }

            if let Err(e) = self.run_cycle().await.and_then(CycleReport::into_result) {
                error!(error = %e, "Run failed");
            }
        }
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
