//! Background health monitoring
//!
//! The monitor sweeps the whole pool on an interval, probing every record —
//! inactive ones included, so that recovered proxies show up in reports and
//! can be reactivated by an operator. Probe outcomes flow through the same
//! reputation path as consumer outcome reports.

mod probe;

pub use probe::{NetProber, ProbeConfig, ProbeOutcome, Prober};

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::error::{PoolError, Result};
use crate::models::ProxyRecord;
use crate::pool::ProxyPool;

/// Health monitor configuration
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Time between sweeps
    pub sweep_interval: Duration,
    /// Maximum concurrent probes per sweep
    pub workers: usize,
    pub probe: ProbeConfig,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
            workers: 16,
            probe: ProbeConfig::default(),
        }
    }
}

/// Summary of one completed sweep
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    /// Records flagged for undecryptable credentials this sweep
    pub flagged: usize,
    /// Mean EMA success rate across records with history, after the sweep
    pub avg_success_rate: f64,
    /// Records the sweep itself pushed over the failure threshold
    pub newly_deactivated: Vec<i64>,
}

enum ProbeResult {
    Healthy,
    Unhealthy { newly_deactivated: Option<i64> },
    Flagged,
    Skipped,
}

/// Periodic pool-wide health checker
pub struct HealthMonitor {
    pool: Arc<ProxyPool>,
    prober: Arc<dyn Prober>,
    config: HealthMonitorConfig,
    report_tx: watch::Sender<Option<SweepReport>>,
}

/// Handle used to stop a running monitor
pub struct HealthMonitorHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl HealthMonitorHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (Self { shutdown_tx }, shutdown_rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl HealthMonitor {
    pub fn new(pool: Arc<ProxyPool>, config: HealthMonitorConfig) -> Self {
        let prober = Arc::new(NetProber::new(config.probe.clone()));
        Self::with_prober(pool, config, prober)
    }

    /// Construct with a custom prober; tests script probe outcomes this way.
    pub fn with_prober(
        pool: Arc<ProxyPool>,
        config: HealthMonitorConfig,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let (report_tx, _) = watch::channel(None);
        Self {
            pool,
            prober,
            config,
            report_tx,
        }
    }

    /// Receiver that always holds the most recent sweep report.
    pub fn subscribe(&self) -> watch::Receiver<Option<SweepReport>> {
        self.report_tx.subscribe()
    }

    /// Monitor loop; sweeps on the configured interval until shutdown.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            workers = self.config.workers,
            "Health monitor started"
        );

        let mut interval = tokio::time::interval(self.config.sweep_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Health sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Health monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Probe every stored record once and publish a report.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let records = self.pool.store().all().await?;
        let total = records.len();

        let results: Vec<ProbeResult> = stream::iter(records)
            .map(|record| {
                let pool = self.pool.clone();
                let prober = self.prober.clone();
                async move { Self::probe_one(&pool, prober.as_ref(), record).await }
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let mut report = SweepReport {
            total,
            ..Default::default()
        };
        for result in results {
            match result {
                ProbeResult::Healthy => report.healthy += 1,
                ProbeResult::Unhealthy { newly_deactivated } => {
                    report.unhealthy += 1;
                    if let Some(id) = newly_deactivated {
                        report.newly_deactivated.push(id);
                    }
                }
                ProbeResult::Flagged => report.flagged += 1,
                ProbeResult::Skipped => {}
            }
        }
        report.newly_deactivated.sort_unstable();
        report.avg_success_rate = self.pool.snapshot().await?.avg_success_rate;

        info!(
            total = report.total,
            healthy = report.healthy,
            unhealthy = report.unhealthy,
            flagged = report.flagged,
            newly_deactivated = report.newly_deactivated.len(),
            "Health sweep complete"
        );

        self.report_tx.send_replace(Some(report.clone()));
        Ok(report)
    }

    /// Probe one record; errors here never abort the sweep.
    async fn probe_one(
        pool: &ProxyPool,
        prober: &dyn Prober,
        record: ProxyRecord,
    ) -> ProbeResult {
        let was_active = record.active;

        let password = match pool.build_handle(&record).await {
            Ok(handle) => handle.password,
            Err(PoolError::CredentialDecrypt { .. }) => return ProbeResult::Flagged,
            Err(e) => {
                warn!(id = record.id, error = %e, "Skipping unprobeable record");
                return ProbeResult::Skipped;
            }
        };

        let outcome = prober.probe(&record, password.as_deref()).await;

        match pool
            .record_probe(record.id, outcome.success, outcome.response_time_ms)
            .await
        {
            Ok(_) if outcome.success => ProbeResult::Healthy,
            Ok(updated) => ProbeResult::Unhealthy {
                newly_deactivated: (was_active && !updated.active).then_some(record.id),
            },
            Err(e) => {
                // Record may have been purged mid-sweep
                warn!(id = record.id, error = %e, "Failed to record probe outcome");
                ProbeResult::Skipped
            }
        }
    }
}
