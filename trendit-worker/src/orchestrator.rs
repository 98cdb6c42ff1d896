//! Worker orchestrator
//!
//! Runs the maintenance jobs on a fixed interval until shut down.
//!
//! ```text
//! every poll interval
//!   ├─> expire_stale_performances
//!   └─> reconcile_pending_payments
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trendit_shared::payments::MockGateway;
//! use trendit_worker::orchestrator::{OrchestratorConfig, WorkerOrchestrator};
//!
//! # async fn example(pool: sqlx::PgPool) {
//! let orchestrator = WorkerOrchestrator::new(
//!     pool,
//!     Arc::new(MockGateway::new("secret")),
//!     None,
//!     OrchestratorConfig::default(),
//! );
//!
//! let shutdown = orchestrator.shutdown_token();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     shutdown.cancel();
//! });
//!
//! orchestrator.run().await;
//! # }
//! ```

use crate::jobs::{self, ReconcileSummary};
use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use std::env;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use trendit_shared::{payments::PaymentGateway, telegram::TelegramNotifier};

/// Worker orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Seconds between sweeps
    pub poll_interval_secs: u64,

    /// Pending performances older than this are failed
    pub performance_timeout_secs: u64,

    /// Pending gateway payments older than this are verified with the gateway
    pub reconcile_after_secs: u64,

    /// Rows handled per job per sweep
    pub batch_size: i64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval_secs: 60,
            performance_timeout_secs: 3600,
            reconcile_after_secs: 300,
            batch_size: 50,
        }
    }
}

impl OrchestratorConfig {
    /// Reads `WORKER_POLL_INTERVAL_SECS`, `PERFORMANCE_TIMEOUT_SECS`,
    /// `PAYMENT_RECONCILE_AFTER_SECS` and `WORKER_BATCH_SIZE`, keeping the default for
    /// any that is unset
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but not a positive integer
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            poll_interval_secs: positive_var("WORKER_POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            performance_timeout_secs: positive_var("PERFORMANCE_TIMEOUT_SECS", defaults.performance_timeout_secs)?,
            reconcile_after_secs: positive_var("PAYMENT_RECONCILE_AFTER_SECS", defaults.reconcile_after_secs)?,
            batch_size: positive_var("WORKER_BATCH_SIZE", defaults.batch_size as u64)? as i64,
        })
    }
}

fn positive_var(name: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(name) {
        Ok(raw) => parse_positive(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_positive(name: &str, raw: &str) -> anyhow::Result<u64> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("{} must be a positive integer, got '{}'", name, raw))?;
    if value == 0 {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(value)
}

/// What one sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub payments: ReconcileSummary,
}

pub struct WorkerOrchestrator {
    db: PgPool,
    gateway: Arc<dyn PaymentGateway>,
    telegram: Option<TelegramNotifier>,
    config: OrchestratorConfig,
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    pub fn new(
        db: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        telegram: Option<TelegramNotifier>,
        config: OrchestratorConfig,
    ) -> Self {
        WorkerOrchestrator {
            db,
            gateway,
            telegram,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancelling the token stops [`run`](Self::run) after the current sweep
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one pass of every job
    ///
    /// A failing job is logged and does not stop the others.
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match jobs::expire_stale_performances(
            &self.db,
            ChronoDuration::seconds(self.config.performance_timeout_secs as i64),
            self.config.batch_size,
        )
        .await
        {
            Ok(expired) => report.expired = expired,
            Err(e) => tracing::error!(error = %e, "Performance expiry failed"),
        }

        match jobs::reconcile_pending_payments(
            &self.db,
            self.gateway.as_ref(),
            self.telegram.as_ref(),
            ChronoDuration::seconds(self.config.reconcile_after_secs as i64),
            self.config.batch_size,
        )
        .await
        {
            Ok(summary) => report.payments = summary,
            Err(e) => tracing::error!(error = %e, "Payment reconciliation failed"),
        }

        report
    }

    /// Sweeps every poll interval until the shutdown token is cancelled
    pub async fn run(&self) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            performance_timeout_secs = self.config.performance_timeout_secs,
            reconcile_after_secs = self.config.reconcile_after_secs,
            "Worker orchestrator starting"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            let report = self.run_once().await;
            if report != SweepReport::default() {
                tracing::info!(
                    expired = report.expired,
                    checked = report.payments.checked,
                    settled = report.payments.settled,
                    abandoned = report.payments.abandoned,
                    still_pending = report.payments.still_pending,
                    errors = report.payments.errors,
                    "Sweep finished"
                );
            } else {
                tracing::debug!("Sweep finished, nothing to do");
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = sleep(Duration::from_secs(self.config.poll_interval_secs)) => {}
            }
        }

        tracing::info!("Worker orchestrator shut down");
    }
}
