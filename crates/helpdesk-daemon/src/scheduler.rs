//! Periodic SLA sweep driver.
//!
//! Runs [`EscalationEngine::sweep`] once after a startup delay and then on a
//! fixed interval until cancelled. A sweep in progress is always allowed to
//! finish; cancellation is only observed between sweeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use triage::{Clock, EscalationEngine, SweepConfig, SweepReport, SystemClock};

pub struct SweepScheduler {
    engine: Arc<EscalationEngine>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    startup_delay: Duration,
}

impl SweepScheduler {
    pub fn new(engine: Arc<EscalationEngine>, interval: Duration, startup_delay: Duration) -> Self {
        Self {
            engine,
            clock: Arc::new(SystemClock),
            interval,
            startup_delay,
        }
    }

    pub fn from_config(engine: Arc<EscalationEngine>, config: &SweepConfig) -> Self {
        Self::new(engine, config.interval(), config.startup_delay())
    }

    /// Take sweep timestamps from `clock` instead of the system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one sweep now.
    pub async fn run_once(&self) -> SweepReport {
        let report = self.engine.sweep(self.clock.now()).await;
        if report.has_failures() {
            warn!(
                failed = report.failures.len(),
                "SLA sweep finished with per-ticket failures"
            );
        }
        report
    }

    /// Sweep until `cancel` fires. Returns the number of sweeps run.
    pub async fn run(&self, cancel: CancellationToken) -> usize {
        // a zero period would make interval_at panic
        let period = self.interval.max(Duration::from_secs(1));
        let mut ticker = interval_at(Instant::now() + self.startup_delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            startup_delay_secs = self.startup_delay.as_secs(),
            "SLA sweep scheduler started"
        );

        let mut sweeps = 0usize;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_once().await;
                    sweeps += 1;
                }
            }
        }

        info!(sweeps, "SLA sweep scheduler stopped");
        sweeps
    }
}
