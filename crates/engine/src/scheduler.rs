use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::tracker::Tracker;

/// What one tick accomplished. Failed steps are recorded, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub movements: usize,
    pub alerts_fired: usize,
    pub movement_failed: bool,
    pub alerts_failed: bool,
}

/// Drives the tracker on a fixed period, decoupled from the HTTP layer.
///
/// Ticks run one after another on this task, so the scheduler never overlaps
/// with itself; it may still overlap with manual API calls, which the
/// tracker tolerates.
pub struct Scheduler {
    tracker: Arc<Tracker>,
    period: Duration,
}

impl Scheduler {
    pub fn new(tracker: Arc<Tracker>, period: Duration) -> Self {
        Self { tracker, period }
    }

    /// Run forever. Call from `tokio::spawn`.
    pub async fn run(self) {
        info!(period = ?self.period, "Scheduler running");

        let mut ticker = interval(self.period);
        // A slow cycle delays the next one instead of causing a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Run one full cycle: movement evaluation (which fetches and stores a
    /// fresh batch) followed by target alert evaluation. The two steps are
    /// independent; a failure in one does not skip the other.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        match self.tracker.evaluate_movement_and_alert().await {
            Ok(movements) => report.movements = movements.len(),
            Err(e) => {
                error!(error = %e, "Tracking cycle failed");
                report.movement_failed = true;
            }
        }

        match self.tracker.evaluate_target_alerts().await {
            Ok(fired) => report.alerts_fired = fired.len(),
            Err(e) => {
                error!(error = %e, "Target alert evaluation failed");
                report.alerts_failed = true;
            }
        }

        info!(
            movements = report.movements,
            alerts_fired = report.alerts_fired,
            movement_failed = report.movement_failed,
            alerts_failed = report.alerts_failed,
            "Tick complete"
        );
        report
    }
}
