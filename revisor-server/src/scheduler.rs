use revisor_core::SessionState;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::monitor::{CycleError, CycleOutcome, ProjectMonitor};

/// Runs monitor cycles back to back with a fixed pause in between.
pub struct PollingScheduler {
    monitor: ProjectMonitor,
    interval: Duration,
}

impl PollingScheduler {
    pub fn new(monitor: ProjectMonitor, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    /// Never returns. The pause starts after a cycle finishes, so cycles
    /// never overlap.
    pub async fn run(&self, mut session: SessionState) {
        info!(
            "Monitoring project {} every {}s",
            self.monitor.settings().project_id,
            self.interval.as_secs()
        );

        loop {
            self.tick(&mut session).await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Run one cycle and log how it ended. Errors stop here.
    pub async fn tick(&self, session: &mut SessionState) -> Option<CycleOutcome> {
        match self.monitor.run_cycle(session).await {
            Ok(outcome) => {
                info!("Cycle finished: {}", outcome);
                Some(outcome)
            }
            Err(e @ CycleError::SessionExpired { .. }) => {
                warn!("Cycle stopped: {}", e);
                None
            }
            Err(e) => {
                error!("Cycle failed: {}", e);
                None
            }
        }
    }
}
