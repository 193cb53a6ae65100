//! Periodic timeout sweep
//!
//! Runs the timeout sweep on a fixed interval. A failing or panicking tick
//! is logged and the loop carries on; the next tick retries.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::maintenance::MaintenanceServiceTrait;

/// Schedule of the periodic timeout sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
	pub enabled: bool,
	/// Minutes between two sweeps
	pub interval_minutes: u64,
	/// Jobs older than this many minutes are timed out
	pub threshold_minutes: i64,
}

impl Default for SweepConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			interval_minutes: 60,
			threshold_minutes: 24 * 60,
		}
	}
}

pub struct SweepScheduler {
	maintenance: Arc<dyn MaintenanceServiceTrait>,
	config: SweepConfig,
}

impl SweepScheduler {
	pub fn new(maintenance: Arc<dyn MaintenanceServiceTrait>, config: SweepConfig) -> Self {
		Self {
			maintenance,
			config,
		}
	}

	/// Run a single sweep, returning whether it completed
	///
	/// Errors and panics are logged and swallowed.
	pub async fn run_once(&self) -> bool {
		let threshold = self.config.threshold_minutes;
		let sweep = async { self.maintenance.sweep_timed_out_jobs(threshold, None).await };

		match AssertUnwindSafe(sweep).catch_unwind().await {
			Ok(Ok(summary)) => {
				if summary.count > 0 {
					info!(
						"Scheduled sweep timed out {} jobs ({:?})",
						summary.count, summary.by_type
					);
				}
				true
			},
			Ok(Err(e)) => {
				error!("Scheduled timeout sweep failed: {}", e);
				false
			},
			Err(_) => {
				error!("Scheduled timeout sweep panicked");
				false
			},
		}
	}

	/// Start the sweep loop; `None` when sweeping is disabled
	pub fn spawn(self) -> Option<JoinHandle<()>> {
		if !self.config.enabled {
			info!("Periodic timeout sweep disabled");
			return None;
		}
		if self.config.interval_minutes == 0 {
			warn!("Periodic timeout sweep has a zero interval, not starting it");
			return None;
		}

		Some(tokio::spawn(async move {
			let mut ticker = interval(Duration::from_secs(self.config.interval_minutes * 60));
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

			info!(
				"Started timeout sweep loop (interval: {} minutes, threshold: {} minutes)",
				self.config.interval_minutes, self.config.threshold_minutes
			);

			loop {
				ticker.tick().await;
				self.run_once().await;
			}
		}))
	}
}
