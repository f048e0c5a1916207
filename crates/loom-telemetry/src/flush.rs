// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of queued events.
//!
//! A flush cycle drains the [`EventStore`] in insertion order and sends each
//! event to the endpoint its route selects, one at a time. Per event:
//!
//! - 2xx: removed.
//! - 408, 429 or 5xx: kept for the next cycle with its attempt count bumped,
//!   or dropped once it reaches `max_tries`.
//! - transport failure: kept for the next cycle. The attempt count is left
//!   alone, so an offline host never loses its queue.
//! - any other status: dropped, since the server will never accept it.
//!
//! At most one cycle runs at a time. A [`FlushController::flush`] call that
//! arrives while a cycle is running is rejected rather than queued. Under
//! [`FlushMode::Periodic`] a background task calls `flush` every period;
//! switching to [`FlushMode::Manual`] aborts that task. A running cycle is
//! never interrupted by a policy change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use loom_common_http::RetryableError;
use loom_telemetry_core::{FlushMode, FlushPeriod, MAX_FLUSH_PERIOD};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;
use crate::error::TelemetryError;
use crate::network::{ApiRequest, Endpoint, NetworkClient};
use crate::store::{EventStore, QueuedEvent};

/// Attempts after which a retryable event is given up on.
pub const DEFAULT_MAX_TRIES: u32 = 10;

/// Counts from one completed flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
	pub attempted: usize,
	pub delivered: usize,
	/// Kept in the store for a later cycle.
	pub retained: usize,
	/// Removed without being delivered.
	pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
	Completed(FlushReport),
	/// Another cycle was already running.
	Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSettings {
	pub mode: FlushMode,
	pub period: FlushPeriod,
	pub max_tries: u32,
}

impl Default for FlushSettings {
	fn default() -> Self {
		Self {
			mode: FlushMode::default(),
			period: FlushPeriod::default(),
			max_tries: DEFAULT_MAX_TRIES,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryOutcome {
	Delivered,
	Retained,
	Dropped,
}

/// Clears the in-flight flag when dropped, including during unwinding.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| Self(flag))
	}
}

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

/// The part of the controller shared with the periodic trigger task.
struct FlushWorker {
	store: Arc<dyn EventStore>,
	network: Arc<dyn NetworkClient>,
	project_token: String,
	max_tries: u32,
	in_flight: AtomicBool,
}

impl FlushWorker {
	async fn flush(&self) -> FlushOutcome {
		let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
			warn!("flush already in progress, rejecting");
			return FlushOutcome::Rejected;
		};

		let pending = match self.store.pending() {
			Ok(pending) => pending,
			Err(e) => {
				error!(error = %e, "failed to read event queue");
				return FlushOutcome::Completed(FlushReport::default());
			}
		};
		if pending.is_empty() {
			debug!("event queue empty, nothing to flush");
			return FlushOutcome::Completed(FlushReport::default());
		}

		debug!(count = pending.len(), "flushing queued events");
		let mut report = FlushReport::default();
		for queued in &pending {
			report.attempted += 1;
			match self.deliver(queued).await {
				DeliveryOutcome::Delivered => report.delivered += 1,
				DeliveryOutcome::Retained => report.retained += 1,
				DeliveryOutcome::Dropped => report.dropped += 1,
			}
		}

		info!(
			attempted = report.attempted,
			delivered = report.delivered,
			retained = report.retained,
			dropped = report.dropped,
			"flush cycle completed"
		);
		FlushOutcome::Completed(report)
	}

	async fn deliver(&self, queued: &QueuedEvent) -> DeliveryOutcome {
		let route = queued.event.route();
		let request = ApiRequest::new(
			Endpoint::for_route(route),
			&self.project_token,
			Some(queued.event.to_request_body()),
		);

		let failure = match self.network.execute(request).await {
			Ok(response) if response.is_success() => {
				debug!(id = queued.id, status = response.status, "event delivered");
				self.remove(queued.id);
				return DeliveryOutcome::Delivered;
			}
			Ok(response) => {
				if let Some(body) = response.body.as_deref() {
					debug!(id = queued.id, body, "delivery response body");
				}
				TelemetryError::Server {
					status: response.status,
					message: response.status_message,
				}
			}
			Err(e) => TelemetryError::from(e),
		};

		match failure {
			// Offline cycles do not count toward `max_tries`.
			TelemetryError::Transport(e) => {
				warn!(id = queued.id, error = %e, "event delivery failed, will retry");
				DeliveryOutcome::Retained
			}
			e if e.is_retryable() => {
				warn!(id = queued.id, error = %e, "event delivery failed, will retry");
				self.record_failure(queued)
			}
			e => {
				warn!(id = queued.id, route = %route, error = %e, "event rejected by server, dropping");
				self.remove(queued.id);
				DeliveryOutcome::Dropped
			}
		}
	}

	fn record_failure(&self, queued: &QueuedEvent) -> DeliveryOutcome {
		match self.store.record_attempt(queued.id) {
			Ok(Some(tries)) if tries >= self.max_tries => {
				warn!(id = queued.id, tries, "event exceeded max tries, dropping");
				self.remove(queued.id);
				DeliveryOutcome::Dropped
			}
			Ok(_) => DeliveryOutcome::Retained,
			Err(e) => {
				error!(id = queued.id, error = %e, "failed to record delivery attempt");
				DeliveryOutcome::Retained
			}
		}
	}

	fn remove(&self, id: u64) {
		if let Err(e) = self.store.remove(id) {
			error!(id, error = %e, "failed to remove event from queue");
		}
	}
}

struct Schedule {
	mode: FlushMode,
	period: FlushPeriod,
	trigger: Option<JoinHandle<()>>,
	stopped: bool,
}

pub struct FlushController {
	worker: Arc<FlushWorker>,
	schedule: Mutex<Schedule>,
	runtime: Option<Handle>,
}

impl FlushController {
	/// Creates the controller and, under periodic mode, starts its trigger on
	/// the current tokio runtime.
	pub fn new(
		store: Arc<dyn EventStore>,
		network: Arc<dyn NetworkClient>,
		project_token: impl Into<String>,
		settings: FlushSettings,
	) -> Self {
		let runtime = Handle::try_current().ok();
		if runtime.is_none() {
			warn!("no tokio runtime available, periodic flushing disabled");
		}

		let controller = Self {
			worker: Arc::new(FlushWorker {
				store,
				network,
				project_token: project_token.into(),
				max_tries: settings.max_tries.max(1),
				in_flight: AtomicBool::new(false),
			}),
			schedule: Mutex::new(Schedule {
				mode: settings.mode,
				period: settings.period,
				trigger: None,
				stopped: false,
			}),
			runtime,
		};
		controller.reschedule();
		controller
	}

	/// Runs one flush cycle now, unless one is already running.
	pub async fn flush(&self) -> FlushOutcome {
		self.worker.flush().await
	}

	pub fn is_flushing(&self) -> bool {
		self.worker.in_flight.load(Ordering::Acquire)
	}

	pub fn mode(&self) -> FlushMode {
		self
			.schedule
			.lock()
			.map(|s| s.mode)
			.unwrap_or_default()
	}

	pub fn period(&self) -> FlushPeriod {
		self
			.schedule
			.lock()
			.map(|s| s.period)
			.unwrap_or_default()
	}

	pub fn set_mode(&self, mode: FlushMode) {
		if let Ok(mut schedule) = self.schedule.lock() {
			schedule.mode = mode;
		}
		info!(mode = %mode, "flush mode changed");
		self.reschedule();
	}

	/// Changes the trigger interval; a running trigger restarts with it.
	pub fn set_period(&self, period: FlushPeriod) -> Result<(), ConfigError> {
		if period.is_zero() {
			return Err(ConfigError::invalid_value("flush_period", "must be non-zero"));
		}
		if period.exceeds_max() {
			return Err(ConfigError::invalid_value(
				"flush_period",
				format!("must not exceed {} seconds", MAX_FLUSH_PERIOD.as_secs()),
			));
		}
		if let Ok(mut schedule) = self.schedule.lock() {
			schedule.period = period;
		}
		info!(period = %period, "flush period changed");
		self.reschedule();
		Ok(())
	}

	/// Whether the periodic trigger task is alive.
	pub fn is_trigger_active(&self) -> bool {
		self
			.schedule
			.lock()
			.map(|s| s.trigger.as_ref().is_some_and(|t| !t.is_finished()))
			.unwrap_or(false)
	}

	/// Stops the periodic trigger for good. Manual flushes still work.
	pub fn shutdown(&self) {
		if let Ok(mut schedule) = self.schedule.lock() {
			schedule.stopped = true;
			if let Some(trigger) = schedule.trigger.take() {
				trigger.abort();
			}
		}
		debug!("flush trigger stopped");
	}

	fn reschedule(&self) {
		let Ok(mut schedule) = self.schedule.lock() else {
			error!("flush schedule lock poisoned");
			return;
		};
		if let Some(trigger) = schedule.trigger.take() {
			trigger.abort();
		}
		if schedule.stopped || schedule.mode != FlushMode::Periodic || schedule.period.is_zero() {
			return;
		}
		let Some(runtime) = &self.runtime else {
			return;
		};

		let period = schedule.period.as_duration();
		let Some(start) = Instant::now().checked_add(period) else {
			error!(period = %schedule.period, "flush period out of range, trigger not started");
			return;
		};
		let worker = self.worker.clone();
		schedule.trigger = Some(runtime.spawn(async move {
			let mut ticker = interval_at(start, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				if worker.flush().await == FlushOutcome::Rejected {
					debug!("periodic flush skipped");
				}
			}
		}));
		debug!(period_secs = period.as_secs(), "periodic flush trigger started");
	}
}

impl Drop for FlushController {
	fn drop(&mut self) {
		if let Ok(mut schedule) = self.schedule.lock() {
			if let Some(trigger) = schedule.trigger.take() {
				trigger.abort();
			}
		}
	}
}
