// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session boundaries derived from foreground/background transitions.
//!
//! ```text
//!            resume, gap > timeout (or first run): emit session_start
//!          +-------------------------------------------------------+
//!          |            resume, gap <= timeout: no event           v
//!       CLOSED ------------------------------------------------> OPEN
//!          ^                                                       |
//!          +------------- pause: emit session_end -----------------+
//! ```
//!
//! The gap is measured from the last pause. The [`SessionRecord`] is
//! persisted so a restart within the timeout continues the previous session.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use loom_telemetry_core::{event_types, now_millis, DeviceProperties, Route};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, trace};

use crate::capture::EventCapture;
use crate::lifecycle::{LifecycleHub, LifecycleObserver, SubscriptionId};
use crate::prefs::{keys, Preferences, PreferencesExt};

pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Closed,
	Open,
}

/// Boundaries of the current or most recent session, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
	pub start_timestamp: i64,
	/// Set when the session is paused; `None` while it has never been.
	pub last_active_timestamp: Option<i64>,
}

impl SessionRecord {
	fn continues_at(&self, now: i64, timeout: Duration) -> bool {
		let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
		self
			.last_active_timestamp
			.is_some_and(|last| now.saturating_sub(last) <= timeout_ms)
	}
}

/// Where a resume or pause signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
	/// Delivered by the lifecycle hub; ignored unless tracking is enabled.
	Lifecycle,
	/// Called directly by the host.
	Manual,
}

struct SessionInner {
	state: SessionState,
	record: Option<SessionRecord>,
	timeout: Duration,
	subscription: Option<SubscriptionId>,
}

pub struct SessionManager {
	capture: Arc<EventCapture>,
	prefs: Arc<dyn Preferences>,
	hub: Arc<LifecycleHub>,
	device: DeviceProperties,
	inner: Mutex<SessionInner>,
	this: Weak<SessionManager>,
}

impl SessionManager {
	/// Creates a closed, unsubscribed manager, restoring any persisted record.
	pub fn new(
		capture: Arc<EventCapture>,
		prefs: Arc<dyn Preferences>,
		hub: Arc<LifecycleHub>,
		device: DeviceProperties,
		timeout: Duration,
	) -> Arc<Self> {
		let record = prefs
			.get_as::<SessionRecord>(keys::SESSION_RECORD)
			.unwrap_or_else(|e| {
				error!(error = %e, "failed to read session record");
				None
			});

		Arc::new_cyclic(|this| Self {
			capture,
			prefs,
			hub,
			device,
			inner: Mutex::new(SessionInner {
				state: SessionState::Closed,
				record,
				timeout,
				subscription: None,
			}),
			this: this.clone(),
		})
	}

	pub fn state(&self) -> SessionState {
		self
			.inner
			.lock()
			.map(|i| i.state)
			.unwrap_or(SessionState::Closed)
	}

	pub fn record(&self) -> Option<SessionRecord> {
		self.inner.lock().ok().and_then(|i| i.record)
	}

	pub fn timeout(&self) -> Duration {
		self
			.inner
			.lock()
			.map(|i| i.timeout)
			.unwrap_or(DEFAULT_SESSION_TIMEOUT)
	}

	pub fn set_timeout(&self, timeout: Duration) {
		if let Ok(mut inner) = self.inner.lock() {
			inner.timeout = timeout;
		}
	}

	/// Whether lifecycle signals currently drive the state machine.
	pub fn is_enabled(&self) -> bool {
		self
			.inner
			.lock()
			.map(|i| i.subscription.is_some())
			.unwrap_or(false)
	}

	/// Starts or stops listening to lifecycle signals and persists the choice.
	///
	/// Toggling emits no event. Disabling while a session is open closes it
	/// silently at the current time, so the next resume is judged against the
	/// timeout.
	pub fn set_enabled(&self, enabled: bool) {
		let Ok(mut inner) = self.inner.lock() else {
			error!("session lock poisoned");
			return;
		};

		match (enabled, inner.subscription) {
			(true, None) => {
				if let Some(this) = self.this.upgrade() {
					inner.subscription = Some(self.hub.subscribe(this));
				}
			}
			(false, Some(id)) => {
				self.hub.unsubscribe(id);
				inner.subscription = None;
				if inner.state == SessionState::Open {
					let now = now_millis();
					if let Some(record) = inner.record.as_mut() {
						record.last_active_timestamp = Some(now);
					}
					inner.state = SessionState::Closed;
					self.persist(inner.record);
					debug!("open session closed silently");
				}
			}
			_ => {}
		}
		drop(inner);

		if let Err(e) = self
			.prefs
			.set(keys::AUTOMATIC_SESSION_TRACKING, Value::Bool(enabled))
		{
			error!(error = %e, "failed to persist session tracking preference");
		}
		info!(enabled, "automatic session tracking changed");
	}

	/// Stops listening without changing the persisted preference.
	pub fn detach(&self) {
		if let Ok(mut inner) = self.inner.lock() {
			if let Some(id) = inner.subscription.take() {
				self.hub.unsubscribe(id);
			}
		}
	}

	/// Applies a resume signal observed at `now` (epoch milliseconds).
	pub fn resume_at(&self, now: i64) {
		self.resume(now, Signal::Manual);
	}

	/// Applies a pause signal observed at `now` (epoch milliseconds).
	pub fn pause_at(&self, now: i64) {
		self.pause(now, Signal::Manual);
	}

	fn resume(&self, now: i64, signal: Signal) {
		let Ok(mut inner) = self.inner.lock() else {
			error!("session lock poisoned");
			return;
		};
		// The hub notifies from a snapshot, so a signal can arrive after
		// `set_enabled(false)` has returned.
		if signal == Signal::Lifecycle && inner.subscription.is_none() {
			trace!("lifecycle resume ignored, tracking disabled");
			return;
		}
		if inner.state == SessionState::Open {
			return;
		}
		inner.state = SessionState::Open;

		if let Some(record) = inner.record.filter(|r| r.continues_at(now, inner.timeout)) {
			debug!(start = record.start_timestamp, "session continued");
			return;
		}

		let record = SessionRecord {
			start_timestamp: now,
			last_active_timestamp: None,
		};
		inner.record = Some(record);
		self.persist(Some(record));

		self.capture.capture(
			Some(event_types::SESSION_START),
			Some(now),
			None,
			self.device.to_properties(),
			Route::TrackEvent,
		);
		info!(start = now, "session started");
	}

	fn pause(&self, now: i64, signal: Signal) {
		let Ok(mut inner) = self.inner.lock() else {
			error!("session lock poisoned");
			return;
		};
		if signal == Signal::Lifecycle && inner.subscription.is_none() {
			trace!("lifecycle pause ignored, tracking disabled");
			return;
		}
		if inner.state == SessionState::Closed {
			return;
		}
		inner.state = SessionState::Closed;

		let Some(record) = inner.record.as_mut() else {
			return;
		};
		record.last_active_timestamp = Some(now);
		let record = *record;
		self.persist(Some(record));

		let duration = now.saturating_sub(record.start_timestamp) as f64 / 1000.0;
		let properties = self.device.to_properties().insert("duration", duration);
		self.capture.capture(
			Some(event_types::SESSION_END),
			Some(now),
			None,
			properties,
			Route::TrackEvent,
		);
		info!(duration_secs = duration, "session ended");
	}

	fn persist(&self, record: Option<SessionRecord>) {
		let Some(record) = record else {
			return;
		};
		if let Err(e) = self.prefs.set_as(keys::SESSION_RECORD, &record) {
			error!(error = %e, "failed to persist session record");
		}
	}
}

impl LifecycleObserver for SessionManager {
	fn on_foreground(&self) {
		self.resume(now_millis(), Signal::Lifecycle);
	}

	fn on_background(&self) {
		self.pause(now_millis(), Signal::Lifecycle);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identity::InstallIdentity;
	use crate::prefs::MemoryPreferences;
	use crate::store::{EventStore, MemoryEventStore};

	const T0: i64 = 1_700_000_000_000;

	struct Fixture {
		store: Arc<MemoryEventStore>,
		prefs: Arc<MemoryPreferences>,
		hub: Arc<LifecycleHub>,
		capture: Arc<EventCapture>,
	}

	impl Fixture {
		fn new() -> Self {
			let store = Arc::new(MemoryEventStore::new());
			let prefs = Arc::new(MemoryPreferences::new());
			let identity = Arc::new(InstallIdentity::new(prefs.clone()));
			let capture = Arc::new(EventCapture::new(store.clone(), identity, prefs.clone()));
			capture.set_ready(true);
			Self {
				store,
				prefs,
				hub: Arc::new(LifecycleHub::new()),
				capture,
			}
		}

		fn manager(&self) -> Arc<SessionManager> {
			SessionManager::new(
				self.capture.clone(),
				self.prefs.clone(),
				self.hub.clone(),
				DeviceProperties::current("loom-telemetry-rust", "0.0.0"),
				DEFAULT_SESSION_TIMEOUT,
			)
		}

		fn types(&self) -> Vec<String> {
			self
				.store
				.pending()
				.unwrap()
				.iter()
				.map(|q| q.event.event_type().unwrap_or_default().to_string())
				.collect()
		}
	}

	#[test]
	fn first_resume_starts_a_session() {
		let f = Fixture::new();
		let session = f.manager();

		session.resume_at(T0);

		assert_eq!(session.state(), SessionState::Open);
		assert_eq!(f.types(), vec![event_types::SESSION_START]);
		let pending = f.store.pending().unwrap();
		assert_eq!(pending[0].event.timestamp(), T0);
		assert_eq!(session.record().unwrap().start_timestamp, T0);
	}

	#[test]
	fn pause_ends_with_duration() {
		let f = Fixture::new();
		let session = f.manager();

		session.resume_at(T0);
		session.pause_at(T0 + 30_000);

		assert_eq!(session.state(), SessionState::Closed);
		assert_eq!(
			f.types(),
			vec![event_types::SESSION_START, event_types::SESSION_END]
		);
		let end = &f.store.pending().unwrap()[1];
		assert_eq!(end.event.properties().get("duration"), Some(&Value::from(30.0)));
		assert_eq!(end.event.timestamp(), T0 + 30_000);
	}

	#[test]
	fn resume_within_timeout_continues() {
		let f = Fixture::new();
		let session = f.manager();

		session.resume_at(T0);
		session.pause_at(T0 + 10_000);
		session.resume_at(T0 + 25_000);
		session.pause_at(T0 + 40_000);

		assert_eq!(
			f.types(),
			vec![
				event_types::SESSION_START,
				event_types::SESSION_END,
				event_types::SESSION_END
			]
		);
		assert_eq!(session.record().unwrap().start_timestamp, T0);
		let last = &f.store.pending().unwrap()[2];
		assert_eq!(last.event.properties().get("duration"), Some(&Value::from(40.0)));
	}

	#[test]
	fn resume_after_timeout_starts_new_session() {
		let f = Fixture::new();
		let session = f.manager();

		session.resume_at(T0);
		session.pause_at(T0 + 1_000);
		session.resume_at(T0 + 1_000 + 20_001);

		assert_eq!(
			f.types(),
			vec![
				event_types::SESSION_START,
				event_types::SESSION_END,
				event_types::SESSION_START
			]
		);
		assert_eq!(session.record().unwrap().start_timestamp, T0 + 21_001);
	}

	#[test]
	fn repeated_signals_are_ignored() {
		let f = Fixture::new();
		let session = f.manager();

		session.pause_at(T0);
		session.resume_at(T0);
		session.resume_at(T0 + 1);
		session.pause_at(T0 + 2);
		session.pause_at(T0 + 3);

		assert_eq!(
			f.types(),
			vec![event_types::SESSION_START, event_types::SESSION_END]
		);
	}

	#[test]
	fn lifecycle_signals_drive_the_machine_only_when_enabled() {
		let f = Fixture::new();
		let session = f.manager();

		f.hub.resumed();
		assert!(f.store.is_empty().unwrap());

		session.set_enabled(true);
		assert!(session.is_enabled());
		assert!(f.store.is_empty().unwrap());

		f.hub.resumed();
		f.hub.paused();
		assert_eq!(
			f.types(),
			vec![event_types::SESSION_START, event_types::SESSION_END]
		);

		session.set_enabled(false);
		f.hub.resumed();
		assert_eq!(f.store.len().unwrap(), 2);
		assert_eq!(f.hub.observer_count(), 0);
	}

	#[test]
	fn disabling_while_open_closes_silently() {
		let f = Fixture::new();
		let session = f.manager();
		session.set_enabled(true);

		f.hub.resumed();
		session.set_enabled(false);

		assert_eq!(session.state(), SessionState::Closed);
		assert_eq!(f.types(), vec![event_types::SESSION_START]);
		assert!(session.record().unwrap().last_active_timestamp.is_some());

		session.set_enabled(true);
		f.hub.resumed();
		assert_eq!(f.types(), vec![event_types::SESSION_START]);
		assert_eq!(session.state(), SessionState::Open);
	}

	#[test]
	fn stale_signals_after_disabling_are_ignored() {
		let f = Fixture::new();
		let session = f.manager();
		session.set_enabled(true);
		let observer: Arc<dyn LifecycleObserver> = session.clone();

		session.set_enabled(false);
		observer.on_foreground();

		assert_eq!(session.state(), SessionState::Closed);
		assert!(f.types().is_empty());

		session.resume_at(T0);
		observer.on_background();

		assert_eq!(session.state(), SessionState::Open);
		assert_eq!(f.types(), vec![event_types::SESSION_START]);
	}

	#[test]
	fn enabling_twice_subscribes_once() {
		let f = Fixture::new();
		let session = f.manager();

		session.set_enabled(true);
		session.set_enabled(true);

		assert_eq!(f.hub.observer_count(), 1);
		assert_eq!(
			f.prefs.get_bool(keys::AUTOMATIC_SESSION_TRACKING).unwrap(),
			Some(true)
		);
	}

	#[test]
	fn record_survives_restart() {
		let f = Fixture::new();
		let first = f.manager();
		first.resume_at(T0);
		first.pause_at(T0 + 5_000);
		drop(first);

		let restarted = f.manager();
		assert_eq!(
			restarted.record(),
			Some(SessionRecord {
				start_timestamp: T0,
				last_active_timestamp: Some(T0 + 5_000),
			})
		);
		restarted.resume_at(T0 + 15_000);

		assert_eq!(
			f.types(),
			vec![event_types::SESSION_START, event_types::SESSION_END]
		);
	}

	#[test]
	fn timeout_is_adjustable() {
		let f = Fixture::new();
		let session = f.manager();
		session.set_timeout(Duration::from_secs(60));

		session.resume_at(T0);
		session.pause_at(T0 + 1_000);
		session.resume_at(T0 + 50_000);

		assert_eq!(session.timeout(), Duration::from_secs(60));
		assert_eq!(f.store.len().unwrap(), 2);
	}
}
