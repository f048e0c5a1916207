// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turns caller input into queued events.
//!
//! Capture is synchronous and local: it builds an [`Event`] and appends it to
//! the [`EventStore`]. Delivery is left to the flush controller. Nothing here
//! returns an error to the host; failures are logged and the call becomes a
//! no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use loom_telemetry_core::{event_types, CustomerIds, DeviceProperties, Event, Properties, Route};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::TelemetryError;
use crate::identity::InstallIdentity;
use crate::prefs::{keys, Preferences, PreferencesExt};
use crate::store::{EventStore, QueuedEvent};

pub struct EventCapture {
	ready: AtomicBool,
	store: Arc<dyn EventStore>,
	identity: Arc<InstallIdentity>,
	prefs: Arc<dyn Preferences>,
	install_lock: Mutex<()>,
}

impl EventCapture {
	/// Creates a capture stage that starts out not ready.
	pub fn new(
		store: Arc<dyn EventStore>,
		identity: Arc<InstallIdentity>,
		prefs: Arc<dyn Preferences>,
	) -> Self {
		Self {
			ready: AtomicBool::new(false),
			store,
			identity,
			prefs,
			install_lock: Mutex::new(()),
		}
	}

	pub fn set_ready(&self, ready: bool) {
		self.ready.store(ready, Ordering::SeqCst);
	}

	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::SeqCst)
	}

	/// Queues one event.
	///
	/// `timestamp` is epoch milliseconds and defaults to now. Missing or empty
	/// `customer_ids` are replaced by the installation cookie, and the cookie
	/// is added to any id set that lacks it. Returns the queued event, or
	/// `None` when nothing was appended.
	pub fn capture(
		&self,
		event_type: Option<&str>,
		timestamp: Option<i64>,
		customer_ids: Option<CustomerIds>,
		properties: Properties,
		route: Route,
	) -> Option<QueuedEvent> {
		if !self.is_ready() {
			warn!(error = %TelemetryError::NotInitialized, route = %route, "dropping captured event");
			return None;
		}

		let customer_ids = self.resolve_customer_ids(customer_ids.unwrap_or_default())?;

		let mut event = Event::new(route)
			.with_customer_ids(customer_ids)
			.with_properties(properties);
		if let Some(event_type) = event_type {
			event = event.with_type(event_type);
		}
		if let Some(timestamp) = timestamp {
			event = event.with_timestamp(timestamp);
		}

		match self.store.append(event) {
			Ok(queued) => {
				debug!(
					id = queued.id,
					route = %route,
					event_type = queued.event.event_type().unwrap_or_default(),
					"event queued"
				);
				Some(queued)
			}
			Err(e) => {
				error!(error = %e, route = %route, "failed to queue event");
				None
			}
		}
	}

	/// Queues the `installation` event unless this installation already sent it.
	///
	/// Reading and setting the device-initiated flag happen under one lock, so
	/// concurrent callers emit at most one event. Returns whether it was queued.
	pub fn track_install(&self, device: &DeviceProperties) -> bool {
		if !self.is_ready() {
			warn!(error = %TelemetryError::NotInitialized, "skipping install tracking");
			return false;
		}

		let Ok(_guard) = self.install_lock.lock() else {
			error!("install tracking lock poisoned");
			return false;
		};

		match self.prefs.get_bool(keys::DEVICE_INITIATED) {
			Ok(Some(true)) => return false,
			Ok(_) => {}
			Err(e) => {
				error!(error = %e, "failed to read device-initiated flag");
				return false;
			}
		}

		let queued = self.capture(
			Some(event_types::INSTALLATION),
			None,
			None,
			device.to_properties(),
			Route::TrackEvent,
		);
		if queued.is_none() {
			return false;
		}

		if let Err(e) = self.prefs.set(keys::DEVICE_INITIATED, Value::Bool(true)) {
			error!(error = %e, "failed to persist device-initiated flag");
		}
		info!("installation event queued");
		true
	}

	fn resolve_customer_ids(&self, customer_ids: CustomerIds) -> Option<CustomerIds> {
		if customer_ids.cookie().is_some() {
			return Some(customer_ids);
		}
		match self.identity.cookie() {
			Ok(cookie) => Some(customer_ids.with_cookie(cookie)),
			Err(e) if customer_ids.is_empty() => {
				error!(error = %e, "no customer identifier available, dropping event");
				None
			}
			Err(e) => {
				warn!(error = %e, "installation cookie unavailable");
				Some(customer_ids)
			}
		}
	}
}
