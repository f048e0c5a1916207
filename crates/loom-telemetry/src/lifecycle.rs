// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Foreground/background signals from the host application.
//!
//! The host forwards its own lifecycle notifications into a [`LifecycleHub`]
//! by calling [`LifecycleHub::resumed`] and [`LifecycleHub::paused`]. The hub
//! fans them out to every subscribed [`LifecycleObserver`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

/// Receives the host's foreground transitions.
pub trait LifecycleObserver: Send + Sync {
	fn on_foreground(&self);
	fn on_background(&self);
}

/// Handle returned by [`LifecycleHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct LifecycleHub {
	next_id: AtomicU64,
	observers: Mutex<Vec<(SubscriptionId, Arc<dyn LifecycleObserver>)>>,
}

impl LifecycleHub {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
		if let Ok(mut observers) = self.observers.lock() {
			observers.push((id, observer));
		}
		debug!(subscription = id.0, "lifecycle observer subscribed");
		id
	}

	/// Removes a subscription; returns whether it was registered.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let Ok(mut observers) = self.observers.lock() else {
			return false;
		};
		let before = observers.len();
		observers.retain(|(existing, _)| *existing != id);
		let removed = observers.len() != before;
		if removed {
			debug!(subscription = id.0, "lifecycle observer unsubscribed");
		}
		removed
	}

	pub fn observer_count(&self) -> usize {
		self.observers.lock().map(|o| o.len()).unwrap_or_default()
	}

	/// The host application came to the foreground.
	pub fn resumed(&self) {
		trace!("lifecycle resumed");
		for observer in self.snapshot() {
			observer.on_foreground();
		}
	}

	/// The host application went to the background.
	pub fn paused(&self) {
		trace!("lifecycle paused");
		for observer in self.snapshot() {
			observer.on_background();
		}
	}

	// Observers run outside the lock so they may unsubscribe themselves.
	fn snapshot(&self) -> Vec<Arc<dyn LifecycleObserver>> {
		self
			.observers
			.lock()
			.map(|observers| observers.iter().map(|(_, o)| o.clone()).collect())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	#[derive(Default)]
	struct Counter {
		foreground: AtomicUsize,
		background: AtomicUsize,
	}

	impl LifecycleObserver for Counter {
		fn on_foreground(&self) {
			self.foreground.fetch_add(1, Ordering::SeqCst);
		}

		fn on_background(&self) {
			self.background.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[test]
	fn signals_reach_subscribers() {
		let hub = LifecycleHub::new();
		let counter = Arc::new(Counter::default());
		hub.subscribe(counter.clone());

		hub.resumed();
		hub.paused();
		hub.resumed();

		assert_eq!(counter.foreground.load(Ordering::SeqCst), 2);
		assert_eq!(counter.background.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn unsubscribed_observer_is_silent() {
		let hub = LifecycleHub::new();
		let counter = Arc::new(Counter::default());
		let id = hub.subscribe(counter.clone());

		assert!(hub.unsubscribe(id));
		assert!(!hub.unsubscribe(id));
		hub.resumed();

		assert_eq!(counter.foreground.load(Ordering::SeqCst), 0);
		assert_eq!(hub.observer_count(), 0);
	}

	#[test]
	fn subscriptions_are_distinct() {
		let hub = LifecycleHub::new();
		let a = hub.subscribe(Arc::new(Counter::default()));
		let b = hub.subscribe(Arc::new(Counter::default()));
		assert_ne!(a, b);
		assert_eq!(hub.observer_count(), 2);
	}
}
