// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-installation identity cookie.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::prefs::{keys, Preferences, PreferencesExt};

/// The installation cookie: generated on first use, persisted, and never
/// regenerated while the preferences survive.
pub struct InstallIdentity {
	prefs: Arc<dyn Preferences>,
	cached: Mutex<Option<String>>,
}

impl InstallIdentity {
	pub fn new(prefs: Arc<dyn Preferences>) -> Self {
		Self {
			prefs,
			cached: Mutex::new(None),
		}
	}

	/// Returns the cookie, creating and persisting it on first call.
	///
	/// The lock covers the read, the generation and the write, so concurrent
	/// first calls agree on one cookie.
	pub fn cookie(&self) -> Result<String, StoreError> {
		let mut cached = self.cached.lock().map_err(|_| StoreError::Poisoned)?;
		if let Some(cookie) = cached.as_ref() {
			return Ok(cookie.clone());
		}

		let cookie = match self.prefs.get_string(keys::INSTALL_COOKIE)? {
			Some(existing) => existing,
			None => {
				let generated = Uuid::new_v4().to_string();
				self
					.prefs
					.set(keys::INSTALL_COOKIE, Value::String(generated.clone()))?;
				info!(cookie = %generated, "generated installation cookie");
				generated
			}
		};

		*cached = Some(cookie.clone());
		Ok(cookie)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::prefs::MemoryPreferences;

	#[test]
	fn cookie_is_stable() {
		let prefs: Arc<dyn Preferences> = Arc::new(MemoryPreferences::new());
		let identity = InstallIdentity::new(prefs.clone());

		let first = identity.cookie().unwrap();
		let second = identity.cookie().unwrap();
		assert_eq!(first, second);
		assert!(Uuid::parse_str(&first).is_ok());
	}

	#[test]
	fn cookie_is_read_back_after_restart() {
		let prefs: Arc<dyn Preferences> = Arc::new(MemoryPreferences::new());
		let original = InstallIdentity::new(prefs.clone()).cookie().unwrap();

		let restarted = InstallIdentity::new(prefs);
		assert_eq!(restarted.cookie().unwrap(), original);
	}

	#[test]
	fn concurrent_first_use_yields_one_cookie() {
		let prefs: Arc<dyn Preferences> = Arc::new(MemoryPreferences::new());
		let identity = Arc::new(InstallIdentity::new(prefs));

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let identity = identity.clone();
				std::thread::spawn(move || identity.cookie().unwrap())
			})
			.collect();
		let cookies: std::collections::HashSet<String> =
			handles.into_iter().map(|h| h.join().unwrap()).collect();

		assert_eq!(cookies.len(), 1);
	}
}
