// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable key-value preferences.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Keys the SDK persists.
pub mod keys {
	pub const INSTALL_COOKIE: &str = "install_cookie";
	pub const DEVICE_INITIATED: &str = "device_initiated";
	pub const AUTOMATIC_SESSION_TRACKING: &str = "automatic_session_tracking";
	pub const SESSION_RECORD: &str = "session_record";
}

/// Key-value storage that must survive process restarts.
pub trait Preferences: Send + Sync {
	fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
	fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Typed accessors over any [`Preferences`].
pub trait PreferencesExt: Preferences {
	fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
		Ok(self.get(key)?.and_then(|v| v.as_bool()))
	}

	fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.get(key)?.and_then(|v| v.as_str().map(str::to_owned)))
	}

	/// Reads and decodes `key`; a value of the wrong shape reads as absent.
	fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
		let Some(value) = self.get(key)? else {
			return Ok(None);
		};
		match serde_json::from_value(value) {
			Ok(decoded) => Ok(Some(decoded)),
			Err(e) => {
				warn!(key, error = %e, "ignoring malformed preference");
				Ok(None)
			}
		}
	}

	fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
		self.set(key, serde_json::to_value(value)?)
	}
}

impl<P: Preferences + ?Sized> PreferencesExt for P {}

/// Process-local preferences, for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
	values: Mutex<Map<String, Value>>,
}

impl MemoryPreferences {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Preferences for MemoryPreferences {
	fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
		let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(values.get(key).cloned())
	}

	fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
		let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
		values.insert(key.to_string(), value);
		Ok(())
	}
}

/// Preferences kept in a single JSON object file.
///
/// Every `set` rewrites the file through a temporary file and a rename, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FilePreferences {
	path: PathBuf,
	values: Mutex<Map<String, Value>>,
}

impl FilePreferences {
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();
		let values = if path.exists() {
			let contents = std::fs::read_to_string(&path)?;
			match serde_json::from_str::<Map<String, Value>>(&contents) {
				Ok(values) => values,
				Err(e) => {
					warn!(path = %path.display(), error = %e, "preferences file unreadable, starting empty");
					Map::new()
				}
			}
		} else {
			Map::new()
		};

		debug!(path = %path.display(), count = values.len(), "opened preferences");

		Ok(Self {
			path,
			values: Mutex::new(values),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl Preferences for FilePreferences {
	fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
		let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(values.get(key).cloned())
	}

	fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
		let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
		let previous = values.insert(key.to_string(), value);
		if let Err(e) = write_atomic(&self.path, &Value::Object(values.clone())) {
			match previous {
				Some(previous) => values.insert(key.to_string(), previous),
				None => values.remove(key),
			};
			return Err(e);
		}
		Ok(())
	}
}

/// Writes `value` as JSON to `path` via a sibling temporary file.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	let tmp_path = path.with_extension("json.tmp");
	let json = serde_json::to_vec(value)?;
	std::fs::write(&tmp_path, json)?;
	std::fs::rename(&tmp_path, path)?;
	Ok(())
}
