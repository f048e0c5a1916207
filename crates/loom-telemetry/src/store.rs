// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable, ordered buffer of events awaiting delivery.
//!
//! Every operation takes the store's lock for its whole duration, so an
//! append never interleaves with a removal mid-record. Ids increase
//! monotonically and are the only ordering key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use loom_telemetry_core::Event;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::prefs::write_atomic;

/// An event owned by the store, with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
	pub id: u64,
	/// Failed delivery attempts so far.
	pub tries: u32,
	pub event: Event,
}

pub trait EventStore: Send + Sync {
	/// Appends `event` after every event already queued.
	fn append(&self, event: Event) -> Result<QueuedEvent, StoreError>;

	/// Snapshot of all queued events in insertion order.
	fn pending(&self) -> Result<Vec<QueuedEvent>, StoreError>;

	/// Removes the event with `id`; returns whether it was present.
	fn remove(&self, id: u64) -> Result<bool, StoreError>;

	/// Counts one more failed attempt for `id`; returns the new count.
	fn record_attempt(&self, id: u64) -> Result<Option<u32>, StoreError>;

	fn len(&self) -> Result<usize, StoreError>;

	fn is_empty(&self) -> Result<bool, StoreError> {
		Ok(self.len()? == 0)
	}
}

#[derive(Debug, Default)]
struct QueueState {
	next_id: u64,
	events: BTreeMap<u64, QueuedEvent>,
}

impl QueueState {
	fn next(&mut self, event: Event) -> QueuedEvent {
		self.next_id += 1;
		QueuedEvent {
			id: self.next_id,
			tries: 0,
			event,
		}
	}

	fn pending(&self) -> Vec<QueuedEvent> {
		self.events.values().cloned().collect()
	}
}

/// Non-durable store; contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
	state: Mutex<QueueState>,
}

impl MemoryEventStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl EventStore for MemoryEventStore {
	fn append(&self, event: Event) -> Result<QueuedEvent, StoreError> {
		let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		let queued = state.next(event);
		state.events.insert(queued.id, queued.clone());
		Ok(queued)
	}

	fn pending(&self) -> Result<Vec<QueuedEvent>, StoreError> {
		let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(state.pending())
	}

	fn remove(&self, id: u64) -> Result<bool, StoreError> {
		let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(state.events.remove(&id).is_some())
	}

	fn record_attempt(&self, id: u64) -> Result<Option<u32>, StoreError> {
		let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(state.events.get_mut(&id).map(|queued| {
			queued.tries += 1;
			queued.tries
		}))
	}

	fn len(&self) -> Result<usize, StoreError> {
		let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(state.events.len())
	}
}

/// Store persisted as one JSON file per event under a directory.
///
/// Each change touches only the record it concerns, so the cost of a capture
/// does not grow with the backlog. Records are written atomically, and a
/// change is committed to memory only after its file operation succeeds.
///
/// Ids continue from the highest record found at open, so an id whose record
/// was already removed may be handed out again after a restart.
#[derive(Debug)]
pub struct FileEventStore {
	dir: PathBuf,
	state: Mutex<QueueState>,
}

impl FileEventStore {
	/// Opens the queue in `dir`, restoring events left by a previous process.
	///
	/// Unreadable records are logged and deleted; the rest are kept.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let dir = dir.into();
		std::fs::create_dir_all(&dir)?;

		let mut state = QueueState::default();
		for entry in std::fs::read_dir(&dir)? {
			let path = entry?.path();
			if path.extension().and_then(|e| e.to_str()) != Some("json") {
				continue;
			}
			match read_record(&path) {
				Ok(queued) => {
					state.next_id = state.next_id.max(queued.id);
					state.events.insert(queued.id, queued);
				}
				Err(e) => {
					warn!(path = %path.display(), error = %e, "queued event unreadable, discarding");
					if let Err(e) = std::fs::remove_file(&path) {
						warn!(path = %path.display(), error = %e, "failed to discard queued event");
					}
				}
			}
		}

		debug!(
			dir = %dir.display(),
			count = state.events.len(),
			"opened event queue"
		);

		Ok(Self {
			dir,
			state: Mutex::new(state),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn record_path(&self, id: u64) -> PathBuf {
		// Zero-padded so a directory listing sorts in queue order.
		self.dir.join(format!("{id:020}.json"))
	}
}

fn read_record(path: &Path) -> Result<QueuedEvent, StoreError> {
	let contents = std::fs::read_to_string(path)?;
	Ok(serde_json::from_str(&contents)?)
}

impl EventStore for FileEventStore {
	fn append(&self, event: Event) -> Result<QueuedEvent, StoreError> {
		let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		let next_id = state.next_id;
		let queued = state.next(event);
		if let Err(e) = write_atomic(&self.record_path(queued.id), &queued) {
			state.next_id = next_id;
			return Err(e);
		}
		state.events.insert(queued.id, queued.clone());
		Ok(queued)
	}

	fn pending(&self) -> Result<Vec<QueuedEvent>, StoreError> {
		let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(state.pending())
	}

	fn remove(&self, id: u64) -> Result<bool, StoreError> {
		let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		if !state.events.contains_key(&id) {
			return Ok(false);
		}
		match std::fs::remove_file(self.record_path(id)) {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}
		state.events.remove(&id);
		Ok(true)
	}

	fn record_attempt(&self, id: u64) -> Result<Option<u32>, StoreError> {
		let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		let Some(current) = state.events.get(&id) else {
			return Ok(None);
		};
		let mut updated = current.clone();
		updated.tries += 1;
		write_atomic(&self.record_path(id), &updated)?;
		let tries = updated.tries;
		state.events.insert(id, updated);
		Ok(Some(tries))
	}

	fn len(&self) -> Result<usize, StoreError> {
		let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
		Ok(state.events.len())
	}
}
