// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Property maps attached to events and customer updates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A string-keyed map of JSON values carried by an [`Event`](crate::Event).
///
/// # Example
///
/// ```
/// use loom_telemetry_core::Properties;
///
/// let props = Properties::new()
///     .insert("screen", "checkout")
///     .insert("items", 3)
///     .insert("is_premium", true);
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair, replacing any previous value for `key`.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts `value` only when it is present.
	pub fn insert_opt<K, V>(self, key: K, value: Option<V>) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		match value {
			Some(value) => self.insert(key, value),
			None => self,
		}
	}

	/// Adds every entry of `other`; on conflicts `other` wins.
	pub fn extend(mut self, other: Properties) -> Self {
		self.inner.extend(other.inner);
		self
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.inner.iter()
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(inner: Map<String, Value>) -> Self {
		Self { inner }
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		Value::Object(props.inner)
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			inner: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}
