// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracked events and the customer identity they belong to.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// Event type tags synthesized by the SDK itself.
pub mod event_types {
	pub const INSTALLATION: &str = "installation";
	pub const SESSION_START: &str = "session_start";
	pub const SESSION_END: &str = "session_end";
	pub const PAYMENT: &str = "payment";
	pub const CAMPAIGN: &str = "campaign";
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
	Utc::now().timestamp_millis()
}

/// Selects the remote endpoint an [`Event`] is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
	/// Updates properties stored on the customer.
	CustomerPropertyUpdate,
	/// Appends an event to the customer's timeline.
	TrackEvent,
}

impl fmt::Display for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Route::CustomerPropertyUpdate => write!(f, "customer_property_update"),
			Route::TrackEvent => write!(f, "track_event"),
		}
	}
}

/// Identifying key/value pairs of a customer.
///
/// The `cookie` identifier is the per-installation id generated by the SDK;
/// `registered` is the host's own (external) customer id. Any other key the
/// project defines can be added with [`CustomerIds::with`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerIds(BTreeMap<String, String>);

impl CustomerIds {
	pub const COOKIE: &'static str = "cookie";
	pub const REGISTERED: &'static str = "registered";

	pub fn new() -> Self {
		Self(BTreeMap::new())
	}

	pub fn with_cookie(self, cookie: impl Into<String>) -> Self {
		self.with(Self::COOKIE, cookie)
	}

	pub fn with_registered(self, registered: impl Into<String>) -> Self {
		self.with(Self::REGISTERED, registered)
	}

	/// Adds an arbitrary identifier, replacing any previous value for `key`.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.0.insert(key.into(), value.into());
		self
	}

	pub fn cookie(&self) -> Option<&str> {
		self.get(Self::COOKIE)
	}

	pub fn registered(&self) -> Option<&str> {
		self.get(Self::REGISTERED)
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// A tracked record waiting for delivery.
///
/// Built once through the `with_*` methods and immutable afterwards; the
/// event store owns it until it is delivered or dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	event_type: Option<String>,
	/// Epoch milliseconds.
	timestamp: i64,
	#[serde(default)]
	customer_ids: CustomerIds,
	#[serde(default)]
	properties: Properties,
	route: Route,
}

impl Event {
	/// Creates an event for `route` stamped with the current time.
	pub fn new(route: Route) -> Self {
		Self {
			event_type: None,
			timestamp: now_millis(),
			customer_ids: CustomerIds::new(),
			properties: Properties::new(),
			route,
		}
	}

	pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
		self.event_type = Some(event_type.into());
		self
	}

	pub fn with_timestamp(mut self, timestamp_millis: i64) -> Self {
		self.timestamp = timestamp_millis;
		self
	}

	pub fn with_customer_ids(mut self, customer_ids: CustomerIds) -> Self {
		self.customer_ids = customer_ids;
		self
	}

	pub fn with_properties(mut self, properties: Properties) -> Self {
		self.properties = properties;
		self
	}

	pub fn event_type(&self) -> Option<&str> {
		self.event_type.as_deref()
	}

	pub fn timestamp(&self) -> i64 {
		self.timestamp
	}

	pub fn customer_ids(&self) -> &CustomerIds {
		&self.customer_ids
	}

	pub fn properties(&self) -> &Properties {
		&self.properties
	}

	pub fn route(&self) -> Route {
		self.route
	}

	/// JSON body expected by the tracking endpoint of this event's route.
	///
	/// The tracking API takes timestamps as fractional epoch seconds.
	pub fn to_request_body(&self) -> serde_json::Value {
		match self.route {
			Route::CustomerPropertyUpdate => serde_json::json!({
				"customer_ids": self.customer_ids,
				"properties": self.properties,
			}),
			Route::TrackEvent => {
				let mut body = serde_json::json!({
					"customer_ids": self.customer_ids,
					"properties": self.properties,
					"timestamp": self.timestamp as f64 / 1000.0,
				});
				if let Some(event_type) = &self.event_type {
					body["event_type"] = serde_json::Value::String(event_type.clone());
				}
				body
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn customer_ids_builders() {
		let ids = CustomerIds::new()
			.with_cookie("c-1")
			.with_registered("alice@example.com")
			.with("loyalty", "L42");

		assert_eq!(ids.len(), 3);
		assert_eq!(ids.cookie(), Some("c-1"));
		assert_eq!(ids.registered(), Some("alice@example.com"));
		assert_eq!(ids.get("loyalty"), Some("L42"));
	}

	#[test]
	fn customer_ids_serialize_as_flat_map() {
		let ids = CustomerIds::new().with_registered("bob");
		let json = serde_json::to_value(&ids).unwrap();
		assert_eq!(json, serde_json::json!({"registered": "bob"}));
	}

	#[test]
	fn event_defaults_to_now() {
		let before = now_millis();
		let event = Event::new(Route::TrackEvent);
		let after = now_millis();

		assert!(event.timestamp() >= before && event.timestamp() <= after);
		assert!(event.event_type().is_none());
		assert!(event.customer_ids().is_empty());
	}

	#[test]
	fn track_event_body_uses_seconds() {
		let event = Event::new(Route::TrackEvent)
			.with_type("purchase")
			.with_timestamp(1_500)
			.with_customer_ids(CustomerIds::new().with_cookie("abc"))
			.with_properties(Properties::new().insert("price", 10));

		let body = event.to_request_body();
		assert_eq!(body["event_type"], "purchase");
		assert_eq!(body["timestamp"], 1.5);
		assert_eq!(body["customer_ids"]["cookie"], "abc");
		assert_eq!(body["properties"]["price"], 10);
	}

	#[test]
	fn property_update_body_has_no_event_fields() {
		let event = Event::new(Route::CustomerPropertyUpdate)
			.with_customer_ids(CustomerIds::new().with_registered("r"))
			.with_properties(Properties::new().insert("first_name", "Ann"));

		let body = event.to_request_body();
		assert!(body.get("event_type").is_none());
		assert!(body.get("timestamp").is_none());
		assert_eq!(body["properties"]["first_name"], "Ann");
	}

	#[test]
	fn event_survives_storage_encoding() {
		let event = Event::new(Route::TrackEvent)
			.with_type("session_start")
			.with_customer_ids(CustomerIds::new().with_cookie("x"));

		let stored = serde_json::to_string(&event).unwrap();
		assert!(stored.contains("\"type\":\"session_start\""));
		let restored: Event = serde_json::from_str(&stored).unwrap();
		assert_eq!(restored, event);
	}

	#[test]
	fn route_display() {
		assert_eq!(Route::TrackEvent.to_string(), "track_event");
		assert_eq!(
			Route::CustomerPropertyUpdate.to_string(),
			"customer_property_update"
		);
	}
}
