// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request payloads and response schemas of the read-side endpoints.
//!
//! Each request type pairs with one statically declared response schema;
//! the SDK's fetch gateway decodes responses against it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::CustomerIds;

/// A recommendation model evaluated for the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecommendation {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub strategy: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub knowledge: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub anti: Option<bool>,
}

impl CustomerRecommendation {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			size: None,
			strategy: None,
			knowledge: None,
			anti: None,
		}
	}

	pub fn with_size(mut self, size: u32) -> Self {
		self.size = Some(size);
		self
	}

	pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
		self.strategy = Some(strategy.into());
		self
	}
}

/// One attribute to evaluate for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomerAttribute {
	Property { property: String },
	Id { id: String },
	Segmentation { id: String },
	Expression { id: String },
	Prediction { id: String },
	Aggregate { id: String },
	Recommendation(CustomerRecommendation),
}

/// Payload of the customer attributes fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerAttributesRequest {
	pub customer_ids: CustomerIds,
	pub attributes: Vec<CustomerAttribute>,
}

impl CustomerAttributesRequest {
	pub fn new(customer_ids: CustomerIds) -> Self {
		Self {
			customer_ids,
			attributes: Vec::new(),
		}
	}

	pub fn with_attribute(mut self, attribute: CustomerAttribute) -> Self {
		self.attributes.push(attribute);
		self
	}

	pub fn with_property(self, property: impl Into<String>) -> Self {
		self.with_attribute(CustomerAttribute::Property {
			property: property.into(),
		})
	}

	pub fn with_expression(self, id: impl Into<String>) -> Self {
		self.with_attribute(CustomerAttribute::Expression { id: id.into() })
	}

	pub fn with_segmentation(self, id: impl Into<String>) -> Self {
		self.with_attribute(CustomerAttribute::Segmentation { id: id.into() })
	}

	pub fn with_prediction(self, id: impl Into<String>) -> Self {
		self.with_attribute(CustomerAttribute::Prediction { id: id.into() })
	}
}

/// One evaluated attribute in the attributes response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAttributeModel {
	pub success: bool,
	#[serde(default)]
	pub value: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
	Asc,
	#[default]
	Desc,
}

/// Payload of the customer events fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerEventsRequest {
	pub customer_ids: CustomerIds,
	pub event_types: Vec<String>,
	#[serde(rename = "order")]
	pub sort_order: SortOrder,
	pub limit: u32,
	pub skip: u32,
}

impl CustomerEventsRequest {
	pub fn new(customer_ids: CustomerIds, event_types: Vec<String>) -> Self {
		Self {
			customer_ids,
			event_types,
			sort_order: SortOrder::Desc,
			limit: 3,
			skip: 100,
		}
	}

	pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
		self.sort_order = sort_order;
		self
	}

	pub fn with_limit(mut self, limit: u32) -> Self {
		self.limit = limit;
		self
	}

	pub fn with_skip(mut self, skip: u32) -> Self {
		self.skip = skip;
		self
	}
}

/// A past event of the customer as returned by the events fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerEvent {
	#[serde(rename = "type", default)]
	pub event_type: Option<String>,
	/// Fractional epoch seconds.
	#[serde(default)]
	pub timestamp: Option<f64>,
	#[serde(default)]
	pub properties: Map<String, Value>,
}

/// The banner configuration fetch takes no payload beyond the project token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BannerConfigRequest;

/// A configured personalisation (banner) of the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personalization {
	pub id: String,
	#[serde(default)]
	pub frequency: Option<String>,
	#[serde(default)]
	pub trigger: Option<Value>,
	#[serde(default)]
	pub date_filter: Option<Value>,
}

/// Payload of the banner fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannerRequest {
	pub customer_ids: CustomerIds,
	pub personalisation_ids: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timezone: Option<String>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub params: Map<String, Value>,
}

impl BannerRequest {
	pub fn new(customer_ids: CustomerIds, personalisation_ids: Vec<String>) -> Self {
		Self {
			customer_ids,
			personalisation_ids,
			..Default::default()
		}
	}
}

/// Rendered banner content for one personalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerResult {
	#[serde(default)]
	pub personalisation_id: Option<String>,
	#[serde(default)]
	pub html: Option<String>,
	#[serde(default)]
	pub script: Option<String>,
	#[serde(default)]
	pub style: Option<String>,
}
