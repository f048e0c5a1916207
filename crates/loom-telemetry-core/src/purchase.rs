// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Property payloads of the payment and installation events.

use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// A completed purchase tracked through `track_payment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedItem {
	pub value: f64,
	pub currency: String,
	pub payment_system: String,
	pub product_id: String,
	pub product_title: String,
	#[serde(default)]
	pub receipt: Option<String>,
}

impl PurchasedItem {
	pub fn to_properties(&self) -> Properties {
		Properties::new()
			.insert("brutto", self.value)
			.insert("currency", self.currency.clone())
			.insert("payment_system", self.payment_system.clone())
			.insert("item_id", self.product_id.clone())
			.insert("product_title", self.product_title.clone())
			.insert_opt("receipt", self.receipt.clone())
	}
}

/// Device and campaign metadata attached to the installation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProperties {
	pub campaign: Option<String>,
	pub campaign_id: Option<String>,
	pub link: Option<String>,
	pub device_type: String,
	pub os_name: String,
	pub sdk: String,
	pub sdk_version: String,
}

impl DeviceProperties {
	/// Properties of the running process, with no campaign attribution.
	pub fn current(sdk: impl Into<String>, sdk_version: impl Into<String>) -> Self {
		Self {
			campaign: None,
			campaign_id: None,
			link: None,
			device_type: "desktop".to_string(),
			os_name: std::env::consts::OS.to_string(),
			sdk: sdk.into(),
			sdk_version: sdk_version.into(),
		}
	}

	pub fn with_campaign(
		mut self,
		campaign: Option<String>,
		campaign_id: Option<String>,
		link: Option<String>,
	) -> Self {
		self.campaign = campaign;
		self.campaign_id = campaign_id;
		self.link = link;
		self
	}

	pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
		self.device_type = device_type.into();
		self
	}

	pub fn to_properties(&self) -> Properties {
		Properties::new()
			.insert_opt("campaign", self.campaign.clone())
			.insert_opt("campaign_id", self.campaign_id.clone())
			.insert_opt("link", self.link.clone())
			.insert("device_type", self.device_type.clone())
			.insert("os_name", self.os_name.clone())
			.insert("sdk", self.sdk.clone())
			.insert("sdk_version", self.sdk_version.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn purchased_item_properties() {
		let item = PurchasedItem {
			value: 4.99,
			currency: "EUR".into(),
			payment_system: "store".into(),
			product_id: "sku-1".into(),
			product_title: "Gems".into(),
			receipt: None,
		};
		let props = item.to_properties();

		assert_eq!(props.get("brutto"), Some(&serde_json::json!(4.99)));
		assert_eq!(props.get("item_id"), Some(&serde_json::json!("sku-1")));
		assert!(props.get("receipt").is_none());
	}

	#[test]
	fn device_properties_carry_campaign() {
		let device = DeviceProperties::current("sdk", "1.0").with_campaign(
			Some("spring".into()),
			None,
			Some("https://example.com/x".into()),
		);
		let props = device.to_properties();

		assert_eq!(props.get("campaign"), Some(&serde_json::json!("spring")));
		assert!(props.get("campaign_id").is_none());
		assert_eq!(props.get("os_name"), Some(&serde_json::json!(std::env::consts::OS)));
	}
}
