// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracks a few events and flushes them.
//!
//! ```sh
//! LOOM_TELEMETRY_PROJECT_TOKEN=... \
//! LOOM_TELEMETRY_AUTHORIZATION="Token ..." \
//! LOOM_TELEMETRY_BASE_URL=https://api.example.com \
//! RUST_LOG=loom_telemetry=debug \
//! cargo run -p loom-telemetry --example track
//! ```

use loom_telemetry::{FlushOutcome, TelemetryClient, TelemetryConfig};
use loom_telemetry_core::{CustomerIds, FlushMode, Properties, PurchasedItem};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let mut config = TelemetryConfig::default().apply_env()?;
	config.flush_mode = FlushMode::Manual;

	let client = TelemetryClient::builder().config(config).init()?;
	client.lifecycle().resumed();

	let customer = CustomerIds::new().with_registered("demo@example.com");
	client.update_customer_properties(
		customer.clone(),
		Properties::new().insert("first_name", "Demo"),
	);
	client.track_customer_event(
		customer.clone(),
		"page_view",
		Properties::new().insert("path", "/pricing"),
		None,
	);
	client.track_payment(
		customer,
		&PurchasedItem {
			value: 9.99,
			currency: "USD".into(),
			payment_system: "demo".into(),
			product_id: "starter".into(),
			product_title: "Starter plan".into(),
			receipt: None,
		},
		None,
	);

	client.lifecycle().paused();

	match client.flush().await {
		FlushOutcome::Completed(report) => println!(
			"delivered {} of {} events ({} retained, {} dropped)",
			report.delivered, report.attempted, report.retained, report.dropped
		),
		FlushOutcome::Rejected => println!("a flush was already running"),
	}

	client.shutdown();
	Ok(())
}
