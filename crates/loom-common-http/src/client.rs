// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with the telemetry SDK User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// SDK name reported in the User-Agent and in tracked device properties.
pub const SDK_NAME: &str = "loom-telemetry-rust";

/// Creates a new HTTP client builder with the standard SDK User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = loom_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// Returns the standard SDK User-Agent string.
///
/// Format: `loom-telemetry-rust/{version} ({os}; {arch})`
pub fn user_agent() -> String {
	format!(
		"{}/{} ({}; {})",
		SDK_NAME,
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
