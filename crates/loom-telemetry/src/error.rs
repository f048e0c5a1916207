// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the telemetry SDK.
//!
//! None of these cross into the host application: the public entry points
//! log them, turn them into a [`ResultEnvelope`](loom_telemetry_core::ResultEnvelope)
//! failure, or leave the affected event queued for the next flush. The flush
//! worker classifies delivery failures through [`RetryableError`].

use loom_common_http::{is_retryable_status, RetryableError};
use thiserror::Error;

use crate::config::ConfigError;

/// No response was obtained from the network.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		Self(e.to_string())
	}
}

/// Failures of local persistence (event queue and preferences).
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("store lock poisoned")]
	Poisoned,
}

/// Telemetry SDK errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
	/// The SDK was used before a successful `init` or after `shutdown`.
	#[error("telemetry SDK is not initialized")]
	NotInitialized,

	/// No response was obtained from the network.
	#[error("transport failure: {0}")]
	Transport(#[from] TransportError),

	/// A response arrived with a non-success status.
	#[error("server error ({status}): {message}")]
	Server { status: u16, message: String },

	/// Missing or malformed configuration.
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	/// Local persistence failed.
	#[error("storage error: {0}")]
	Store(#[from] StoreError),
}

impl RetryableError for TelemetryError {
	fn is_retryable(&self) -> bool {
		match self {
			TelemetryError::Transport(_) => true,
			TelemetryError::Server { status, .. } => is_retryable_status(*status),
			_ => false,
		}
	}
}

/// Result type alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
