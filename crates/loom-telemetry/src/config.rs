// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SDK configuration.
//!
//! A [`TelemetryConfig`] is built in code, parsed from TOML, or loaded from a
//! file, then optionally overridden by `LOOM_TELEMETRY_*` environment
//! variables. [`TelemetryConfig::validate`] runs before anything is started;
//! an invalid configuration leaves the SDK uninitialized.

use std::path::{Path, PathBuf};
use std::time::Duration;

use loom_telemetry_core::{FlushMode, FlushPeriod, MAX_FLUSH_PERIOD};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "LOOM_TELEMETRY_";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Missing required field: {0}")]
	MissingField(String),

	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },

	#[error("Could not determine data directory")]
	DataDirNotFound,
}

impl ConfigError {
	pub fn missing_field(field: impl Into<String>) -> Self {
		Self::MissingField(field.into())
	}

	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Configuration of a [`TelemetryClient`](crate::TelemetryClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
	/// Project the tracked data belongs to; substituted into every endpoint path.
	pub project_token: String,
	/// Value of the `Authorization` header, e.g. `Token abc` or `Basic ...`.
	pub authorization: String,
	/// Base URL of the ingestion API, without a trailing path.
	pub base_url: String,
	/// Pause-to-resume gap after which a new session starts.
	pub session_timeout_secs: f64,
	/// Default for automatic session tracking until the host changes it.
	pub automatic_session_tracking: bool,
	pub flush_mode: FlushMode,
	pub flush_period: FlushPeriod,
	/// Delivery attempts after which a still-failing event is dropped.
	pub max_tries: u32,
	pub request_timeout_secs: u64,
	/// Where the queue and preferences are persisted. Defaults to the XDG data dir.
	pub data_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
	fn default() -> Self {
		Self {
			project_token: String::new(),
			authorization: String::new(),
			base_url: String::new(),
			session_timeout_secs: 20.0,
			automatic_session_tracking: true,
			flush_mode: FlushMode::Periodic,
			flush_period: FlushPeriod::default(),
			max_tries: 10,
			request_timeout_secs: 30,
			data_dir: None,
		}
	}
}

impl TelemetryConfig {
	pub fn new(
		project_token: impl Into<String>,
		authorization: impl Into<String>,
		base_url: impl Into<String>,
	) -> Self {
		Self {
			project_token: project_token.into(),
			authorization: authorization.into(),
			base_url: base_url.into(),
			..Default::default()
		}
	}

	pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
		toml::from_str(contents).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path)?;
		let config = Self::from_toml_str(&contents, path)?;
		tracing::debug!(path = %path.display(), "loaded telemetry configuration");
		Ok(config)
	}

	/// Applies `LOOM_TELEMETRY_*` overrides from the process environment.
	pub fn apply_env(self) -> Result<Self, ConfigError> {
		self.apply_env_from(|key| std::env::var(key).ok())
	}

	/// Applies overrides using `lookup` to resolve variable names.
	pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

		if let Some(v) = var("PROJECT_TOKEN") {
			self.project_token = v;
		}
		if let Some(v) = var("AUTHORIZATION") {
			self.authorization = v;
		}
		if let Some(v) = var("BASE_URL") {
			self.base_url = v;
		}
		if let Some(v) = var("SESSION_TIMEOUT_SECS") {
			self.session_timeout_secs = v
				.parse()
				.map_err(|_| ConfigError::invalid_value("session_timeout_secs", v))?;
		}
		if let Some(v) = var("AUTOMATIC_SESSION_TRACKING") {
			self.automatic_session_tracking = v
				.parse()
				.map_err(|_| ConfigError::invalid_value("automatic_session_tracking", v))?;
		}
		if let Some(v) = var("FLUSH_MODE") {
			self.flush_mode = v
				.parse()
				.map_err(|e: loom_telemetry_core::ParsePolicyError| {
					ConfigError::invalid_value("flush_mode", e.to_string())
				})?;
		}
		if let Some(v) = var("DATA_DIR") {
			self.data_dir = Some(PathBuf::from(v));
		}

		Ok(self)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.project_token.trim().is_empty() {
			return Err(ConfigError::missing_field("project_token"));
		}
		if self.authorization.trim().is_empty() {
			return Err(ConfigError::missing_field("authorization"));
		}
		if self.base_url.trim().is_empty() {
			return Err(ConfigError::missing_field("base_url"));
		}
		if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
			return Err(ConfigError::invalid_value(
				"base_url",
				"must start with http:// or https://",
			));
		}
		self.session_timeout()?;
		if self.flush_period.is_zero() {
			return Err(ConfigError::invalid_value("flush_period", "must be non-zero"));
		}
		if self.flush_period.exceeds_max() {
			return Err(ConfigError::invalid_value(
				"flush_period",
				format!("must not exceed {} seconds", MAX_FLUSH_PERIOD.as_secs()),
			));
		}
		if self.max_tries == 0 {
			return Err(ConfigError::invalid_value("max_tries", "must be at least 1"));
		}
		Ok(())
	}

	/// The session timeout as a [`Duration`]; non-positive, non-finite or
	/// unrepresentable values are rejected.
	pub fn session_timeout(&self) -> Result<Duration, ConfigError> {
		let invalid = || {
			ConfigError::invalid_value(
				"session_timeout_secs",
				"must be a positive number of seconds",
			)
		};
		if self.session_timeout_secs <= 0.0 {
			return Err(invalid());
		}
		Duration::try_from_secs_f64(self.session_timeout_secs).map_err(|_| invalid())
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	/// Resolved persistence directory: `data_dir`, or `$XDG_DATA_HOME/loom/telemetry`.
	pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
		if let Some(dir) = &self.data_dir {
			return Ok(dir.clone());
		}
		dirs::data_dir()
			.map(|d| d.join("loom").join("telemetry"))
			.ok_or(ConfigError::DataDirNotFound)
	}
}
