// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Outcome of a fetch: a typed value or a diagnosable failure.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Body shape shared by the data endpoints: `{"success": .., "results": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
	pub success: bool,
	pub results: T,
}

/// Why a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchErrorKind {
	/// No response was obtained.
	Transport,
	/// A response arrived with a status outside the endpoint's success band.
	Server { status: u16 },
	/// A success response whose body did not match the expected schema.
	Deserialization,
}

/// A failed fetch, with the raw response body attached when there was one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchError {
	pub kind: FetchErrorKind,
	pub json_body: Option<String>,
	pub message: String,
}

impl FetchError {
	pub fn transport(message: impl Into<String>) -> Self {
		Self {
			kind: FetchErrorKind::Transport,
			json_body: None,
			message: message.into(),
		}
	}

	pub fn server(status: u16, json_body: Option<String>, message: impl Into<String>) -> Self {
		Self {
			kind: FetchErrorKind::Server { status },
			json_body,
			message: message.into(),
		}
	}

	pub fn deserialization(json_body: Option<String>, message: impl Into<String>) -> Self {
		Self {
			kind: FetchErrorKind::Deserialization,
			json_body,
			message: message.into(),
		}
	}
}

impl fmt::Display for FetchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			FetchErrorKind::Transport => write!(f, "transport failure: {}", self.message),
			FetchErrorKind::Server { status } => {
				write!(f, "server responded {status}: {}", self.message)
			}
			FetchErrorKind::Deserialization => {
				write!(f, "unexpected response body: {}", self.message)
			}
		}
	}
}

impl std::error::Error for FetchError {}

/// Exactly one of success or failure, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope<T> {
	Success(T),
	Failure(FetchError),
}

impl<T> ResultEnvelope<T> {
	pub fn is_success(&self) -> bool {
		matches!(self, ResultEnvelope::Success(_))
	}

	pub fn success(self) -> Option<T> {
		match self {
			ResultEnvelope::Success(value) => Some(value),
			ResultEnvelope::Failure(_) => None,
		}
	}

	pub fn failure(self) -> Option<FetchError> {
		match self {
			ResultEnvelope::Success(_) => None,
			ResultEnvelope::Failure(error) => Some(error),
		}
	}

	pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ResultEnvelope<U> {
		match self {
			ResultEnvelope::Success(value) => ResultEnvelope::Success(f(value)),
			ResultEnvelope::Failure(error) => ResultEnvelope::Failure(error),
		}
	}

	pub fn into_result(self) -> Result<T, FetchError> {
		self.into()
	}
}

impl<T> From<ResultEnvelope<T>> for Result<T, FetchError> {
	fn from(envelope: ResultEnvelope<T>) -> Self {
		match envelope {
			ResultEnvelope::Success(value) => Ok(value),
			ResultEnvelope::Failure(error) => Err(error),
		}
	}
}

impl<T> From<Result<T, FetchError>> for ResultEnvelope<T> {
	fn from(result: Result<T, FetchError>) -> Self {
		match result {
			Ok(value) => ResultEnvelope::Success(value),
			Err(error) => ResultEnvelope::Failure(error),
		}
	}
}
