// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flush policy: when queued events are delivered.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted flush period: one year.
pub const MAX_FLUSH_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsePolicyError {
	#[error("invalid flush mode: {0}")]
	InvalidMode(String),

	#[error("invalid flush period unit: {0}")]
	InvalidUnit(String),
}

/// How queued events get delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
	/// A recurring trigger flushes every [`FlushPeriod`].
	#[default]
	Periodic,
	/// Events stay queued until the host calls `flush()`.
	Manual,
}

impl fmt::Display for FlushMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FlushMode::Periodic => write!(f, "periodic"),
			FlushMode::Manual => write!(f, "manual"),
		}
	}
}

impl FromStr for FlushMode {
	type Err = ParsePolicyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"periodic" | "period" => Ok(FlushMode::Periodic),
			"manual" => Ok(FlushMode::Manual),
			other => Err(ParsePolicyError::InvalidMode(other.to_string())),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
	Seconds,
	Minutes,
	Hours,
}

impl FromStr for PeriodUnit {
	type Err = ParsePolicyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"s" | "sec" | "secs" | "seconds" => Ok(PeriodUnit::Seconds),
			"m" | "min" | "mins" | "minutes" => Ok(PeriodUnit::Minutes),
			"h" | "hour" | "hours" => Ok(PeriodUnit::Hours),
			other => Err(ParsePolicyError::InvalidUnit(other.to_string())),
		}
	}
}

/// Interval of the periodic flush trigger, as an `(amount, unit)` pair.
///
/// Only meaningful under [`FlushMode::Periodic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlushPeriod {
	pub amount: u64,
	pub unit: PeriodUnit,
}

impl FlushPeriod {
	pub const fn new(amount: u64, unit: PeriodUnit) -> Self {
		Self { amount, unit }
	}

	pub const fn seconds(amount: u64) -> Self {
		Self::new(amount, PeriodUnit::Seconds)
	}

	pub const fn minutes(amount: u64) -> Self {
		Self::new(amount, PeriodUnit::Minutes)
	}

	pub const fn hours(amount: u64) -> Self {
		Self::new(amount, PeriodUnit::Hours)
	}

	pub fn is_zero(&self) -> bool {
		self.amount == 0
	}

	pub fn exceeds_max(&self) -> bool {
		self.as_duration() > MAX_FLUSH_PERIOD
	}

	pub fn as_duration(&self) -> Duration {
		let secs = match self.unit {
			PeriodUnit::Seconds => self.amount,
			PeriodUnit::Minutes => self.amount.saturating_mul(60),
			PeriodUnit::Hours => self.amount.saturating_mul(3600),
		};
		Duration::from_secs(secs)
	}
}

impl Default for FlushPeriod {
	fn default() -> Self {
		Self::minutes(60)
	}
}

impl fmt::Display for FlushPeriod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let unit = match self.unit {
			PeriodUnit::Seconds => "s",
			PeriodUnit::Minutes => "m",
			PeriodUnit::Hours => "h",
		};
		write!(f, "{}{}", self.amount, unit)
	}
}
