// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the Loom telemetry SDK.
//!
//! This crate provides:
//! - A pre-configured HTTP client with the SDK User-Agent header
//! - Retry classification for transport and status failures

mod client;
mod retryable;

pub use client::{builder, new_client_with_timeout, user_agent, SDK_NAME};
pub use retryable::{is_retryable_status, RetryableError};
