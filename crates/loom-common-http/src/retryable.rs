// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry classification shared by every SDK error type.

/// Errors that can tell whether repeating the same request may succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// Statuses worth repeating later: server errors, request timeout and rate limiting.
///
/// Every other non-success status is a permanent rejection of the request.
pub fn is_retryable_status(status: u16) -> bool {
	matches!(status, 408 | 429 | 500..=599)
}
