// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request/response contract with the ingestion API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use loom_telemetry_core::Route;
use reqwest::{Client, Method};
use tracing::debug;

use crate::error::TransportError;

/// Endpoint templates; the project token is substituted into the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
	TrackCustomers,
	TrackEvents,
	CustomerAttributes,
	CustomerEvents,
	BannerConfiguration,
	Banner,
}

impl Endpoint {
	pub fn for_route(route: Route) -> Self {
		match route {
			Route::CustomerPropertyUpdate => Endpoint::TrackCustomers,
			Route::TrackEvent => Endpoint::TrackEvents,
		}
	}

	pub fn method(&self) -> Method {
		match self {
			Endpoint::BannerConfiguration => Method::GET,
			_ => Method::POST,
		}
	}

	pub fn path(&self, project_token: &str) -> String {
		match self {
			Endpoint::TrackCustomers => format!("/track/v2/projects/{project_token}/customers"),
			Endpoint::TrackEvents => {
				format!("/track/v2/projects/{project_token}/customers/events")
			}
			Endpoint::CustomerAttributes => {
				format!("/data/v2/projects/{project_token}/customers/attributes")
			}
			Endpoint::CustomerEvents => {
				format!("/data/v2/projects/{project_token}/customers/events")
			}
			Endpoint::BannerConfiguration => format!("/api/banners/{project_token}/configuration"),
			Endpoint::Banner => {
				format!("/data/v2/projects/{project_token}/customers/personalisation/show-banners")
			}
		}
	}
}

/// A fully formed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
	pub method: Method,
	pub path: String,
	pub body: Option<serde_json::Value>,
}

impl ApiRequest {
	pub fn new(endpoint: Endpoint, project_token: &str, body: Option<serde_json::Value>) -> Self {
		Self {
			method: endpoint.method(),
			path: endpoint.path(project_token),
			body,
		}
	}
}

impl fmt::Display for ApiRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.method, self.path)
	}
}

/// Any response that reached the client, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
	pub status: u16,
	pub body: Option<String>,
	pub status_message: String,
}

impl ApiResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Performs requests against the ingestion API.
///
/// Implementations return `Err` only when no response was obtained; every
/// status code, including errors, comes back as an [`ApiResponse`].
#[async_trait]
pub trait NetworkClient: Send + Sync {
	async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// [`NetworkClient`] over `reqwest`.
pub struct HttpNetworkClient {
	base_url: String,
	authorization: String,
	http: Client,
}

impl HttpNetworkClient {
	pub fn new(
		base_url: impl Into<String>,
		authorization: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, TransportError> {
		let http = loom_common_http::new_client_with_timeout(timeout)?;
		Ok(Self::with_client(base_url, authorization, http))
	}

	pub fn with_client(
		base_url: impl Into<String>,
		authorization: impl Into<String>,
		http: Client,
	) -> Self {
		let base_url = base_url.into().trim_end_matches('/').to_string();
		Self {
			base_url,
			authorization: authorization.into(),
			http,
		}
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}
}

#[async_trait]
impl NetworkClient for HttpNetworkClient {
	async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
		let url = format!("{}{}", self.base_url, request.path);
		debug!(method = %request.method, url = %url, "sending request");

		let mut builder = self
			.http
			.request(request.method.clone(), &url)
			.header("Authorization", &self.authorization)
			.header("Accept", "application/json");
		if let Some(body) = &request.body {
			builder = builder.json(body);
		}

		let response = builder.send().await?;
		let status = response.status();
		let body = Some(response.text().await?).filter(|b| !b.is_empty());

		debug!(url = %url, status = status.as_u16(), "received response");

		Ok(ApiResponse {
			status: status.as_u16(),
			body,
			status_message: status.canonical_reason().unwrap_or_default().to_string(),
		})
	}
}
