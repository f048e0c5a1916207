// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-side fetches: customer attributes, customer events and banners.
//!
//! Each request type declares its endpoint, its success status band and the
//! schema its body decodes into. [`FetchGateway::fetch`] classifies the
//! response:
//!
//! | Outcome | Result |
//! |---------|--------|
//! | status in the success band, body decodes | `Success(value)` |
//! | status in the success band, body does not decode | `Failure` (deserialization, raw body kept) |
//! | any other status | `Failure` (server, raw body and status message kept) |
//! | no response, or the request could not be encoded | `Failure` (transport, no body) |
//!
//! Fetches have no local side effects and are never retried automatically.

use std::ops::RangeInclusive;
use std::sync::Arc;

use loom_telemetry_core::{
	ApiResult, BannerConfigRequest, BannerRequest, BannerResult, CustomerAttributeModel,
	CustomerAttributesRequest, CustomerEvent, CustomerEventsRequest, FetchError, Personalization,
	ResultEnvelope,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::network::{ApiRequest, Endpoint, NetworkClient};

/// Success band of the customer data endpoints.
pub const DATA_SUCCESS_STATUSES: RangeInclusive<u16> = 200..=203;
/// Success band of the banner endpoints.
pub const BANNER_SUCCESS_STATUSES: RangeInclusive<u16> = 200..=299;

/// A typed read request.
pub trait FetchRequest {
	/// Schema the success body decodes into.
	type Output: DeserializeOwned;

	fn endpoint(&self) -> Endpoint;

	/// JSON body of the request, if it carries one.
	fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error>;

	fn success_statuses(&self) -> RangeInclusive<u16>;
}

impl FetchRequest for CustomerAttributesRequest {
	type Output = ApiResult<Vec<CustomerAttributeModel>>;

	fn endpoint(&self) -> Endpoint {
		Endpoint::CustomerAttributes
	}

	fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
		serde_json::to_value(self).map(Some)
	}

	fn success_statuses(&self) -> RangeInclusive<u16> {
		DATA_SUCCESS_STATUSES
	}
}

impl FetchRequest for CustomerEventsRequest {
	type Output = ApiResult<Vec<CustomerEvent>>;

	fn endpoint(&self) -> Endpoint {
		Endpoint::CustomerEvents
	}

	fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
		serde_json::to_value(self).map(Some)
	}

	fn success_statuses(&self) -> RangeInclusive<u16> {
		DATA_SUCCESS_STATUSES
	}
}

impl FetchRequest for BannerConfigRequest {
	type Output = ApiResult<Vec<Personalization>>;

	fn endpoint(&self) -> Endpoint {
		Endpoint::BannerConfiguration
	}

	fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
		Ok(None)
	}

	fn success_statuses(&self) -> RangeInclusive<u16> {
		BANNER_SUCCESS_STATUSES
	}
}

impl FetchRequest for BannerRequest {
	type Output = ApiResult<Vec<BannerResult>>;

	fn endpoint(&self) -> Endpoint {
		Endpoint::Banner
	}

	fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
		serde_json::to_value(self).map(Some)
	}

	fn success_statuses(&self) -> RangeInclusive<u16> {
		BANNER_SUCCESS_STATUSES
	}
}

/// Issues [`FetchRequest`]s and classifies their responses.
#[derive(Clone)]
pub struct FetchGateway {
	network: Arc<dyn NetworkClient>,
}

impl FetchGateway {
	pub fn new(network: Arc<dyn NetworkClient>) -> Self {
		Self { network }
	}

	pub async fn fetch<R: FetchRequest>(
		&self,
		project_token: &str,
		request: &R,
	) -> ResultEnvelope<R::Output> {
		let body = match request.body() {
			Ok(body) => body,
			Err(e) => {
				let error = FetchError::transport(format!("failed to encode request: {e}"));
				error!(error = %error, "fetch not sent");
				return ResultEnvelope::Failure(error);
			}
		};
		let api_request = ApiRequest::new(request.endpoint(), project_token, body);
		debug!(request = %api_request, "fetching");

		let response = match self.network.execute(api_request).await {
			Ok(response) => response,
			Err(e) => {
				let error = FetchError::transport(e.to_string());
				error!(error = %error, "fetch failed");
				return ResultEnvelope::Failure(error);
			}
		};

		if !request.success_statuses().contains(&response.status) {
			let error = FetchError::server(response.status, response.body, response.status_message);
			error!(error = %error, "fetch failed");
			return ResultEnvelope::Failure(error);
		}

		let body = response.body.as_deref().unwrap_or_default();
		match serde_json::from_str::<R::Output>(body) {
			Ok(value) => ResultEnvelope::Success(value),
			Err(e) => {
				let error = FetchError::deserialization(response.body, e.to_string());
				error!(error = %error, "failed to decode fetch response");
				ResultEnvelope::Failure(error)
			}
		}
	}

	pub async fn fetch_customer_attributes(
		&self,
		project_token: &str,
		request: &CustomerAttributesRequest,
	) -> ResultEnvelope<ApiResult<Vec<CustomerAttributeModel>>> {
		self.fetch(project_token, request).await
	}

	pub async fn fetch_customer_events(
		&self,
		project_token: &str,
		request: &CustomerEventsRequest,
	) -> ResultEnvelope<ApiResult<Vec<CustomerEvent>>> {
		self.fetch(project_token, request).await
	}

	pub async fn fetch_banner_configuration(
		&self,
		project_token: &str,
	) -> ResultEnvelope<ApiResult<Vec<Personalization>>> {
		self.fetch(project_token, &BannerConfigRequest).await
	}

	pub async fn fetch_banner(
		&self,
		project_token: &str,
		request: &BannerRequest,
	) -> ResultEnvelope<ApiResult<Vec<BannerResult>>> {
		self.fetch(project_token, request).await
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::error::TransportError;
	use crate::network::ApiResponse;
	use async_trait::async_trait;
	use loom_telemetry_core::{CustomerIds, FetchErrorKind};
	use std::sync::Mutex;

	/// Replies with a fixed outcome and records every request.
	pub(crate) struct StubNetwork {
		reply: Mutex<Result<ApiResponse, String>>,
		pub(crate) requests: Mutex<Vec<ApiRequest>>,
	}

	impl StubNetwork {
		pub(crate) fn responding(status: u16, body: &str) -> Arc<Self> {
			Arc::new(Self {
				reply: Mutex::new(Ok(ApiResponse {
					status,
					body: Some(body.to_string()),
					status_message: format!("status {status}"),
				})),
				requests: Mutex::new(Vec::new()),
			})
		}

		pub(crate) fn unreachable() -> Arc<Self> {
			Arc::new(Self {
				reply: Mutex::new(Err("connection refused".to_string())),
				requests: Mutex::new(Vec::new()),
			})
		}
	}

	#[async_trait]
	impl NetworkClient for StubNetwork {
		async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
			self.requests.lock().unwrap().push(request);
			self.reply.lock().unwrap().clone().map_err(TransportError)
		}
	}

	/// A request whose body has map keys JSON cannot represent.
	struct UnencodableRequest;

	impl FetchRequest for UnencodableRequest {
		type Output = serde_json::Value;

		fn endpoint(&self) -> Endpoint {
			Endpoint::CustomerAttributes
		}

		fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
			let keyed_by_pair: std::collections::BTreeMap<(u8, u8), u8> =
				[((1, 2), 3)].into_iter().collect();
			serde_json::to_value(keyed_by_pair).map(Some)
		}

		fn success_statuses(&self) -> RangeInclusive<u16> {
			DATA_SUCCESS_STATUSES
		}
	}

	fn attributes() -> CustomerAttributesRequest {
		CustomerAttributesRequest::new(CustomerIds::new().with_registered("john"))
			.with_expression("expressionId")
	}

	#[tokio::test]
	async fn success_decodes_results() {
		let network = StubNetwork::responding(
			200,
			r#"{"success": true, "results": [{"success": true, "value": "Expression"}]}"#,
		);
		let gateway = FetchGateway::new(network.clone());

		let result = gateway.fetch_customer_attributes("TestToken", &attributes()).await;

		let value = result.success().expect("expected success");
		assert!(value.success);
		assert_eq!(value.results[0].value, "Expression");

		let requests = network.requests.lock().unwrap();
		assert_eq!(requests.len(), 1);
		assert_eq!(
			requests[0].path,
			"/data/v2/projects/TestToken/customers/attributes"
		);
		assert_eq!(requests[0].body.as_ref().unwrap()["attributes"][0]["type"], "expression");
	}

	#[tokio::test]
	async fn malformed_body_is_a_deserialization_failure() {
		let network = StubNetwork::responding(200, "{\"success\": tru");
		let gateway = FetchGateway::new(network);

		let error = gateway
			.fetch_customer_attributes("t", &attributes())
			.await
			.failure()
			.expect("expected failure");

		assert_eq!(error.kind, FetchErrorKind::Deserialization);
		assert_eq!(error.json_body.as_deref(), Some("{\"success\": tru"));
	}

	#[tokio::test]
	async fn unexpected_shape_is_a_deserialization_failure() {
		let network = StubNetwork::responding(200, r#"{"success": true, "results": {"a": 1}}"#);
		let gateway = FetchGateway::new(network);

		let result = gateway.fetch_customer_attributes("t", &attributes()).await;
		assert_eq!(result.failure().unwrap().kind, FetchErrorKind::Deserialization);
	}

	#[tokio::test]
	async fn status_204_is_outside_the_data_band() {
		let network = StubNetwork::responding(204, "");
		let gateway = FetchGateway::new(network);

		let error = gateway
			.fetch_customer_attributes("t", &attributes())
			.await
			.failure()
			.unwrap();
		assert_eq!(error.kind, FetchErrorKind::Server { status: 204 });
		assert_eq!(error.message, "status 204");
	}

	#[tokio::test]
	async fn banner_band_accepts_any_2xx() {
		let network = StubNetwork::responding(
			206,
			r#"{"success": true, "results": [{"id": "banner-1"}]}"#,
		);
		let gateway = FetchGateway::new(network.clone());

		let config = gateway.fetch_banner_configuration("t").await.success().unwrap();
		assert_eq!(config.results[0].id, "banner-1");

		let requests = network.requests.lock().unwrap();
		assert_eq!(requests[0].method, reqwest::Method::GET);
		assert!(requests[0].body.is_none());
	}

	#[tokio::test]
	async fn server_error_keeps_body_and_message() {
		let network = StubNetwork::responding(400, r#"{"errors": ["bad"]}"#);
		let gateway = FetchGateway::new(network);

		let request = CustomerEventsRequest::new(CustomerIds::new().with_cookie("c"), vec![
			"purchase".into(),
		]);
		let error = gateway
			.fetch_customer_events("t", &request)
			.await
			.failure()
			.unwrap();

		assert_eq!(error.kind, FetchErrorKind::Server { status: 400 });
		assert_eq!(error.json_body.as_deref(), Some(r#"{"errors": ["bad"]}"#));
		assert_eq!(error.message, "status 400");
	}

	#[tokio::test]
	async fn transport_failure_has_no_body() {
		let gateway = FetchGateway::new(StubNetwork::unreachable());

		let request = BannerRequest::new(CustomerIds::new().with_cookie("c"), vec!["p".into()]);
		let error = gateway.fetch_banner("t", &request).await.failure().unwrap();

		assert_eq!(error.kind, FetchErrorKind::Transport);
		assert!(error.json_body.is_none());
		assert_eq!(error.message, "connection refused");
	}

	#[tokio::test]
	async fn repeated_fetches_are_independent() {
		let network = StubNetwork::responding(200, r#"{"success": true, "results": []}"#);
		let gateway = FetchGateway::new(network.clone());

		let first = gateway.fetch_customer_attributes("t", &attributes()).await;
		let second = gateway.fetch_customer_attributes("t", &attributes()).await;

		assert_eq!(first, second);
		assert_eq!(network.requests.lock().unwrap().len(), 2);
	}

	#[tokio::test]
	async fn unencodable_request_is_never_sent() {
		let network = StubNetwork::responding(200, "{}");
		let gateway = FetchGateway::new(network.clone());

		let error = gateway
			.fetch("TestToken", &UnencodableRequest)
			.await
			.failure()
			.expect("expected failure");

		assert_eq!(error.kind, FetchErrorKind::Transport);
		assert!(error.message.starts_with("failed to encode request"));
		assert!(network.requests.lock().unwrap().is_empty());
	}
}
