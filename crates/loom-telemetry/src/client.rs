// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The SDK entry point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_telemetry_core::{
	event_types, ApiResult, BannerRequest, BannerResult, CustomerAttribute,
	CustomerAttributeModel, CustomerAttributesRequest, CustomerEvent, CustomerEventsRequest,
	CustomerIds, CustomerRecommendation, DeviceProperties, FetchError, FlushMode, FlushPeriod,
	Personalization, Properties, PurchasedItem, ResultEnvelope, Route,
};
use tracing::{info, warn};

use crate::capture::EventCapture;
use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use crate::fetch::FetchGateway;
use crate::flush::{FlushController, FlushOutcome, FlushSettings};
use crate::identity::InstallIdentity;
use crate::lifecycle::LifecycleHub;
use crate::network::{HttpNetworkClient, NetworkClient};
use crate::prefs::{keys, FilePreferences, Preferences, PreferencesExt};
use crate::session::SessionManager;
use crate::store::{EventStore, FileEventStore};

/// SDK version reported in device properties.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

const PREFERENCES_FILE: &str = "preferences.json";
const EVENTS_DIR: &str = "events";

/// Customer property holding the push token.
const PUSH_TOKEN_PROPERTY: &str = "push_notification_token";

/// Builder for a [`TelemetryClient`].
///
/// Only the configuration is required. Persistence defaults to JSON files in
/// [`TelemetryConfig::resolve_data_dir`] and the network to
/// [`HttpNetworkClient`].
#[derive(Default)]
pub struct TelemetryClientBuilder {
	config: Option<TelemetryConfig>,
	preferences: Option<Arc<dyn Preferences>>,
	event_store: Option<Arc<dyn EventStore>>,
	network: Option<Arc<dyn NetworkClient>>,
	lifecycle: Option<Arc<LifecycleHub>>,
	device: Option<DeviceProperties>,
	campaign: Option<(Option<String>, Option<String>, Option<String>)>,
}

impl TelemetryClientBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(mut self, config: TelemetryConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn preferences(mut self, preferences: Arc<dyn Preferences>) -> Self {
		self.preferences = Some(preferences);
		self
	}

	pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
		self.event_store = Some(store);
		self
	}

	pub fn network(mut self, network: Arc<dyn NetworkClient>) -> Self {
		self.network = Some(network);
		self
	}

	/// Uses the host's lifecycle hub instead of a private one.
	pub fn lifecycle(mut self, hub: Arc<LifecycleHub>) -> Self {
		self.lifecycle = Some(hub);
		self
	}

	/// Overrides the device metadata attached to installation and session events.
	pub fn device(mut self, device: DeviceProperties) -> Self {
		self.device = Some(device);
		self
	}

	/// Campaign attribution sent with the installation event.
	pub fn install_campaign(
		mut self,
		campaign: Option<String>,
		campaign_id: Option<String>,
		link: Option<String>,
	) -> Self {
		self.campaign = Some((campaign, campaign_id, link));
		self
	}

	/// Validates the configuration and starts the SDK.
	///
	/// A configuration or storage error fails initialization outright; no
	/// component is left running. Periodic flushing needs a tokio runtime, so
	/// call this from within one.
	pub fn init(self) -> Result<TelemetryClient> {
		let config = self.config.ok_or(TelemetryError::NotInitialized)?;
		config.validate()?;

		let preferences: Arc<dyn Preferences> = match self.preferences {
			Some(preferences) => preferences,
			None => {
				let dir = config.resolve_data_dir()?;
				Arc::new(FilePreferences::open(dir.join(PREFERENCES_FILE))?)
			}
		};
		let store: Arc<dyn EventStore> = match self.event_store {
			Some(store) => store,
			None => {
				let dir = config.resolve_data_dir()?;
				Arc::new(FileEventStore::open(dir.join(EVENTS_DIR))?)
			}
		};
		let network: Arc<dyn NetworkClient> = match self.network {
			Some(network) => network,
			None => Arc::new(HttpNetworkClient::new(
				config.base_url.clone(),
				config.authorization.clone(),
				config.request_timeout(),
			)?),
		};
		let lifecycle = self.lifecycle.unwrap_or_default();
		let device = self
			.device
			.unwrap_or_else(|| DeviceProperties::current(loom_common_http::SDK_NAME, SDK_VERSION));

		let identity = Arc::new(InstallIdentity::new(preferences.clone()));
		let capture = Arc::new(EventCapture::new(
			store.clone(),
			identity,
			preferences.clone(),
		));
		let flush = FlushController::new(
			store.clone(),
			network.clone(),
			config.project_token.clone(),
			FlushSettings {
				mode: config.flush_mode,
				period: config.flush_period,
				max_tries: config.max_tries,
			},
		);
		let fetch = FetchGateway::new(network);
		let session = SessionManager::new(
			capture.clone(),
			preferences.clone(),
			lifecycle.clone(),
			device.clone(),
			config.session_timeout()?,
		);

		capture.set_ready(true);

		let (campaign, campaign_id, link) = self.campaign.unwrap_or_default();
		capture.track_install(&device.with_campaign(campaign, campaign_id, link));

		let tracking = preferences
			.get_bool(keys::AUTOMATIC_SESSION_TRACKING)
			.unwrap_or_else(|e| {
				warn!(error = %e, "failed to read session tracking preference");
				None
			})
			.unwrap_or(config.automatic_session_tracking);
		session.set_enabled(tracking);

		info!(
			project = %config.project_token,
			flush_mode = %config.flush_mode,
			flush_period = %config.flush_period,
			session_tracking = tracking,
			"telemetry SDK initialized"
		);

		Ok(TelemetryClient {
			project_token: config.project_token,
			capture,
			flush,
			fetch,
			session,
			lifecycle,
			shut_down: AtomicBool::new(false),
		})
	}
}

/// A running telemetry SDK.
///
/// Capture calls are synchronous and only touch the local queue; events
/// reach the network on the next flush. Fetch calls go straight to the
/// network and report their outcome as a [`ResultEnvelope`]. No method
/// returns an error to the host; after [`TelemetryClient::shutdown`] every
/// entry point is a logged no-op.
pub struct TelemetryClient {
	project_token: String,
	capture: Arc<EventCapture>,
	flush: FlushController,
	fetch: FetchGateway,
	session: Arc<SessionManager>,
	lifecycle: Arc<LifecycleHub>,
	shut_down: AtomicBool,
}

impl TelemetryClient {
	pub fn builder() -> TelemetryClientBuilder {
		TelemetryClientBuilder::new()
	}

	pub fn project_token(&self) -> &str {
		&self.project_token
	}

	/// The hub the host feeds foreground/background transitions into.
	pub fn lifecycle(&self) -> &Arc<LifecycleHub> {
		&self.lifecycle
	}

	pub fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::SeqCst)
	}

	// Capture

	pub fn update_customer_properties(&self, customer_ids: CustomerIds, properties: Properties) {
		self.capture.capture(
			None,
			None,
			Some(customer_ids),
			properties,
			Route::CustomerPropertyUpdate,
		);
	}

	/// Tracks a custom event; `timestamp` is epoch milliseconds.
	pub fn track_customer_event(
		&self,
		customer_ids: CustomerIds,
		event_type: &str,
		properties: Properties,
		timestamp: Option<i64>,
	) {
		self.capture.capture(
			Some(event_type),
			timestamp,
			Some(customer_ids),
			properties,
			Route::TrackEvent,
		);
	}

	pub fn track_payment(
		&self,
		customer_ids: CustomerIds,
		item: &PurchasedItem,
		timestamp: Option<i64>,
	) {
		self.capture.capture(
			Some(event_types::PAYMENT),
			timestamp,
			Some(customer_ids),
			item.to_properties(),
			Route::TrackEvent,
		);
	}

	/// Stores the push notification token on the customer.
	pub fn track_fcm_token(&self, customer_ids: CustomerIds, token: &str) {
		self.update_customer_properties(
			customer_ids,
			Properties::new().insert(PUSH_TOKEN_PROPERTY, token),
		);
	}

	/// Tracks delivery of a push notification; `data` carries the campaign payload.
	pub fn track_delivered_push(
		&self,
		customer_ids: CustomerIds,
		data: Properties,
		timestamp: Option<i64>,
	) {
		self.track_push_status(customer_ids, "delivered", data, timestamp);
	}

	pub fn track_clicked_push(
		&self,
		customer_ids: CustomerIds,
		data: Properties,
		timestamp: Option<i64>,
	) {
		self.track_push_status(customer_ids, "clicked", data, timestamp);
	}

	fn track_push_status(
		&self,
		customer_ids: CustomerIds,
		status: &str,
		data: Properties,
		timestamp: Option<i64>,
	) {
		let properties = data
			.insert("action_type", "notification")
			.insert("status", status);
		self.capture.capture(
			Some(event_types::CAMPAIGN),
			timestamp,
			Some(customer_ids),
			properties,
			Route::TrackEvent,
		);
	}

	// Fetch

	pub async fn fetch_customer_attributes(
		&self,
		request: &CustomerAttributesRequest,
	) -> ResultEnvelope<ApiResult<Vec<CustomerAttributeModel>>> {
		if let Some(failure) = self.unavailable() {
			return failure;
		}
		self
			.fetch
			.fetch_customer_attributes(&self.project_token, request)
			.await
	}

	pub async fn fetch_customer_events(
		&self,
		request: &CustomerEventsRequest,
	) -> ResultEnvelope<ApiResult<Vec<CustomerEvent>>> {
		if let Some(failure) = self.unavailable() {
			return failure;
		}
		self
			.fetch
			.fetch_customer_events(&self.project_token, request)
			.await
	}

	/// Evaluates one recommendation model for the customer.
	pub async fn fetch_recommendation(
		&self,
		customer_ids: CustomerIds,
		recommendation: CustomerRecommendation,
	) -> ResultEnvelope<ApiResult<Vec<CustomerAttributeModel>>> {
		let request = CustomerAttributesRequest::new(customer_ids)
			.with_attribute(CustomerAttribute::Recommendation(recommendation));
		self.fetch_customer_attributes(&request).await
	}

	pub async fn fetch_banner_configuration(
		&self,
	) -> ResultEnvelope<ApiResult<Vec<Personalization>>> {
		if let Some(failure) = self.unavailable() {
			return failure;
		}
		self
			.fetch
			.fetch_banner_configuration(&self.project_token)
			.await
	}

	pub async fn fetch_banner(
		&self,
		request: &BannerRequest,
	) -> ResultEnvelope<ApiResult<Vec<BannerResult>>> {
		if let Some(failure) = self.unavailable() {
			return failure;
		}
		self.fetch.fetch_banner(&self.project_token, request).await
	}

	fn unavailable<T>(&self) -> Option<ResultEnvelope<T>> {
		if !self.is_shut_down() {
			return None;
		}
		warn!(error = %TelemetryError::NotInitialized, "fetch skipped");
		Some(ResultEnvelope::Failure(FetchError::transport(
			TelemetryError::NotInitialized.to_string(),
		)))
	}

	// Flush

	/// Delivers queued events now. Rejected while another cycle runs.
	pub async fn flush(&self) -> FlushOutcome {
		if self.is_shut_down() {
			warn!(error = %TelemetryError::NotInitialized, "flush skipped");
			return FlushOutcome::Rejected;
		}
		self.flush.flush().await
	}

	pub fn flush_mode(&self) -> FlushMode {
		self.flush.mode()
	}

	pub fn set_flush_mode(&self, mode: FlushMode) {
		if self.is_shut_down() {
			warn!(error = %TelemetryError::NotInitialized, "flush mode unchanged");
			return;
		}
		self.flush.set_mode(mode);
	}

	pub fn flush_period(&self) -> FlushPeriod {
		self.flush.period()
	}

	/// Changes the periodic interval; a zero period is rejected.
	pub fn set_flush_period(&self, period: FlushPeriod) -> Result<()> {
		if self.is_shut_down() {
			return Err(TelemetryError::NotInitialized);
		}
		self.flush.set_period(period)?;
		Ok(())
	}

	// Sessions

	pub fn session_timeout(&self) -> Duration {
		self.session.timeout()
	}

	pub fn set_session_timeout(&self, timeout: Duration) {
		self.session.set_timeout(timeout);
	}

	pub fn is_automatic_session_tracking(&self) -> bool {
		self.session.is_enabled()
	}

	pub fn set_automatic_session_tracking(&self, enabled: bool) {
		if self.is_shut_down() {
			warn!(error = %TelemetryError::NotInitialized, "session tracking unchanged");
			return;
		}
		self.session.set_enabled(enabled);
	}

	/// Starts (or continues) a session by hand, for hosts without lifecycle signals.
	pub fn track_session_start(&self) {
		if !self.is_shut_down() {
			self.session.resume_at(loom_telemetry_core::now_millis());
		}
	}

	pub fn track_session_end(&self) {
		if !self.is_shut_down() {
			self.session.pause_at(loom_telemetry_core::now_millis());
		}
	}

	/// Stops the periodic trigger and lifecycle listening. Queued events stay
	/// on disk for the next process.
	pub fn shutdown(&self) {
		if self.shut_down.swap(true, Ordering::SeqCst) {
			return;
		}
		self.capture.set_ready(false);
		self.flush.shutdown();
		self.session.detach();
		info!("telemetry SDK shut down");
	}
}

impl Drop for TelemetryClient {
	fn drop(&mut self) {
		self.session.detach();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::flush::tests::{Reply, ScriptedNetwork};
	use crate::prefs::MemoryPreferences;
	use crate::store::MemoryEventStore;
	use loom_telemetry_core::FetchErrorKind;
	use serde_json::Value;

	struct Harness {
		store: Arc<MemoryEventStore>,
		prefs: Arc<MemoryPreferences>,
		network: Arc<ScriptedNetwork>,
	}

	impl Harness {
		fn new() -> Self {
			Self {
				store: Arc::new(MemoryEventStore::new()),
				prefs: Arc::new(MemoryPreferences::new()),
				network: ScriptedNetwork::new(),
			}
		}

		fn config() -> TelemetryConfig {
			let mut config = TelemetryConfig::new("token", "Token secret", "http://localhost");
			config.flush_mode = FlushMode::Manual;
			config
		}

		fn init_with(&self, config: TelemetryConfig) -> Result<TelemetryClient> {
			TelemetryClient::builder()
				.config(config)
				.preferences(self.prefs.clone())
				.event_store(self.store.clone())
				.network(self.network.clone())
				.init()
		}

		fn init(&self) -> TelemetryClient {
			self.init_with(Self::config()).unwrap()
		}

		fn types(&self) -> Vec<String> {
			self
				.store
				.pending()
				.unwrap()
				.iter()
				.map(|q| q.event.event_type().unwrap_or_default().to_string())
				.collect()
		}
	}

	#[tokio::test]
	async fn invalid_config_fails_init() {
		let h = Harness::new();
		let mut config = Harness::config();
		config.project_token.clear();

		let result = h.init_with(config);

		assert!(matches!(result, Err(TelemetryError::Config(_))));
		assert!(h.store.is_empty().unwrap());
	}

	#[tokio::test]
	async fn unrepresentable_session_timeout_fails_init() {
		let h = Harness::new();
		let mut config = Harness::config();
		config.session_timeout_secs = 1e20;

		let result = h.init_with(config);

		assert!(matches!(result, Err(TelemetryError::Config(_))));
		assert!(h.store.is_empty().unwrap());
	}

	#[tokio::test]
	async fn missing_config_fails_init() {
		let result = TelemetryClient::builder().init();
		assert!(matches!(result, Err(TelemetryError::NotInitialized)));
	}

	#[tokio::test]
	async fn init_tracks_install_and_session() {
		let h = Harness::new();
		let client = h.init();

		assert!(client.is_automatic_session_tracking());
		client.lifecycle().resumed();

		assert_eq!(
			h.types(),
			vec![event_types::INSTALLATION, event_types::SESSION_START]
		);
	}

	#[tokio::test]
	async fn install_is_tracked_once_across_restarts() {
		let h = Harness::new();
		drop(h.init());
		drop(h.init());

		assert_eq!(h.types(), vec![event_types::INSTALLATION]);
	}

	#[tokio::test]
	async fn session_tracking_preference_outlives_the_client() {
		let h = Harness::new();
		let client = h.init();
		client.set_automatic_session_tracking(false);
		drop(client);

		let restarted = h.init();
		assert!(!restarted.is_automatic_session_tracking());
		restarted.lifecycle().resumed();
		assert_eq!(h.types(), vec![event_types::INSTALLATION]);
	}

	#[tokio::test]
	async fn payment_under_manual_mode_waits_for_flush() {
		let h = Harness::new();
		let client = h.init();
		let item = PurchasedItem {
			value: 0.99,
			currency: "EUR".into(),
			payment_system: "store".into(),
			product_id: "sku-1".into(),
			product_title: "Gems".into(),
			receipt: None,
		};

		client.track_payment(CustomerIds::new().with_registered("john"), &item, None);

		assert_eq!(
			h.types(),
			vec![event_types::INSTALLATION, event_types::PAYMENT]
		);
		assert!(h.network.sent.lock().unwrap().is_empty());

		match client.flush().await {
			FlushOutcome::Completed(report) => assert_eq!(report.delivered, 2),
			FlushOutcome::Rejected => panic!("flush rejected"),
		}
		assert_eq!(
			h.network.sent_types(),
			vec![event_types::INSTALLATION, event_types::PAYMENT]
		);
		assert!(h.store.is_empty().unwrap());
	}

	#[tokio::test]
	async fn capture_api_selects_routes() {
		let h = Harness::new();
		let client = h.init();
		let ids = CustomerIds::new().with_registered("john");

		client.update_customer_properties(ids.clone(), Properties::new().insert("plan", "pro"));
		client.track_fcm_token(ids.clone(), "push-token");
		client.track_customer_event(ids.clone(), "viewed", Properties::new(), Some(1_000));
		client.track_delivered_push(ids.clone(), Properties::new().insert("action_id", 7), None);
		client.track_clicked_push(ids, Properties::new(), None);

		let pending = h.store.pending().unwrap();
		let routes: Vec<Route> = pending.iter().skip(1).map(|q| q.event.route()).collect();
		assert_eq!(
			routes,
			vec![
				Route::CustomerPropertyUpdate,
				Route::CustomerPropertyUpdate,
				Route::TrackEvent,
				Route::TrackEvent,
				Route::TrackEvent,
			]
		);
		assert_eq!(
			pending[2].event.properties().get("push_notification_token"),
			Some(&Value::from("push-token"))
		);
		assert_eq!(pending[3].event.timestamp(), 1_000);
		assert_eq!(pending[4].event.event_type(), Some(event_types::CAMPAIGN));
		let delivered = pending[4].event.properties();
		assert_eq!(delivered.get("action_type"), Some(&Value::from("notification")));
		assert_eq!(delivered.get("status"), Some(&Value::from("delivered")));
		assert_eq!(delivered.get("action_id"), Some(&Value::from(7)));
		assert_eq!(delivered.get("platform"), None);

		let clicked = pending[5].event.properties();
		assert_eq!(clicked.get("action_type"), Some(&Value::from("notification")));
		assert_eq!(clicked.get("status"), Some(&Value::from("clicked")));
	}

	#[tokio::test]
	async fn rejected_events_are_dropped_on_flush() {
		let h = Harness::new();
		h.network.reply("bad", Reply::Status(400));
		let client = h.init();

		client.track_customer_event(CustomerIds::new(), "bad", Properties::new(), None);
		client.flush().await;

		assert!(h.store.is_empty().unwrap());
	}

	#[tokio::test]
	async fn flush_policy_is_adjustable() {
		let h = Harness::new();
		let client = h.init();

		assert_eq!(client.flush_mode(), FlushMode::Manual);
		client.set_flush_mode(FlushMode::Periodic);
		assert_eq!(client.flush_mode(), FlushMode::Periodic);

		client.set_flush_period(FlushPeriod::minutes(5)).unwrap();
		assert_eq!(client.flush_period(), FlushPeriod::minutes(5));
		assert!(matches!(
			client.set_flush_period(FlushPeriod::minutes(0)),
			Err(TelemetryError::Config(_))
		));
	}

	#[tokio::test]
	async fn manual_session_calls_work_without_lifecycle() {
		let h = Harness::new();
		let mut config = Harness::config();
		config.automatic_session_tracking = false;
		let client = h.init_with(config).unwrap();

		client.track_session_start();
		client.track_session_end();

		assert_eq!(
			h.types(),
			vec![
				event_types::INSTALLATION,
				event_types::SESSION_START,
				event_types::SESSION_END
			]
		);
	}

	#[tokio::test]
	async fn shutdown_turns_entry_points_into_no_ops() {
		let h = Harness::new();
		let client = h.init();
		client.shutdown();

		client.track_customer_event(CustomerIds::new(), "late", Properties::new(), None);
		client.lifecycle().resumed();

		assert_eq!(h.types(), vec![event_types::INSTALLATION]);
		assert_eq!(client.flush().await, FlushOutcome::Rejected);

		let fetched = client.fetch_banner_configuration().await;
		assert_eq!(fetched.failure().unwrap().kind, FetchErrorKind::Transport);
		assert!(h.network.sent.lock().unwrap().is_empty());
	}
}
