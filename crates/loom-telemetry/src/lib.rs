// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for Loom customer telemetry.
//!
//! The SDK records customer identity, events and session boundaries into a
//! durable local queue and delivers them to the ingestion API in the
//! background. It also exposes read-side fetches for customer attributes,
//! customer events and banners.
//!
//! # Example
//!
//! ```ignore
//! use loom_telemetry::{TelemetryClient, TelemetryConfig};
//! use loom_telemetry_core::{CustomerIds, Properties};
//!
//! let config = TelemetryConfig::new("project-token", "Token secret", "https://api.example.com");
//! let client = TelemetryClient::builder().config(config).init()?;
//!
//! client.track_customer_event(
//!     CustomerIds::new().with_registered("user@example.com"),
//!     "checkout",
//!     Properties::new().insert("total", 42.5),
//!     None,
//! );
//!
//! // Foreground/background transitions drive session tracking.
//! client.lifecycle().resumed();
//!
//! client.flush().await;
//! client.shutdown();
//! ```

pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod flush;
pub mod identity;
pub mod lifecycle;
pub mod network;
pub mod prefs;
pub mod session;
pub mod store;

pub use capture::EventCapture;
pub use client::{TelemetryClient, TelemetryClientBuilder, SDK_VERSION};
pub use config::{ConfigError, TelemetryConfig};
pub use error::{Result, StoreError, TelemetryError, TransportError};
pub use fetch::{FetchGateway, FetchRequest, BANNER_SUCCESS_STATUSES, DATA_SUCCESS_STATUSES};
pub use flush::{FlushController, FlushOutcome, FlushReport, FlushSettings, DEFAULT_MAX_TRIES};
pub use identity::InstallIdentity;
pub use lifecycle::{LifecycleHub, LifecycleObserver, SubscriptionId};
pub use network::{ApiRequest, ApiResponse, Endpoint, HttpNetworkClient, NetworkClient};
pub use prefs::{FilePreferences, MemoryPreferences, Preferences, PreferencesExt};
pub use session::{SessionManager, SessionRecord, SessionState, DEFAULT_SESSION_TIMEOUT};
pub use store::{EventStore, FileEventStore, MemoryEventStore, QueuedEvent};

pub use loom_telemetry_core as core;
