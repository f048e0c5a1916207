// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom customer telemetry SDK.
//!
//! This crate holds the data model shared by the capture, flush and fetch
//! paths of `loom-telemetry`. It performs no I/O:
//!
//! - [`Event`] and [`Route`]: an immutable tracked record and the endpoint it targets
//! - [`CustomerIds`] and [`Properties`]: identity and payload maps
//! - [`FlushMode`] and [`FlushPeriod`]: delivery policy
//! - [`ResultEnvelope`] and [`FetchError`]: the outcome of every fetch
//! - Fetch request payloads and their response schemas

pub mod event;
pub mod fetch;
pub mod policy;
pub mod properties;
pub mod purchase;
pub mod result;

pub use event::{event_types, now_millis, CustomerIds, Event, Route};
pub use fetch::{
	BannerConfigRequest, BannerRequest, BannerResult, CustomerAttribute, CustomerAttributeModel,
	CustomerAttributesRequest, CustomerEvent, CustomerEventsRequest, CustomerRecommendation,
	Personalization, SortOrder,
};
pub use policy::{FlushMode, FlushPeriod, ParsePolicyError, PeriodUnit, MAX_FLUSH_PERIOD};
pub use properties::Properties;
pub use purchase::{DeviceProperties, PurchasedItem};
pub use result::{ApiResult, FetchError, FetchErrorKind, ResultEnvelope};
