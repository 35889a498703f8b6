// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for WakeSafe driver monitoring sessions.
//!
//! Sessions are event sourced: the [`EventRecord`]s appended for a session
//! are the source of truth, and [`Session`] with its embedded
//! [`SessionStats`] is a fold over them.

pub mod error;
pub mod event;
pub mod inbound;
pub mod session;
pub mod stats;
pub mod stream;

pub use error::{Result, SessionsError};
pub use event::{
	AiResult, Classification, EventRecord, EventSource, GeoPoint, LocationPing, PhotoStatus,
	PhotoStatusChanged, SessionEndedData, SessionEvent, SessionFailedData, SessionStartedData,
	UploadCompleted,
};
pub use inbound::{
	AiResultNotification, LocationNotification, Notification, PhotoStatusNotification,
	UploadNotification,
};
pub use session::{
	ErrorLogEntry, FeatureToggles, RoutePoint, Session, SessionConfig, SessionId, SessionState,
	SubjectId,
};
pub use stats::{incremental_mean, AiStats, PhotoStats, SessionStats, UploadStats};
pub use stream::{
	AiProcessingCompleteData, AiProcessingResults, FatigueDetectionData, SessionDelta,
	SessionStreamEvent, SessionUpdateData,
};
