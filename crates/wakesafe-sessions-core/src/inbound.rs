// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notifications received from external collaborators.
//!
//! These mirror the loosely typed payloads producers send. Converting one
//! into a [`SessionEvent`] is the validation boundary: unknown enum values
//! and out-of-range numbers are rejected here with
//! [`SessionsError::Validation`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionsError};
use crate::event::{
	AiResult, EventSource, LocationPing, PhotoStatusChanged, SessionEvent, UploadCompleted,
};

/// Conversion of an inbound notification into a validated event.
pub trait Notification {
	/// Subsystem that sends this notification.
	fn source(&self) -> EventSource;

	fn into_event(self) -> Result<SessionEvent>;
}

/// Upload handler reports a finished upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadNotification {
	pub photo_id: String,
	pub success: bool,
	pub duration_ms: f64,
	pub file_size_bytes: u64,
}

impl Notification for UploadNotification {
	fn source(&self) -> EventSource {
		EventSource::Uploader
	}

	fn into_event(self) -> Result<SessionEvent> {
		let event = SessionEvent::UploadCompleted(UploadCompleted {
			photo_id: self.photo_id,
			success: self.success,
			duration_ms: self.duration_ms,
			file_size_bytes: self.file_size_bytes,
		});
		event.validate()?;
		Ok(event)
	}
}

/// AI server reports a classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResultNotification {
	pub photo_id: String,
	pub classification: String,
	pub confidence: f64,
	pub processing_time_ms: f64,
}

impl Notification for AiResultNotification {
	fn source(&self) -> EventSource {
		EventSource::AiServer
	}

	fn into_event(self) -> Result<SessionEvent> {
		let classification = self.classification.trim().to_ascii_lowercase().parse()?;
		let event = SessionEvent::AiResult(AiResult {
			photo_id: self.photo_id,
			classification,
			confidence: self.confidence,
			processing_time_ms: self.processing_time_ms,
		});
		event.validate()?;
		Ok(event)
	}
}

/// Location reporter sends a GPS fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationNotification {
	pub lat: f64,
	pub lng: f64,
	#[serde(default)]
	pub speed_mps: f64,
	#[serde(default)]
	pub heading_deg: f64,
}

impl Notification for LocationNotification {
	fn source(&self) -> EventSource {
		EventSource::LocationReporter
	}

	fn into_event(self) -> Result<SessionEvent> {
		let event = SessionEvent::LocationPing(LocationPing {
			lat: self.lat,
			lng: self.lng,
			speed_mps: self.speed_mps,
			// Some devices report headings in (-180, 180]
			heading_deg: if self.heading_deg < 0.0 {
				self.heading_deg + 360.0
			} else {
				self.heading_deg
			},
		});
		event.validate()?;
		Ok(event)
	}
}

/// Photo pipeline reports a processing status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoStatusNotification {
	pub photo_id: String,
	pub status: String,
}

impl Notification for PhotoStatusNotification {
	fn source(&self) -> EventSource {
		EventSource::PhotoPipeline
	}

	fn into_event(self) -> Result<SessionEvent> {
		let status = self.status.trim().to_ascii_lowercase().parse().map_err(|_| {
			SessionsError::Validation(format!("unrecognized photo status: {}", self.status))
		})?;
		let event = SessionEvent::PhotoStatus(PhotoStatusChanged {
			photo_id: self.photo_id,
			status,
		});
		event.validate()?;
		Ok(event)
	}
}
