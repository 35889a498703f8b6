// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed session events and the records stored in the event log.
//!
//! Every change to a session is expressed as a [`SessionEvent`]. The event
//! log wraps each accepted event in an [`EventRecord`] carrying the
//! per-session sequence number, so session state can be rebuilt by folding
//! records in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionsError};
use crate::session::{SessionConfig, SessionId, SubjectId};

/// Subsystem an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
	/// Lifecycle calls handled by the registry itself
	Registry,
	/// Photo upload handler
	Uploader,
	/// AI classification callback
	AiServer,
	/// Mobile location reporter
	LocationReporter,
	/// Photo processing pipeline status updates
	PhotoPipeline,
}

impl std::fmt::Display for EventSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EventSource::Registry => write!(f, "registry"),
			EventSource::Uploader => write!(f, "uploader"),
			EventSource::AiServer => write!(f, "ai_server"),
			EventSource::LocationReporter => write!(f, "location_reporter"),
			EventSource::PhotoPipeline => write!(f, "photo_pipeline"),
		}
	}
}

impl std::str::FromStr for EventSource {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"registry" => Ok(EventSource::Registry),
			"uploader" => Ok(EventSource::Uploader),
			"ai_server" => Ok(EventSource::AiServer),
			"location_reporter" => Ok(EventSource::LocationReporter),
			"photo_pipeline" => Ok(EventSource::PhotoPipeline),
			_ => Err(SessionsError::Validation(format!("unknown event source: {s}"))),
		}
	}
}

/// Fatigue classification produced by the AI model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
	Alert,
	Drowsy,
	Sleeping,
	Unknown,
}

impl Classification {
	/// Whether this classification should raise a fatigue alert.
	#[must_use]
	pub fn is_fatigued(&self) -> bool {
		matches!(self, Classification::Drowsy | Classification::Sleeping)
	}

	/// Fatigue level on a 0-100 scale for a result with the given confidence.
	///
	/// Each class owns a band; confidence positions the level inside it.
	/// `Unknown` carries no fatigue signal and always maps to 0.
	#[must_use]
	pub fn fatigue_level(&self, confidence: f64) -> u8 {
		let confidence = confidence.clamp(0.0, 1.0);
		let level = match self {
			Classification::Alert => (1.0 - confidence) * 30.0,
			Classification::Drowsy => 40.0 + confidence * 40.0,
			Classification::Sleeping => 80.0 + confidence * 20.0,
			Classification::Unknown => 0.0,
		};
		level.round() as u8
	}
}

impl std::fmt::Display for Classification {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Classification::Alert => write!(f, "alert"),
			Classification::Drowsy => write!(f, "drowsy"),
			Classification::Sleeping => write!(f, "sleeping"),
			Classification::Unknown => write!(f, "unknown"),
		}
	}
}

impl std::str::FromStr for Classification {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"alert" => Ok(Classification::Alert),
			"drowsy" => Ok(Classification::Drowsy),
			"sleeping" => Ok(Classification::Sleeping),
			"unknown" => Ok(Classification::Unknown),
			_ => Err(SessionsError::Validation(format!("unrecognized classification: {s}"))),
		}
	}
}

/// Processing status of an uploaded photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
	Pending,
	Processing,
	Completed,
	Error,
}

impl std::fmt::Display for PhotoStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PhotoStatus::Pending => write!(f, "pending"),
			PhotoStatus::Processing => write!(f, "processing"),
			PhotoStatus::Completed => write!(f, "completed"),
			PhotoStatus::Error => write!(f, "error"),
		}
	}
}

impl std::str::FromStr for PhotoStatus {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"pending" => Ok(PhotoStatus::Pending),
			"processing" => Ok(PhotoStatus::Processing),
			"completed" => Ok(PhotoStatus::Completed),
			"error" | "failed" => Ok(PhotoStatus::Error),
			_ => Err(SessionsError::Validation(format!("unrecognized photo status: {s}"))),
		}
	}
}

/// A latitude / longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
}

impl GeoPoint {
	pub fn validate(&self) -> Result<()> {
		validate_coordinates(self.lat, self.lng)
	}
}

fn validate_coordinates(lat: f64, lng: f64) -> Result<()> {
	if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
		return Err(SessionsError::Validation(format!("latitude out of range: {lat}")));
	}
	if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
		return Err(SessionsError::Validation(format!("longitude out of range: {lng}")));
	}
	Ok(())
}

fn require_non_negative(field: &str, value: f64) -> Result<()> {
	if !value.is_finite() || value < 0.0 {
		return Err(SessionsError::Validation(format!(
			"{field} must be a non-negative number, got {value}"
		)));
	}
	Ok(())
}

fn require_photo_id(photo_id: &str) -> Result<()> {
	if photo_id.trim().is_empty() {
		return Err(SessionsError::Validation("photo_id must not be empty".to_string()));
	}
	Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartedData {
	pub subject_id: SubjectId,
	pub config: SessionConfig,
	pub start_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEndedData {
	pub end_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFailedData {
	pub error_type: String,
	pub message: String,
}

/// A finished photo upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadCompleted {
	pub photo_id: String,
	pub success: bool,
	pub duration_ms: f64,
	pub file_size_bytes: u64,
}

/// A fatigue classification for one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResult {
	pub photo_id: String,
	pub classification: Classification,
	/// Confidence score in `[0, 1]`
	pub confidence: f64,
	pub processing_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPing {
	pub lat: f64,
	pub lng: f64,
	pub speed_mps: f64,
	pub heading_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoStatusChanged {
	pub photo_id: String,
	pub status: PhotoStatus,
}

/// Every fact that can be recorded against a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
	#[serde(rename = "session.started")]
	Started(SessionStartedData),

	#[serde(rename = "session.paused")]
	Paused,

	#[serde(rename = "session.resumed")]
	Resumed,

	#[serde(rename = "session.ended")]
	Ended(SessionEndedData),

	#[serde(rename = "session.failed")]
	Failed(SessionFailedData),

	#[serde(rename = "upload.completed")]
	UploadCompleted(UploadCompleted),

	#[serde(rename = "ai.result")]
	AiResult(AiResult),

	#[serde(rename = "location.ping")]
	LocationPing(LocationPing),

	#[serde(rename = "photo.status")]
	PhotoStatus(PhotoStatusChanged),
}

impl SessionEvent {
	/// Returns the event type name as a string.
	pub fn event_type(&self) -> &'static str {
		match self {
			SessionEvent::Started(_) => "session.started",
			SessionEvent::Paused => "session.paused",
			SessionEvent::Resumed => "session.resumed",
			SessionEvent::Ended(_) => "session.ended",
			SessionEvent::Failed(_) => "session.failed",
			SessionEvent::UploadCompleted(_) => "upload.completed",
			SessionEvent::AiResult(_) => "ai.result",
			SessionEvent::LocationPing(_) => "location.ping",
			SessionEvent::PhotoStatus(_) => "photo.status",
		}
	}

	/// Lifecycle events change the session state; the rest are ingested data.
	#[must_use]
	pub fn is_lifecycle(&self) -> bool {
		matches!(
			self,
			SessionEvent::Started(_)
				| SessionEvent::Paused
				| SessionEvent::Resumed
				| SessionEvent::Ended(_)
				| SessionEvent::Failed(_)
		)
	}

	/// Checks the payload in isolation, without regard to session state.
	pub fn validate(&self) -> Result<()> {
		match self {
			SessionEvent::Started(data) => {
				data.config.validate()?;
				if data.subject_id.as_str().trim().is_empty() {
					return Err(SessionsError::Validation("subject_id must not be empty".to_string()));
				}
				data.start_location.as_ref().map_or(Ok(()), GeoPoint::validate)
			}
			SessionEvent::Paused | SessionEvent::Resumed => Ok(()),
			SessionEvent::Ended(data) => data.end_location.as_ref().map_or(Ok(()), GeoPoint::validate),
			SessionEvent::Failed(data) => {
				if data.error_type.trim().is_empty() {
					return Err(SessionsError::Validation("error_type must not be empty".to_string()));
				}
				Ok(())
			}
			SessionEvent::UploadCompleted(upload) => {
				require_photo_id(&upload.photo_id)?;
				require_non_negative("duration_ms", upload.duration_ms)
			}
			SessionEvent::AiResult(result) => {
				require_photo_id(&result.photo_id)?;
				if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
					return Err(SessionsError::Validation(format!(
						"confidence must be within [0, 1], got {}",
						result.confidence
					)));
				}
				require_non_negative("processing_time_ms", result.processing_time_ms)
			}
			SessionEvent::LocationPing(ping) => {
				validate_coordinates(ping.lat, ping.lng)?;
				require_non_negative("speed_mps", ping.speed_mps)?;
				if !ping.heading_deg.is_finite() || !(0.0..=360.0).contains(&ping.heading_deg) {
					return Err(SessionsError::Validation(format!(
						"heading must be within [0, 360], got {}",
						ping.heading_deg
					)));
				}
				Ok(())
			}
			SessionEvent::PhotoStatus(change) => require_photo_id(&change.photo_id),
		}
	}
}

/// An event as stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
	pub session_id: SessionId,
	/// Per-session sequence number, starting at 1
	pub seq: u64,
	pub timestamp: DateTime<Utc>,
	pub source: EventSource,
	pub event: SessionEvent,
}
