// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Realtime update types pushed to session viewers.
//!
//! # Kinds
//!
//! - `session_update` - lifecycle change, upload, location or photo status
//! - `fatigue_detection` - AI result classified as drowsy or sleeping
//! - `ai_processing_complete` - any other AI result
//!
//! Each committed record produces exactly one [`SessionDelta`]. The delta
//! carries the record itself so subscribers can fold it into a local copy
//! of the session and deduplicate by sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Classification, EventRecord, SessionEvent};
use crate::session::{Session, SessionId, SessionState};

/// Viewer-facing payload of a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum SessionStreamEvent {
	#[serde(rename = "session_update")]
	SessionUpdate(SessionUpdateData),

	#[serde(rename = "fatigue_detection")]
	FatigueDetection(FatigueDetectionData),

	#[serde(rename = "ai_processing_complete")]
	AiProcessingComplete(AiProcessingCompleteData),
}

impl SessionStreamEvent {
	/// Returns the kind name as a string.
	pub fn kind(&self) -> &'static str {
		match self {
			SessionStreamEvent::SessionUpdate(_) => "session_update",
			SessionStreamEvent::FatigueDetection(_) => "fatigue_detection",
			SessionStreamEvent::AiProcessingComplete(_) => "ai_processing_complete",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdateData {
	pub session_id: SessionId,
	pub status: SessionState,
	pub duration_ms: u64,
	pub photos_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueDetectionData {
	pub session_id: SessionId,
	pub photo_id: String,
	/// 0-100
	pub fatigue_level: u8,
	pub classification: Classification,
	pub confidence: f64,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiProcessingResults {
	pub classification: Classification,
	pub confidence: f64,
	pub fatigue_level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiProcessingCompleteData {
	pub session_id: SessionId,
	pub photo_id: String,
	pub results: AiProcessingResults,
	pub processing_time_ms: f64,
}

/// One published update: the committed record plus its viewer payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDelta {
	pub session_id: SessionId,
	pub seq: u64,
	pub update: SessionStreamEvent,
	pub record: EventRecord,
}

impl SessionDelta {
	/// Builds the delta for `record`, which must already be applied to `session`.
	#[must_use]
	pub fn from_committed(session: &Session, record: &EventRecord) -> Self {
		let update = match &record.event {
			SessionEvent::AiResult(result) => {
				let fatigue_level = result.classification.fatigue_level(result.confidence);
				if result.classification.is_fatigued() {
					SessionStreamEvent::FatigueDetection(FatigueDetectionData {
						session_id: session.id.clone(),
						photo_id: result.photo_id.clone(),
						fatigue_level,
						classification: result.classification,
						confidence: result.confidence,
						timestamp: record.timestamp,
					})
				} else {
					SessionStreamEvent::AiProcessingComplete(AiProcessingCompleteData {
						session_id: session.id.clone(),
						photo_id: result.photo_id.clone(),
						results: AiProcessingResults {
							classification: result.classification,
							confidence: result.confidence,
							fatigue_level,
						},
						processing_time_ms: result.processing_time_ms,
					})
				}
			}
			_ => SessionStreamEvent::SessionUpdate(SessionUpdateData {
				session_id: session.id.clone(),
				status: session.state,
				duration_ms: session.elapsed_ms(record.timestamp),
				photos_count: session.stats.uploads.total_uploads,
			}),
		};

		SessionDelta {
			session_id: session.id.clone(),
			seq: record.seq,
			update,
			record: record.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{AiResult, EventSource, SessionStartedData};
	use crate::session::{SessionConfig, SubjectId};

	fn started() -> (Session, EventRecord) {
		let record = EventRecord {
			session_id: SessionId::new(),
			seq: 1,
			timestamp: Utc::now(),
			source: EventSource::Registry,
			event: SessionEvent::Started(SessionStartedData {
				subject_id: SubjectId::new("driver-1"),
				config: SessionConfig::default(),
				start_location: None,
			}),
		};
		(Session::from_started(&record).unwrap(), record)
	}

	fn ai_record(session: &Session, classification: Classification) -> EventRecord {
		EventRecord {
			session_id: session.id.clone(),
			seq: session.last_seq + 1,
			timestamp: Utc::now(),
			source: EventSource::AiServer,
			event: SessionEvent::AiResult(AiResult {
				photo_id: "photo-7".to_string(),
				classification,
				confidence: 0.9,
				processing_time_ms: 80.0,
			}),
		}
	}

	#[test]
	fn test_lifecycle_record_maps_to_session_update() {
		let (session, record) = started();
		let delta = SessionDelta::from_committed(&session, &record);
		assert_eq!(delta.seq, 1);
		assert_eq!(delta.update.kind(), "session_update");
		match delta.update {
			SessionStreamEvent::SessionUpdate(data) => {
				assert_eq!(data.status, SessionState::Active);
				assert_eq!(data.photos_count, 0);
			}
			other => panic!("unexpected update {other:?}"),
		}
	}

	#[test]
	fn test_fatigued_result_maps_to_fatigue_detection() {
		let (mut session, _) = started();
		let record = ai_record(&session, Classification::Sleeping);
		session.apply(&record).unwrap();

		let delta = SessionDelta::from_committed(&session, &record);
		match delta.update {
			SessionStreamEvent::FatigueDetection(data) => {
				assert_eq!(data.photo_id, "photo-7");
				assert_eq!(data.fatigue_level, 98);
			}
			other => panic!("unexpected update {other:?}"),
		}
	}

	#[test]
	fn test_alert_result_maps_to_processing_complete() {
		let (mut session, _) = started();
		let record = ai_record(&session, Classification::Alert);
		session.apply(&record).unwrap();

		let delta = SessionDelta::from_committed(&session, &record);
		assert_eq!(delta.update.kind(), "ai_processing_complete");
	}

	#[test]
	fn test_stream_event_wire_format() {
		let (session, record) = started();
		let delta = SessionDelta::from_committed(&session, &record);
		let json = serde_json::to_value(&delta.update).unwrap();
		assert_eq!(json["kind"], "session_update");
		assert_eq!(json["payload"]["status"], "active");
	}
}
