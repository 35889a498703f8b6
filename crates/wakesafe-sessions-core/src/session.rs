// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session types and the lifecycle state machine.
//!
//! A [`Session`] is a fold over its event records. [`Session::validate`]
//! decides whether an event may be appended given the current state, and
//! [`Session::apply`] folds an appended record. Live updates and replay
//! use the same two functions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SessionsError};
use crate::event::{EventRecord, GeoPoint, SessionEvent};
use crate::stats::SessionStats;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}

	#[must_use]
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for SessionId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Identifier of the monitored driver, issued by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SubjectId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	Active,
	Paused,
	Ended,
	Error,
}

impl SessionState {
	/// Ended and errored sessions accept nothing further.
	#[must_use]
	pub fn is_terminal(&self) -> bool {
		matches!(self, SessionState::Ended | SessionState::Error)
	}

	/// Active or paused: counted against the one-open-session-per-subject rule.
	#[must_use]
	pub fn is_open(&self) -> bool {
		!self.is_terminal()
	}
}

impl std::fmt::Display for SessionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SessionState::Active => write!(f, "active"),
			SessionState::Paused => write!(f, "paused"),
			SessionState::Ended => write!(f, "ended"),
			SessionState::Error => write!(f, "error"),
		}
	}
}

impl std::str::FromStr for SessionState {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"active" => Ok(SessionState::Active),
			"paused" => Ok(SessionState::Paused),
			"ended" => Ok(SessionState::Ended),
			"error" => Ok(SessionState::Error),
			_ => Err(SessionsError::InvalidStateName(s.to_string())),
		}
	}
}

/// Optional capabilities switched on per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
	pub ai_processing: bool,
	pub location_tracking: bool,
	pub realtime_updates: bool,
}

impl Default for FeatureToggles {
	fn default() -> Self {
		Self {
			ai_processing: true,
			location_tracking: true,
			realtime_updates: true,
		}
	}
}

/// Capture configuration, fixed when the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	pub capture_interval_ms: u64,
	pub batch_size: u32,
	pub features: FeatureToggles,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			capture_interval_ms: 5_000,
			batch_size: 10,
			features: FeatureToggles::default(),
		}
	}
}

impl SessionConfig {
	pub fn validate(&self) -> Result<()> {
		if self.capture_interval_ms == 0 {
			return Err(SessionsError::Validation(
				"capture_interval_ms must be greater than zero".to_string(),
			));
		}
		if self.batch_size == 0 {
			return Err(SessionsError::Validation("batch_size must be greater than zero".to_string()));
		}
		Ok(())
	}
}

/// One point of the driven route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
	pub lat: f64,
	pub lng: f64,
	pub speed_mps: f64,
	pub heading_deg: f64,
	pub timestamp: DateTime<Utc>,
}

/// Error reported through `fail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
	pub error_type: String,
	pub message: String,
	pub timestamp: DateTime<Utc>,
}

/// One monitoring period for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
	pub id: SessionId,
	pub subject_id: SubjectId,
	pub state: SessionState,

	pub started_at: DateTime<Utc>,
	/// Set iff the session is ended or errored
	pub ended_at: Option<DateTime<Utc>>,
	pub duration_ms: Option<u64>,

	pub start_location: Option<GeoPoint>,
	pub end_location: Option<GeoPoint>,
	pub route: Vec<RoutePoint>,

	pub stats: SessionStats,
	pub config: SessionConfig,
	pub error_log: Vec<ErrorLogEntry>,

	/// Sequence number of the last applied record
	pub last_seq: u64,
	pub updated_at: DateTime<Utc>,
}

impl Session {
	/// Builds a session from its `session.started` record.
	pub fn from_started(record: &EventRecord) -> Result<Self> {
		let SessionEvent::Started(data) = &record.event else {
			return Err(SessionsError::Validation(format!(
				"first record of session {} must be session.started, got {}",
				record.session_id,
				record.event.event_type()
			)));
		};
		if record.seq != 1 {
			return Err(SessionsError::SequenceGap {
				expected: 1,
				actual: record.seq,
			});
		}
		record.event.validate()?;

		Ok(Session {
			id: record.session_id.clone(),
			subject_id: data.subject_id.clone(),
			state: SessionState::Active,
			started_at: record.timestamp,
			ended_at: None,
			duration_ms: None,
			start_location: data.start_location,
			end_location: None,
			route: Vec::new(),
			stats: SessionStats::default(),
			config: data.config.clone(),
			error_log: Vec::new(),
			last_seq: record.seq,
			updated_at: record.timestamp,
		})
	}

	/// Rebuilds a session by folding its records from the start.
	pub fn replay<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> Result<Self> {
		let mut records = records.into_iter();
		let first = records
			.next()
			.ok_or_else(|| SessionsError::Validation("cannot replay an empty log".to_string()))?;
		let mut session = Session::from_started(first)?;
		for record in records {
			session.apply(record)?;
		}
		Ok(session)
	}

	/// Checks whether `event` may be appended in the current state.
	pub fn validate(&self, event: &SessionEvent) -> Result<()> {
		event.validate()?;

		let invalid = |operation: &'static str| SessionsError::InvalidState {
			session_id: self.id.clone(),
			state: self.state,
			operation,
		};

		match event {
			SessionEvent::Started(_) => Err(invalid("start")),
			SessionEvent::Paused if self.state != SessionState::Active => Err(invalid("pause")),
			SessionEvent::Resumed if self.state != SessionState::Paused => Err(invalid("resume")),
			SessionEvent::Ended(_) if self.state.is_terminal() => Err(invalid("end")),
			SessionEvent::Failed(_) if self.state.is_terminal() => Err(invalid("fail")),
			SessionEvent::Paused
			| SessionEvent::Resumed
			| SessionEvent::Ended(_)
			| SessionEvent::Failed(_) => Ok(()),
			SessionEvent::UploadCompleted(_)
			| SessionEvent::AiResult(_)
			| SessionEvent::LocationPing(_)
			| SessionEvent::PhotoStatus(_) => {
				if self.state == SessionState::Active {
					Ok(())
				} else {
					Err(SessionsError::NotActive {
						session_id: self.id.clone(),
						state: self.state,
					})
				}
			}
		}
	}

	/// Folds an appended record into the session.
	///
	/// Validation runs before any field is touched, so a rejected record
	/// leaves the session unchanged.
	pub fn apply(&mut self, record: &EventRecord) -> Result<()> {
		if record.seq != self.last_seq + 1 {
			return Err(SessionsError::SequenceGap {
				expected: self.last_seq + 1,
				actual: record.seq,
			});
		}
		self.validate(&record.event)?;

		match &record.event {
			SessionEvent::Started(_) => {
				return Err(SessionsError::InvalidState {
					session_id: self.id.clone(),
					state: self.state,
					operation: "start",
				})
			}
			SessionEvent::Paused => self.state = SessionState::Paused,
			SessionEvent::Resumed => self.state = SessionState::Active,
			SessionEvent::Ended(data) => {
				self.end_location = data.end_location;
				self.finish(SessionState::Ended, record.timestamp);
			}
			SessionEvent::Failed(data) => {
				self.error_log.push(ErrorLogEntry {
					error_type: data.error_type.clone(),
					message: data.message.clone(),
					timestamp: record.timestamp,
				});
				self.finish(SessionState::Error, record.timestamp);
			}
			SessionEvent::LocationPing(ping) => self.route.push(RoutePoint {
				lat: ping.lat,
				lng: ping.lng,
				speed_mps: ping.speed_mps,
				heading_deg: ping.heading_deg,
				timestamp: record.timestamp,
			}),
			event @ (SessionEvent::UploadCompleted(_)
			| SessionEvent::AiResult(_)
			| SessionEvent::PhotoStatus(_)) => self.stats.fold(event)?,
		}

		self.last_seq = record.seq;
		self.updated_at = record.timestamp;
		Ok(())
	}

	fn finish(&mut self, state: SessionState, at: DateTime<Utc>) {
		let at = at.max(self.started_at);
		self.state = state;
		self.ended_at = Some(at);
		self.duration_ms = Some((at - self.started_at).num_milliseconds() as u64);
	}

	/// Elapsed time at `now`, or the final duration once the session is over.
	#[must_use]
	pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
		match self.duration_ms {
			Some(duration) => duration,
			None => (now - self.started_at).num_milliseconds().max(0) as u64,
		}
	}

	/// The most recent route point, if any.
	#[must_use]
	pub fn current_location(&self) -> Option<&RoutePoint> {
		self.route.last()
	}
}
