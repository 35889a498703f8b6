// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only, per-session event log.
//!
//! The log is the only source of truth for sessions. Each append gets the
//! next per-session sequence number (starting at 1); entries are never
//! updated or removed. Readers may replay while writers append and will
//! observe a growing prefix of the log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::instrument;

use wakesafe_sessions_core::{EventRecord, EventSource, SessionEvent, SessionId};

use crate::error::{Result, SessionsServerError};

/// Storage for session event records.
#[async_trait]
pub trait EventLog: Send + Sync {
	/// Appends an event and returns the stored record with its sequence number.
	async fn append(
		&self,
		session_id: &SessionId,
		timestamp: DateTime<Utc>,
		source: EventSource,
		event: SessionEvent,
	) -> Result<EventRecord>;

	/// Lazily streams records with `seq >= from_seq` in sequence order.
	///
	/// The stream ends at the last record present when it is first polled;
	/// call again to restart.
	fn replay<'a>(&'a self, session_id: &SessionId, from_seq: u64) -> BoxStream<'a, Result<EventRecord>>;

	/// Sequence number of the newest record, 0 for an unknown session.
	async fn last_seq(&self, session_id: &SessionId) -> Result<u64>;

	/// Every session that has at least one record.
	async fn session_ids(&self) -> Result<Vec<SessionId>>;

	/// Collects [`EventLog::replay`] into memory.
	async fn replay_all(&self, session_id: &SessionId, from_seq: u64) -> Result<Vec<EventRecord>> {
		self.replay(session_id, from_seq).try_collect().await
	}
}

type Entries = Arc<RwLock<Vec<EventRecord>>>;

/// Event log kept in process memory.
#[derive(Default)]
pub struct InMemoryEventLog {
	logs: RwLock<HashMap<SessionId, Entries>>,
}

impl InMemoryEventLog {
	pub fn new() -> Self {
		Self::default()
	}

	async fn entries(&self, session_id: &SessionId) -> Option<Entries> {
		self.logs.read().await.get(session_id).cloned()
	}
}

enum Cursor {
	Unopened { session_id: SessionId, next: usize },
	Open { entries: Entries, next: usize, end: usize },
}

#[async_trait]
impl EventLog for InMemoryEventLog {
	async fn append(
		&self,
		session_id: &SessionId,
		timestamp: DateTime<Utc>,
		source: EventSource,
		event: SessionEvent,
	) -> Result<EventRecord> {
		let entries = match self.entries(session_id).await {
			Some(entries) => entries,
			None => Arc::clone(self.logs.write().await.entry(session_id.clone()).or_default()),
		};

		let mut entries = entries.write().await;
		let record = EventRecord {
			session_id: session_id.clone(),
			seq: entries.len() as u64 + 1,
			timestamp,
			source,
			event,
		};
		entries.push(record.clone());
		Ok(record)
	}

	fn replay<'a>(&'a self, session_id: &SessionId, from_seq: u64) -> BoxStream<'a, Result<EventRecord>> {
		let start = Cursor::Unopened {
			session_id: session_id.clone(),
			next: usize::try_from(from_seq.saturating_sub(1)).unwrap_or(usize::MAX),
		};

		stream::unfold(start, move |cursor| async move {
			let (entries, next, end) = match cursor {
				Cursor::Unopened { session_id, next } => {
					let entries = self.entries(&session_id).await?;
					let end = entries.read().await.len();
					(entries, next, end)
				}
				Cursor::Open { entries, next, end } => (entries, next, end),
			};
			if next >= end {
				return None;
			}
			let record = entries.read().await[next].clone();
			Some((Ok(record), Cursor::Open { entries, next: next + 1, end }))
		})
		.boxed()
	}

	async fn last_seq(&self, session_id: &SessionId) -> Result<u64> {
		match self.entries(session_id).await {
			Some(entries) => Ok(entries.read().await.len() as u64),
			None => Ok(0),
		}
	}

	async fn session_ids(&self) -> Result<Vec<SessionId>> {
		let mut ids: Vec<SessionId> = self.logs.read().await.keys().cloned().collect();
		ids.sort();
		Ok(ids)
	}
}

/// SQLite implementation of the event log.
#[derive(Clone)]
pub struct SqliteEventLog {
	pool: SqlitePool,
}

impl SqliteEventLog {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[derive(sqlx::FromRow)]
struct EventRow {
	session_id: String,
	seq: i64,
	source: String,
	timestamp: String,
	payload: String,
}

impl TryFrom<EventRow> for EventRecord {
	type Error = SessionsServerError;

	fn try_from(row: EventRow) -> Result<Self> {
		Ok(EventRecord {
			session_id: row
				.session_id
				.parse()
				.map_err(|_| SessionsServerError::InvalidData("invalid session ID".into()))?,
			seq: row.seq as u64,
			timestamp: DateTime::parse_from_rfc3339(&row.timestamp)
				.map_err(|e| SessionsServerError::InvalidData(format!("invalid timestamp: {e}")))?
				.with_timezone(&Utc),
			source: row
				.source
				.parse()
				.map_err(|e| SessionsServerError::InvalidData(format!("invalid source: {e}")))?,
			event: serde_json::from_str(&row.payload)?,
		})
	}
}

#[async_trait]
impl EventLog for SqliteEventLog {
	#[instrument(skip(self, event), fields(session_id = %session_id, event_type = event.event_type()))]
	async fn append(
		&self,
		session_id: &SessionId,
		timestamp: DateTime<Utc>,
		source: EventSource,
		event: SessionEvent,
	) -> Result<EventRecord> {
		let payload = serde_json::to_string(&event)?;
		let seq: i64 = sqlx::query_scalar(
			r#"
			INSERT INTO session_events (session_id, seq, event_type, source, timestamp, payload)
			VALUES (
				?,
				(SELECT COALESCE(MAX(seq), 0) + 1 FROM session_events WHERE session_id = ?),
				?, ?, ?, ?
			)
			RETURNING seq
			"#,
		)
		.bind(session_id.to_string())
		.bind(session_id.to_string())
		.bind(event.event_type())
		.bind(source.to_string())
		.bind(timestamp.to_rfc3339())
		.bind(payload)
		.fetch_one(&self.pool)
		.await?;

		Ok(EventRecord {
			session_id: session_id.clone(),
			seq: seq as u64,
			timestamp,
			source,
			event,
		})
	}

	fn replay<'a>(&'a self, session_id: &SessionId, from_seq: u64) -> BoxStream<'a, Result<EventRecord>> {
		sqlx::query_as::<_, EventRow>(
			r#"
			SELECT session_id, seq, source, timestamp, payload
			FROM session_events
			WHERE session_id = ? AND seq >= ?
			ORDER BY seq ASC
			"#,
		)
		.bind(session_id.to_string())
		.bind(i64::try_from(from_seq).unwrap_or(i64::MAX))
		.fetch(&self.pool)
		.map(|row| row.map_err(SessionsServerError::from).and_then(EventRecord::try_from))
		.boxed()
	}

	#[instrument(skip(self), fields(session_id = %session_id))]
	async fn last_seq(&self, session_id: &SessionId) -> Result<u64> {
		let seq: i64 =
			sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM session_events WHERE session_id = ?")
				.bind(session_id.to_string())
				.fetch_one(&self.pool)
				.await?;
		Ok(seq as u64)
	}

	#[instrument(skip(self))]
	async fn session_ids(&self) -> Result<Vec<SessionId>> {
		let ids: Vec<String> =
			sqlx::query_scalar("SELECT DISTINCT session_id FROM session_events ORDER BY session_id")
				.fetch_all(&self.pool)
				.await?;
		ids
			.into_iter()
			.map(|id| {
				id.parse()
					.map_err(|_| SessionsServerError::InvalidData(format!("invalid session ID: {id}")))
			})
			.collect()
	}
}
