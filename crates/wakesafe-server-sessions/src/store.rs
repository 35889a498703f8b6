// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot store for session projections.
//!
//! Snapshots are a read model derived from the event log. They can always
//! be rebuilt with [`crate::SessionRegistry::recover`] and are never
//! consulted when validating a mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::instrument;

use wakesafe_sessions_core::{Session, SessionId, SessionState, SubjectId};

use crate::error::Result;

/// Storage for the latest snapshot of each session.
#[async_trait]
pub trait SessionStore: Send + Sync {
	/// Inserts or replaces the snapshot for `session.id`.
	async fn upsert(&self, session: &Session) -> Result<()>;

	async fn get(&self, id: &SessionId) -> Result<Option<Session>>;

	/// Sessions in `state`, most recently started first.
	async fn list_by_state(&self, state: SessionState, limit: u32) -> Result<Vec<Session>>;

	/// The active or paused session owned by `subject_id`, if any.
	async fn find_open_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Session>>;
}

/// Snapshot store kept in process memory.
#[derive(Default)]
pub struct InMemorySessionStore {
	sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
	async fn upsert(&self, session: &Session) -> Result<()> {
		self
			.sessions
			.write()
			.await
			.insert(session.id.clone(), session.clone());
		Ok(())
	}

	async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
		Ok(self.sessions.read().await.get(id).cloned())
	}

	async fn list_by_state(&self, state: SessionState, limit: u32) -> Result<Vec<Session>> {
		let sessions = self.sessions.read().await;
		let mut matching: Vec<Session> = sessions
			.values()
			.filter(|s| s.state == state)
			.cloned()
			.collect();
		matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
		matching.truncate(limit as usize);
		Ok(matching)
	}

	async fn find_open_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Session>> {
		Ok(self
			.sessions
			.read()
			.await
			.values()
			.find(|s| &s.subject_id == subject_id && s.state.is_open())
			.cloned())
	}
}

/// SQLite implementation of the snapshot store.
#[derive(Clone)]
pub struct SqliteSessionStore {
	pool: SqlitePool,
}

impl SqliteSessionStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
	#[instrument(skip(self, session), fields(session_id = %session.id, state = %session.state))]
	async fn upsert(&self, session: &Session) -> Result<()> {
		let snapshot = serde_json::to_string(session)?;

		sqlx::query(
			r#"
			INSERT INTO sessions (id, subject_id, state, started_at, ended_at, duration_ms, last_seq, snapshot, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(id) DO UPDATE SET
				state = excluded.state,
				ended_at = excluded.ended_at,
				duration_ms = excluded.duration_ms,
				last_seq = excluded.last_seq,
				snapshot = excluded.snapshot,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(session.id.to_string())
		.bind(session.subject_id.as_str())
		.bind(session.state.to_string())
		.bind(session.started_at.to_rfc3339())
		.bind(session.ended_at.map(|t| t.to_rfc3339()))
		.bind(session.duration_ms.map(|d| d as i64))
		.bind(session.last_seq as i64)
		.bind(snapshot)
		.bind(session.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(session_id = %id))]
	async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
		let snapshot: Option<String> = sqlx::query_scalar("SELECT snapshot FROM sessions WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		match snapshot {
			Some(json) => Ok(Some(serde_json::from_str(&json)?)),
			None => Ok(None),
		}
	}

	#[instrument(skip(self), fields(state = %state))]
	async fn list_by_state(&self, state: SessionState, limit: u32) -> Result<Vec<Session>> {
		let snapshots: Vec<String> = sqlx::query_scalar(
			r#"
			SELECT snapshot FROM sessions
			WHERE state = ?
			ORDER BY started_at DESC
			LIMIT ?
			"#,
		)
		.bind(state.to_string())
		.bind(limit as i64)
		.fetch_all(&self.pool)
		.await?;

		snapshots
			.iter()
			.map(|json| serde_json::from_str(json).map_err(Into::into))
			.collect()
	}

	#[instrument(skip(self), fields(subject_id = %subject_id))]
	async fn find_open_for_subject(&self, subject_id: &SubjectId) -> Result<Option<Session>> {
		let snapshot: Option<String> = sqlx::query_scalar(
			r#"
			SELECT snapshot FROM sessions
			WHERE subject_id = ? AND state IN ('active', 'paused')
			LIMIT 1
			"#,
		)
		.bind(subject_id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		match snapshot {
			Some(json) => Ok(Some(serde_json::from_str(&json)?)),
			None => Ok(None),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::testing::memory_pool;
	use chrono::{Duration, TimeZone, Utc};
	use wakesafe_sessions_core::{
		EventRecord, EventSource, SessionConfig, SessionEndedData, SessionEvent, SessionStartedData,
	};

	fn session_for(subject: &str, minutes: i64) -> Session {
		let record = EventRecord {
			session_id: SessionId::new(),
			seq: 1,
			timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes),
			source: EventSource::Registry,
			event: SessionEvent::Started(SessionStartedData {
				subject_id: SubjectId::new(subject),
				config: SessionConfig::default(),
				start_location: None,
			}),
		};
		Session::from_started(&record).unwrap()
	}

	fn ended(mut session: Session) -> Session {
		let record = EventRecord {
			session_id: session.id.clone(),
			seq: session.last_seq + 1,
			timestamp: session.started_at + Duration::minutes(30),
			source: EventSource::Registry,
			event: SessionEvent::Ended(SessionEndedData { end_location: None }),
		};
		session.apply(&record).unwrap();
		session
	}

	async fn exercise_store(store: &dyn SessionStore) {
		let first = session_for("driver-1", 0);
		let second = session_for("driver-2", 10);
		store.upsert(&first).await.unwrap();
		store.upsert(&second).await.unwrap();

		assert_eq!(store.get(&first.id).await.unwrap(), Some(first.clone()));
		assert!(store.get(&SessionId::new()).await.unwrap().is_none());

		let active = store.list_by_state(SessionState::Active, 10).await.unwrap();
		assert_eq!(active.iter().map(|s| &s.id).collect::<Vec<_>>(), vec![&second.id, &first.id]);
		assert_eq!(store.list_by_state(SessionState::Active, 1).await.unwrap().len(), 1);

		let open = store.find_open_for_subject(&SubjectId::new("driver-1")).await.unwrap();
		assert_eq!(open.map(|s| s.id), Some(first.id.clone()));

		let first_ended = ended(first);
		store.upsert(&first_ended).await.unwrap();
		assert!(store
			.find_open_for_subject(&SubjectId::new("driver-1"))
			.await
			.unwrap()
			.is_none());
		assert_eq!(store.list_by_state(SessionState::Ended, 10).await.unwrap(), vec![first_ended]);
	}

	#[tokio::test]
	async fn test_in_memory_store() {
		exercise_store(&InMemorySessionStore::new()).await;
	}

	#[tokio::test]
	async fn test_sqlite_store() {
		let pool = memory_pool().await;
		exercise_store(&SqliteSessionStore::new(pool)).await;
	}

	#[tokio::test]
	async fn test_sqlite_rejects_second_open_session_for_subject() {
		let pool = memory_pool().await;
		let store = SqliteSessionStore::new(pool);

		store.upsert(&session_for("driver-1", 0)).await.unwrap();
		let result = store.upsert(&session_for("driver-1", 5)).await;
		assert!(result.is_err());
	}
}
