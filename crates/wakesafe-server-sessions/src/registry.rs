// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session registry: lifecycle state machine and ingestion entry point.
//!
//! Every mutation of a session goes through [`SessionRegistry::commit`]
//! under that session's mutex:
//!
//! 1. validate the event against the current state
//! 2. append it to the [`EventLog`]
//! 3. fold the stored record into the in-memory [`Session`]
//! 4. refresh the snapshot and publish one [`SessionDelta`]
//!
//! A failed validation or append returns before step 3, so the session is
//! left as it was. The mutex is a FIFO queue, so operations on one session
//! are applied in arrival order while different sessions run in parallel.
//!
//! Only open sessions are held in memory. Once a session ends or fails its
//! snapshot is written, its subject is released and it is dropped from the
//! live set; later reads are served from the snapshot store or the log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use futures::stream::BoxStream;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use wakesafe_sessions_core::{
	EventRecord, EventSource, GeoPoint, Notification, Session, SessionConfig, SessionDelta,
	SessionEndedData, SessionEvent, SessionFailedData, SessionId, SessionStartedData, SessionState,
	SessionsError, SubjectId,
};

use crate::broadcast::{SessionSubscription, SessionsBroadcaster};
use crate::error::Result;
use crate::event_log::EventLog;
use crate::store::SessionStore;

struct SessionEntry {
	subject_id: SubjectId,
	session: Mutex<Session>,
}

/// Holds the open session of one subject, if any. Locked for the whole of
/// `start` so check-and-create is atomic per subject.
type SubjectSlot = Arc<Mutex<Option<SessionId>>>;

enum Lookup {
	Live(Arc<SessionEntry>),
	Finished(Session),
}

/// Owns all live sessions.
pub struct SessionRegistry {
	log: Arc<dyn EventLog>,
	store: Arc<dyn SessionStore>,
	broadcaster: Arc<SessionsBroadcaster>,
	sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
	subjects: StdMutex<HashMap<SubjectId, SubjectSlot>>,
}

impl SessionRegistry {
	pub fn new(
		log: Arc<dyn EventLog>,
		store: Arc<dyn SessionStore>,
		broadcaster: Arc<SessionsBroadcaster>,
	) -> Self {
		Self {
			log,
			store,
			broadcaster,
			sessions: RwLock::new(HashMap::new()),
			subjects: StdMutex::new(HashMap::new()),
		}
	}

	pub fn broadcaster(&self) -> &Arc<SessionsBroadcaster> {
		&self.broadcaster
	}

	fn subject_slot(&self, subject_id: &SubjectId) -> SubjectSlot {
		let mut subjects = self.subjects.lock().unwrap_or_else(|e| e.into_inner());
		Arc::clone(subjects.entry(subject_id.clone()).or_default())
	}

	/// Drops the slot of `subject_id` once it is empty and nobody else
	/// holds it. Slots are only handed out under the `subjects` lock, so a
	/// strong count of one means no operation is in flight.
	fn prune_subject(&self, subject_id: &SubjectId) {
		let mut subjects = self.subjects.lock().unwrap_or_else(|e| e.into_inner());
		let idle = subjects.get(subject_id).is_some_and(|slot| {
			Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|open| open.is_none())
		});
		if idle {
			subjects.remove(subject_id);
		}
	}

	/// Looks up a session owned by `caller`. Someone else's session is
	/// reported exactly like a missing one.
	async fn lookup(&self, caller: &SubjectId, id: &SessionId) -> Result<Lookup> {
		let live = self.sessions.read().await.get(id).cloned();
		match live {
			Some(entry) if &entry.subject_id == caller => Ok(Lookup::Live(entry)),
			Some(_) => Err(not_found(id)),
			None => {
				let session = self.finished(id).await?;
				if &session.subject_id != caller {
					return Err(not_found(id));
				}
				Ok(Lookup::Finished(session))
			}
		}
	}

	/// A session that is no longer live. The stored snapshot is used when
	/// it is terminal, otherwise the log is folded.
	async fn finished(&self, id: &SessionId) -> Result<Session> {
		match self.store.get(id).await? {
			Some(snapshot) if snapshot.state.is_terminal() => Ok(snapshot),
			_ => self.rebuild(id).await,
		}
	}

	/// Starts a new session for `subject_id`.
	#[instrument(skip(self, config, start_location), fields(subject_id = %subject_id))]
	pub async fn start(
		&self,
		subject_id: &SubjectId,
		config: SessionConfig,
		start_location: Option<GeoPoint>,
	) -> Result<Session> {
		config.validate()?;
		let result = self.start_in_slot(subject_id, config, start_location).await;
		self.prune_subject(subject_id);
		result
	}

	async fn start_in_slot(
		&self,
		subject_id: &SubjectId,
		config: SessionConfig,
		start_location: Option<GeoPoint>,
	) -> Result<Session> {
		let slot = self.subject_slot(subject_id);
		let mut open = slot.lock().await;
		if let Some(session_id) = open.as_ref() {
			debug!(session_id = %session_id, "Subject already has an open session");
			return Err(SessionsError::Conflict {
				subject_id: subject_id.clone(),
				session_id: session_id.clone(),
			}
			.into());
		}

		let id = SessionId::new();
		let event = SessionEvent::Started(SessionStartedData {
			subject_id: subject_id.clone(),
			config,
			start_location,
		});
		event.validate()?;

		let record = self.log.append(&id, Utc::now(), EventSource::Registry, event).await?;
		let session = Session::from_started(&record)?;

		let entry = Arc::new(SessionEntry {
			subject_id: subject_id.clone(),
			session: Mutex::new(session.clone()),
		});
		// Held until the first snapshot is written so a concurrent end
		// cannot have its snapshot overwritten by this one.
		let _guard = entry.session.lock().await;
		self.sessions.write().await.insert(id.clone(), Arc::clone(&entry));
		*open = Some(id.clone());

		info!(session_id = %id, "Session started");
		self.persist(&session).await;
		self.publish(&session, &record).await;
		Ok(session)
	}

	pub async fn pause(&self, caller: &SubjectId, id: &SessionId) -> Result<Session> {
		self.commit(caller, id, EventSource::Registry, SessionEvent::Paused).await
	}

	pub async fn resume(&self, caller: &SubjectId, id: &SessionId) -> Result<Session> {
		self.commit(caller, id, EventSource::Registry, SessionEvent::Resumed).await
	}

	pub async fn end(
		&self,
		caller: &SubjectId,
		id: &SessionId,
		end_location: Option<GeoPoint>,
	) -> Result<Session> {
		let event = SessionEvent::Ended(SessionEndedData { end_location });
		self.commit(caller, id, EventSource::Registry, event).await
	}

	pub async fn fail(
		&self,
		caller: &SubjectId,
		id: &SessionId,
		error_type: impl Into<String>,
		message: impl Into<String>,
	) -> Result<Session> {
		let event = SessionEvent::Failed(SessionFailedData {
			error_type: error_type.into(),
			message: message.into(),
		});
		self.commit(caller, id, EventSource::Registry, event).await
	}

	/// Records an upload, AI result, location ping or photo status change.
	///
	/// The session must be active. Stats reflect the event once this returns.
	pub async fn ingest(
		&self,
		caller: &SubjectId,
		id: &SessionId,
		source: EventSource,
		event: SessionEvent,
	) -> Result<Session> {
		if event.is_lifecycle() {
			return Err(SessionsError::Validation(format!(
				"{} cannot be ingested; use the lifecycle operations",
				event.event_type()
			))
			.into());
		}
		self.commit(caller, id, source, event).await
	}

	/// Validates an inbound notification and ingests it.
	pub async fn record_notification<N: Notification + Send>(
		&self,
		caller: &SubjectId,
		id: &SessionId,
		notification: N,
	) -> Result<Session> {
		let source = notification.source();
		let event = notification.into_event()?;
		self.ingest(caller, id, source, event).await
	}

	#[instrument(skip(self, caller, event), fields(session_id = %id, event_type = event.event_type()))]
	async fn commit(
		&self,
		caller: &SubjectId,
		id: &SessionId,
		source: EventSource,
		event: SessionEvent,
	) -> Result<Session> {
		let entry = match self.lookup(caller, id).await? {
			Lookup::Live(entry) => entry,
			Lookup::Finished(session) => {
				session.validate(&event)?;
				return Err(SessionsError::InvalidState {
					session_id: id.clone(),
					state: session.state,
					operation: event.event_type(),
				}
				.into());
			}
		};
		let mut session = entry.session.lock().await;

		session.validate(&event)?;
		let record = self.log.append(id, Utc::now(), source, event).await?;
		if let Err(e) = session.apply(&record) {
			error!(seq = record.seq, error = %e, "Appended record could not be applied");
			return Err(e.into());
		}

		let snapshot = session.clone();
		// The terminal snapshot must be stored before the subject is free
		// to start again, or the new open snapshot would collide with it.
		self.persist(&snapshot).await;

		if snapshot.state.is_terminal() {
			self.sessions.write().await.remove(id);
			self.release_subject(&snapshot).await;
			info!(state = %snapshot.state, "Session finished");
		}

		self.publish(&snapshot, &record).await;
		if snapshot.state.is_terminal() {
			self.broadcaster.close_session(id).await;
		}
		Ok(snapshot)
	}

	async fn release_subject(&self, session: &Session) {
		let slot = self.subject_slot(&session.subject_id);
		{
			let mut open = slot.lock().await;
			if open.as_ref() == Some(&session.id) {
				*open = None;
			}
		}
		drop(slot);
		self.prune_subject(&session.subject_id);
	}

	async fn persist(&self, session: &Session) {
		if let Err(e) = self.store.upsert(session).await {
			warn!(session_id = %session.id, error = %e, "Failed to persist session snapshot");
		}
	}

	async fn publish(&self, session: &Session, record: &EventRecord) {
		if !session.config.features.realtime_updates {
			return;
		}
		self
			.broadcaster
			.publish(SessionDelta::from_committed(session, record))
			.await;
	}

	/// Current snapshot of a session.
	pub async fn get(&self, caller: &SubjectId, id: &SessionId) -> Result<Session> {
		match self.lookup(caller, id).await? {
			Lookup::Live(entry) => Ok(entry.session.lock().await.clone()),
			Lookup::Finished(session) => Ok(session),
		}
	}

	/// Subscribe to a session's deltas.
	///
	/// Taken under the session lock, so every delta after the session's
	/// current `last_seq` reaches the subscriber. Sessions that are already
	/// over get a closed subscription.
	pub async fn subscribe(&self, caller: &SubjectId, id: &SessionId) -> Result<SessionSubscription> {
		let entry = match self.lookup(caller, id).await? {
			Lookup::Live(entry) => entry,
			Lookup::Finished(_) => return Ok(SessionSubscription::closed(id.clone())),
		};
		let session = entry.session.lock().await;
		if session.state.is_terminal() {
			return Ok(SessionSubscription::closed(id.clone()));
		}
		self.broadcaster.subscribe(id).await
	}

	/// Streams the session's records with `seq >= from_seq`.
	pub async fn replay(
		&self,
		caller: &SubjectId,
		id: &SessionId,
		from_seq: u64,
	) -> Result<BoxStream<'_, Result<EventRecord>>> {
		self.lookup(caller, id).await?;
		Ok(self.log.replay(id, from_seq))
	}

	/// Number of open sessions held in memory.
	pub async fn live_count(&self) -> usize {
		self.sessions.read().await.len()
	}

	/// Number of subjects with a tracked slot.
	pub fn tracked_subjects(&self) -> usize {
		self.subjects.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	/// The open session of `subject_id`, if any.
	pub async fn open_session_for(&self, subject_id: &SubjectId) -> Result<Option<Session>> {
		let slot = {
			let subjects = self.subjects.lock().unwrap_or_else(|e| e.into_inner());
			subjects.get(subject_id).cloned()
		};
		let open = match slot {
			Some(slot) => slot.lock().await.clone(),
			None => None,
		};
		match open {
			Some(id) => self.get(subject_id, &id).await.map(Some),
			None => Ok(None),
		}
	}

	/// Sessions in `state`, from the snapshot store.
	pub async fn sessions_in_state(&self, state: SessionState, limit: u32) -> Result<Vec<Session>> {
		self.store.list_by_state(state, limit).await
	}

	/// Folds a session from its log without touching the live copy.
	#[instrument(skip(self), fields(session_id = %id))]
	pub async fn rebuild(&self, id: &SessionId) -> Result<Session> {
		let records = self.log.replay_all(id, 1).await?;
		if records.is_empty() {
			return Err(SessionsError::NotFound(format!("session {id}")).into());
		}
		Ok(Session::replay(&records)?)
	}

	/// Rebuilds every session from the log and refreshes the snapshot store.
	///
	/// Open sessions are loaded into memory. A session whose log cannot be
	/// folded is logged and skipped. Returns the number of sessions
	/// recovered.
	#[instrument(skip(self))]
	pub async fn recover(&self) -> Result<usize> {
		let ids = self.log.session_ids().await?;
		let mut recovered = 0;
		let mut skipped = 0;

		for id in ids {
			let session = match self.rebuild(&id).await {
				Ok(session) => session,
				Err(e) => {
					error!(session_id = %id, error = %e, "Skipping session whose log does not fold");
					skipped += 1;
					continue;
				}
			};
			self.persist(&session).await;
			recovered += 1;

			if !session.state.is_open() {
				continue;
			}
			let slot = self.subject_slot(&session.subject_id);
			let mut open = slot.lock().await;
			if let Some(existing) = open.as_ref() {
				warn!(
					session_id = %id,
					existing = %existing,
					subject_id = %session.subject_id,
					"Log holds more than one open session for subject"
				);
				continue;
			}
			*open = Some(id.clone());
			self.sessions.write().await.insert(
				id,
				Arc::new(SessionEntry {
					subject_id: session.subject_id.clone(),
					session: Mutex::new(session),
				}),
			);
		}

		info!(sessions = recovered, skipped, "Recovered sessions from event log");
		Ok(recovered)
	}
}

fn not_found(id: &SessionId) -> crate::error::SessionsServerError {
	SessionsError::NotFound(format!("session {id}")).into()
}
