// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, TryStreamExt};
use proptest::prelude::*;
use tokio::time::timeout;

use wakesafe_server_sessions::{
	create_pool, run_migrations, EventLog, InMemoryEventLog, InMemorySessionStore, SessionRegistry,
	SessionStore, SessionsBroadcaster, SessionsServerError, SqliteEventLog, SqliteSessionStore,
	SubscriptionEvent,
};
use wakesafe_sessions_core::{
	AiResult, AiResultNotification, Classification, EventRecord, EventSource, GeoPoint,
	LocationNotification, Session, SessionConfig, SessionEvent, SessionId, SessionState,
	SessionStreamEvent, SessionsError, SubjectId, UploadCompleted, UploadNotification,
};

fn in_memory_registry() -> SessionRegistry {
	SessionRegistry::new(
		Arc::new(InMemoryEventLog::new()),
		Arc::new(InMemorySessionStore::new()),
		Arc::new(SessionsBroadcaster::with_defaults()),
	)
}

fn driver(name: &str) -> SubjectId {
	SubjectId::new(name)
}

fn ai(classification: Classification, confidence: f64, processing_time_ms: f64) -> SessionEvent {
	SessionEvent::AiResult(AiResult {
		photo_id: format!("photo-{confidence}"),
		classification,
		confidence,
		processing_time_ms,
	})
}

fn core(err: &SessionsServerError) -> &SessionsError {
	err.as_core().expect("expected a domain error")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_for_one_subject_yield_one_session() {
	let registry = Arc::new(in_memory_registry());
	let subject = driver("driver-1");

	let handles: Vec<_> = (0..16)
		.map(|_| {
			let registry = Arc::clone(&registry);
			let subject = subject.clone();
			tokio::spawn(async move { registry.start(&subject, SessionConfig::default(), None).await })
		})
		.collect();

	let mut successes = 0;
	let mut conflicts = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Ok(_) => successes += 1,
			Err(e) if matches!(core(&e), SessionsError::Conflict { .. }) => conflicts += 1,
			Err(e) => panic!("unexpected error {e}"),
		}
	}
	assert_eq!(successes, 1);
	assert_eq!(conflicts, 15);
}

#[tokio::test]
async fn end_twice_fails_the_second_time() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	let ended = registry.end(&subject, &session.id, None).await.unwrap();
	assert_eq!(ended.state, SessionState::Ended);
	assert!(ended.ended_at.is_some());

	let err = registry.end(&subject, &session.id, None).await.unwrap_err();
	assert!(matches!(
		core(&err),
		SessionsError::InvalidState { operation: "end", state: SessionState::Ended, .. }
	));
}

#[tokio::test]
async fn drive_scenario_updates_stats_and_enforces_single_session() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let start_location = Some(GeoPoint { lat: 32.08, lng: 34.78 });
	let session = registry
		.start(&subject, SessionConfig::default(), start_location)
		.await
		.unwrap();
	assert_eq!(session.state, SessionState::Active);

	let after_ai = registry
		.record_notification(
			&subject,
			&session.id,
			AiResultNotification {
				photo_id: "p1".to_string(),
				classification: "drowsy".to_string(),
				confidence: 0.8,
				processing_time_ms: 120.0,
			},
		)
		.await
		.unwrap();
	assert_eq!(after_ai.stats.ai.total_processed, 1);
	assert_eq!(after_ai.stats.ai.drowsy_count, 1);
	assert_eq!(after_ai.stats.ai.avg_confidence, 0.8);
	assert_eq!(after_ai.stats.ai.avg_processing_time_ms, 120.0);

	let after_upload = registry
		.record_notification(
			&subject,
			&session.id,
			UploadNotification {
				photo_id: "p1".to_string(),
				success: true,
				duration_ms: 300.0,
				file_size_bytes: 50_000,
			},
		)
		.await
		.unwrap();
	assert_eq!(after_upload.stats.uploads.total_uploads, 1);
	assert_eq!(after_upload.stats.uploads.successful_uploads, 1);
	assert_eq!(after_upload.stats.uploads.avg_upload_duration_ms, 300.0);
	assert_eq!(after_upload.stats.uploads.total_data_uploaded, 50_000);

	let err = registry.start(&subject, SessionConfig::default(), None).await.unwrap_err();
	assert!(matches!(core(&err), SessionsError::Conflict { session_id, .. } if *session_id == session.id));

	let ended = registry.end(&subject, &session.id, None).await.unwrap();
	assert_eq!(ended.state, SessionState::Ended);
	assert_eq!(ended.stats, after_upload.stats);
	assert_eq!(
		ended.duration_ms,
		Some((ended.ended_at.unwrap() - ended.started_at).num_milliseconds() as u64)
	);

	// The subject may start again once the previous session is over.
	let next = registry.start(&subject, SessionConfig::default(), None).await.unwrap();
	assert_ne!(next.id, session.id);
	assert_eq!(registry.open_session_for(&subject).await.unwrap().map(|s| s.id), Some(next.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn concurrent_ai_results_average_exactly() {
	let registry = Arc::new(in_memory_registry());
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	let handles: Vec<_> = [0.2, 0.6, 1.0]
		.into_iter()
		.map(|confidence| {
			let registry = Arc::clone(&registry);
			let subject = subject.clone();
			let id = session.id.clone();
			tokio::spawn(async move {
				registry
					.ingest(&subject, &id, EventSource::AiServer, ai(Classification::Alert, confidence, 100.0))
					.await
			})
		})
		.collect();
	for handle in handles {
		handle.await.unwrap().unwrap();
	}

	let session = registry.get(&subject, &session.id).await.unwrap();
	assert_eq!(session.stats.ai.total_processed, 3);
	assert!((session.stats.ai.avg_confidence - 0.6).abs() < 1e-12);
	assert_eq!(session.last_seq, 4);
}

#[tokio::test]
async fn other_subjects_session_is_not_found() {
	let registry = in_memory_registry();
	let owner = driver("driver-1");
	let intruder = driver("driver-2");
	let session = registry.start(&owner, SessionConfig::default(), None).await.unwrap();

	let foreign = registry.get(&intruder, &session.id).await.unwrap_err();
	let missing = registry.get(&owner, &SessionId::new()).await.unwrap_err();
	assert!(matches!(core(&foreign), SessionsError::NotFound(_)));
	assert!(matches!(core(&missing), SessionsError::NotFound(_)));

	let err = registry
		.ingest(&intruder, &session.id, EventSource::AiServer, ai(Classification::Alert, 0.5, 10.0))
		.await
		.unwrap_err();
	assert!(matches!(core(&err), SessionsError::NotFound(_)));
	assert!(registry.subscribe(&intruder, &session.id).await.is_err());
	assert!(registry.end(&intruder, &session.id, None).await.is_err());

	let unchanged = registry.get(&owner, &session.id).await.unwrap();
	assert_eq!(unchanged, session);
}

#[tokio::test]
async fn paused_session_rejects_ingestion_until_resumed() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	registry.pause(&subject, &session.id).await.unwrap();
	let err = registry
		.record_notification(
			&subject,
			&session.id,
			LocationNotification {
				lat: 32.1,
				lng: 34.8,
				speed_mps: 12.0,
				heading_deg: 45.0,
			},
		)
		.await
		.unwrap_err();
	assert!(matches!(core(&err), SessionsError::NotActive { state: SessionState::Paused, .. }));

	let err = registry.pause(&subject, &session.id).await.unwrap_err();
	assert!(matches!(core(&err), SessionsError::InvalidState { operation: "pause", .. }));

	registry.resume(&subject, &session.id).await.unwrap();
	let session = registry
		.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Alert, 0.9, 50.0))
		.await
		.unwrap();
	assert_eq!(session.stats.ai.total_processed, 1);
}

#[tokio::test]
async fn lifecycle_events_cannot_be_ingested() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	let err = registry
		.ingest(&subject, &session.id, EventSource::Uploader, SessionEvent::Paused)
		.await
		.unwrap_err();
	assert!(matches!(core(&err), SessionsError::Validation(_)));
	assert_eq!(registry.get(&subject, &session.id).await.unwrap().state, SessionState::Active);
}

#[tokio::test]
async fn failed_session_records_error_and_frees_subject() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	let failed = registry
		.fail(&subject, &session.id, "camera", "camera disconnected")
		.await
		.unwrap();
	assert_eq!(failed.state, SessionState::Error);
	assert_eq!(failed.error_log.len(), 1);
	assert_eq!(failed.error_log[0].error_type, "camera");

	let err = registry.fail(&subject, &session.id, "camera", "again").await.unwrap_err();
	assert!(matches!(core(&err), SessionsError::InvalidState { operation: "fail", .. }));
	assert!(registry.open_session_for(&subject).await.unwrap().is_none());
}

/// Event log whose appends can be switched off.
struct FlakyLog {
	inner: InMemoryEventLog,
	failing: AtomicBool,
}

#[async_trait]
impl EventLog for FlakyLog {
	async fn append(
		&self,
		session_id: &SessionId,
		timestamp: DateTime<Utc>,
		source: EventSource,
		event: SessionEvent,
	) -> wakesafe_server_sessions::Result<EventRecord> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(SessionsServerError::InvalidData("log unavailable".to_string()));
		}
		self.inner.append(session_id, timestamp, source, event).await
	}

	fn replay<'a>(
		&'a self,
		session_id: &SessionId,
		from_seq: u64,
	) -> BoxStream<'a, wakesafe_server_sessions::Result<EventRecord>> {
		self.inner.replay(session_id, from_seq)
	}

	async fn last_seq(&self, session_id: &SessionId) -> wakesafe_server_sessions::Result<u64> {
		self.inner.last_seq(session_id).await
	}

	async fn session_ids(&self) -> wakesafe_server_sessions::Result<Vec<SessionId>> {
		self.inner.session_ids().await
	}
}

#[tokio::test]
async fn failed_append_leaves_session_untouched() {
	let log = Arc::new(FlakyLog {
		inner: InMemoryEventLog::new(),
		failing: AtomicBool::new(false),
	});
	let registry = SessionRegistry::new(
		log.clone(),
		Arc::new(InMemorySessionStore::new()),
		Arc::new(SessionsBroadcaster::with_defaults()),
	);
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	log.failing.store(true, Ordering::SeqCst);
	let result = registry
		.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Drowsy, 0.7, 90.0))
		.await;
	assert!(matches!(result, Err(SessionsServerError::InvalidData(_))));
	assert!(registry.end(&subject, &session.id, None).await.is_err());

	let unchanged = registry.get(&subject, &session.id).await.unwrap();
	assert_eq!(unchanged, session);

	log.failing.store(false, Ordering::SeqCst);
	let session = registry
		.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Drowsy, 0.7, 90.0))
		.await
		.unwrap();
	assert_eq!(session.last_seq, 2);
	assert_eq!(session.stats.ai.total_processed, 1);
}

#[tokio::test]
async fn subscriber_sees_every_delta_in_order_then_end_of_stream() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();
	let mut subscription = registry.subscribe(&subject, &session.id).await.unwrap();

	registry
		.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Sleeping, 0.9, 80.0))
		.await
		.unwrap();
	registry
		.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Alert, 0.9, 80.0))
		.await
		.unwrap();
	registry
		.ingest(
			&subject,
			&session.id,
			EventSource::Uploader,
			SessionEvent::UploadCompleted(UploadCompleted {
				photo_id: "p1".to_string(),
				success: true,
				duration_ms: 250.0,
				file_size_bytes: 1_000,
			}),
		)
		.await
		.unwrap();
	registry.end(&subject, &session.id, None).await.unwrap();

	let mut kinds = Vec::new();
	let mut seqs = Vec::new();
	while let Some(event) = timeout(Duration::from_secs(1), subscription.recv()).await.unwrap() {
		match event {
			SubscriptionEvent::Delta(delta) => {
				seqs.push(delta.seq);
				kinds.push(delta.update.kind());
				if let SessionStreamEvent::SessionUpdate(update) = &delta.update {
					if delta.seq == 5 {
						assert_eq!(update.status, SessionState::Ended);
						assert_eq!(update.photos_count, 1);
					}
				}
			}
			SubscriptionEvent::Behind { .. } => panic!("subscriber should keep up"),
		}
	}

	assert_eq!(seqs, vec![2, 3, 4, 5]);
	assert_eq!(
		kinds,
		vec!["fatigue_detection", "ai_processing_complete", "session_update", "session_update"]
	);

	// Ended sessions only offer a closed stream.
	let mut late = registry.subscribe(&subject, &session.id).await.unwrap();
	assert_eq!(late.recv().await, None);
}

#[tokio::test]
async fn replay_streams_records_from_requested_seq() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();
	for confidence in [0.1, 0.2, 0.3] {
		registry
			.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Alert, confidence, 5.0))
			.await
			.unwrap();
	}

	let records: Vec<_> = registry
		.replay(&subject, &session.id, 3)
		.await
		.unwrap()
		.try_collect()
		.await
		.unwrap();
	assert_eq!(records.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![3, 4]);
	assert!(registry.replay(&driver("driver-2"), &session.id, 1).await.is_err());
}

#[tokio::test]
async fn recovery_from_sqlite_is_bit_identical() {
	let dir = tempfile::tempdir().unwrap();
	let url = format!("sqlite:{}", dir.path().join("wakesafe.db").display());
	let pool = create_pool(&url).await.unwrap();
	run_migrations(&pool).await.unwrap();

	let build = || {
		SessionRegistry::new(
			Arc::new(SqliteEventLog::new(pool.clone())),
			Arc::new(SqliteSessionStore::new(pool.clone())),
			Arc::new(SessionsBroadcaster::with_defaults()),
		)
	};

	let subject = driver("driver-1");
	let other = driver("driver-2");
	let registry = build();

	let open = registry.start(&subject, SessionConfig::default(), None).await.unwrap();
	for (i, confidence) in [0.13, 0.57, 0.91, 0.33].into_iter().enumerate() {
		let class = if i % 2 == 0 { Classification::Drowsy } else { Classification::Alert };
		registry
			.ingest(&subject, &open.id, EventSource::AiServer, ai(class, confidence, 97.3 + i as f64))
			.await
			.unwrap();
	}
	registry
		.record_notification(
			&subject,
			&open.id,
			UploadNotification {
				photo_id: "p1".to_string(),
				success: true,
				duration_ms: 312.7,
				file_size_bytes: 48_211,
			},
		)
		.await
		.unwrap();
	registry.pause(&subject, &open.id).await.unwrap();
	let open = registry.get(&subject, &open.id).await.unwrap();

	let closed = registry.start(&other, SessionConfig::default(), None).await.unwrap();
	let closed = registry.end(&other, &closed.id, None).await.unwrap();

	let recovered = build();
	assert_eq!(recovered.recover().await.unwrap(), 2);
	assert_eq!(recovered.get(&subject, &open.id).await.unwrap(), open);
	assert_eq!(recovered.get(&other, &closed.id).await.unwrap(), closed);
	assert_eq!(recovered.rebuild(&open.id).await.unwrap(), open);

	let err = recovered.start(&subject, SessionConfig::default(), None).await.unwrap_err();
	assert!(matches!(core(&err), SessionsError::Conflict { .. }));
	assert!(recovered.start(&other, SessionConfig::default(), None).await.is_ok());

	let paused = recovered.sessions_in_state(SessionState::Paused, 10).await.unwrap();
	assert_eq!(paused, vec![open]);
}

/// Snapshot store that stalls before writing terminal snapshots.
struct SlowTerminalStore {
	inner: SqliteSessionStore,
	delay: Duration,
}

#[async_trait]
impl SessionStore for SlowTerminalStore {
	async fn upsert(&self, session: &Session) -> wakesafe_server_sessions::Result<()> {
		if session.state.is_terminal() {
			tokio::time::sleep(self.delay).await;
		}
		self.inner.upsert(session).await
	}

	async fn get(&self, id: &SessionId) -> wakesafe_server_sessions::Result<Option<Session>> {
		self.inner.get(id).await
	}

	async fn list_by_state(
		&self,
		state: SessionState,
		limit: u32,
	) -> wakesafe_server_sessions::Result<Vec<Session>> {
		self.inner.list_by_state(state, limit).await
	}

	async fn find_open_for_subject(
		&self,
		subject_id: &SubjectId,
	) -> wakesafe_server_sessions::Result<Option<Session>> {
		self.inner.find_open_for_subject(subject_id).await
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_during_slow_end_keeps_both_snapshots() {
	let dir = tempfile::tempdir().unwrap();
	let url = format!("sqlite:{}", dir.path().join("wakesafe.db").display());
	let pool = create_pool(&url).await.unwrap();
	run_migrations(&pool).await.unwrap();

	let store = Arc::new(SlowTerminalStore {
		inner: SqliteSessionStore::new(pool.clone()),
		delay: Duration::from_millis(200),
	});
	let registry = Arc::new(SessionRegistry::new(
		Arc::new(SqliteEventLog::new(pool.clone())),
		store.clone(),
		Arc::new(SessionsBroadcaster::with_defaults()),
	));
	let subject = driver("driver-1");
	let first = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	let ending = {
		let registry = Arc::clone(&registry);
		let subject = subject.clone();
		let id = first.id.clone();
		tokio::spawn(async move { registry.end(&subject, &id, None).await })
	};
	tokio::time::sleep(Duration::from_millis(50)).await;

	let second = timeout(Duration::from_secs(5), async {
		loop {
			match registry.start(&subject, SessionConfig::default(), None).await {
				Ok(session) => break session,
				Err(e) if matches!(core(&e), SessionsError::Conflict { .. }) => {
					tokio::time::sleep(Duration::from_millis(10)).await;
				}
				Err(e) => panic!("unexpected error {e}"),
			}
		}
	})
	.await
	.unwrap();
	ending.await.unwrap().unwrap();

	let stored_first = store.get(&first.id).await.unwrap().unwrap();
	assert_eq!(stored_first.state, SessionState::Ended);
	assert_eq!(store.get(&second.id).await.unwrap(), Some(second.clone()));
	assert_eq!(
		registry.sessions_in_state(SessionState::Active, 10).await.unwrap(),
		vec![second]
	);
}

#[tokio::test]
async fn finished_sessions_leave_memory_but_stay_readable() {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	assert!(registry.open_session_for(&driver("nobody")).await.unwrap().is_none());
	assert_eq!(registry.tracked_subjects(), 0);

	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();
	registry
		.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Alert, 0.8, 10.0))
		.await
		.unwrap();
	assert_eq!(registry.live_count().await, 1);
	assert_eq!(registry.tracked_subjects(), 1);

	let ended = registry.end(&subject, &session.id, None).await.unwrap();
	assert_eq!(registry.live_count().await, 0);
	assert_eq!(registry.tracked_subjects(), 0);

	assert_eq!(registry.get(&subject, &session.id).await.unwrap(), ended);
	let foreign = registry.get(&driver("driver-2"), &session.id).await.unwrap_err();
	assert!(matches!(core(&foreign), SessionsError::NotFound(_)));

	let records: Vec<_> = registry
		.replay(&subject, &session.id, 1)
		.await
		.unwrap()
		.try_collect()
		.await
		.unwrap();
	assert_eq!(records.len(), 3);

	let mut subscription = registry.subscribe(&subject, &session.id).await.unwrap();
	assert_eq!(subscription.recv().await, None);

	let err = registry
		.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Alert, 0.8, 10.0))
		.await
		.unwrap_err();
	assert!(matches!(core(&err), SessionsError::NotActive { state: SessionState::Ended, .. }));
	assert!(matches!(
		core(&registry.resume(&subject, &session.id).await.unwrap_err()),
		SessionsError::InvalidState { operation: "resume", .. }
	));

	// A conflicting start keeps the subject's slot.
	let next = registry.start(&subject, SessionConfig::default(), None).await.unwrap();
	assert!(registry.start(&subject, SessionConfig::default(), None).await.is_err());
	assert_eq!(registry.tracked_subjects(), 1);
	registry.fail(&subject, &next.id, "camera", "lost").await.unwrap();
	assert_eq!(registry.live_count().await, 0);
	assert_eq!(registry.tracked_subjects(), 0);
}

#[tokio::test]
async fn recovery_skips_sessions_that_do_not_fold() {
	let log = Arc::new(InMemoryEventLog::new());
	let registry = SessionRegistry::new(
		log.clone(),
		Arc::new(InMemorySessionStore::new()),
		Arc::new(SessionsBroadcaster::with_defaults()),
	);
	let subject = driver("driver-1");
	let good = registry.start(&subject, SessionConfig::default(), None).await.unwrap();

	// A log that opens with an AI result instead of session.started.
	let broken = SessionId::new();
	log.append(&broken, Utc::now(), EventSource::AiServer, ai(Classification::Alert, 0.5, 1.0))
		.await
		.unwrap();

	let recovered = SessionRegistry::new(
		log,
		Arc::new(InMemorySessionStore::new()),
		Arc::new(SessionsBroadcaster::with_defaults()),
	);
	assert_eq!(recovered.recover().await.unwrap(), 1);
	assert_eq!(recovered.get(&subject, &good.id).await.unwrap(), good);
	assert_eq!(recovered.live_count().await, 1);
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(32))]

	#[test]
	fn ingestion_order_does_not_change_means(mut confidences in prop::collection::vec(0.0f64..=1.0, 1..12)) {
		let runtime = tokio::runtime::Runtime::new().unwrap();
		let expected = confidences.iter().sum::<f64>() / confidences.len() as f64;

		let forward = runtime.block_on(ingest_all(&confidences));
		confidences.reverse();
		let reversed = runtime.block_on(ingest_all(&confidences));

		prop_assert!((forward - expected).abs() < 1e-9);
		prop_assert!((reversed - expected).abs() < 1e-9);
	}
}

async fn ingest_all(confidences: &[f64]) -> f64 {
	let registry = in_memory_registry();
	let subject = driver("driver-1");
	let session = registry.start(&subject, SessionConfig::default(), None).await.unwrap();
	let mut latest = session.clone();
	for &confidence in confidences {
		latest = registry
			.ingest(&subject, &session.id, EventSource::AiServer, ai(Classification::Unknown, confidence, 1.0))
			.await
			.unwrap();
	}
	latest.stats.ai.avg_confidence
}
