// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operator commands against the session database.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use wakesafe_server_config::ServerConfig;
use wakesafe_server_sessions::{
	create_pool, run_migrations, SessionRegistry, SessionStore, SessionsBroadcaster,
	SessionsBroadcasterConfig, SqliteEventLog, SqliteSessionStore,
};
use wakesafe_sessions_core::{FeatureToggles, Session, SessionConfig, SessionId, SessionState};
use wakesafe_sessions_sync::{calculate_delay, SyncConfig};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Handles to the SQLite-backed log and snapshot store.
pub struct Backend {
	pub registry: SessionRegistry,
	pub store: Arc<SqliteSessionStore>,
}

impl Backend {
	pub async fn open(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
		let pool = create_pool(&config.database.url).await?;
		run_migrations(&pool).await?;

		let store = Arc::new(SqliteSessionStore::new(pool.clone()));
		let broadcaster = Arc::new(SessionsBroadcaster::new(broadcaster_config(config)));
		let registry = SessionRegistry::new(
			Arc::new(SqliteEventLog::new(pool)),
			store.clone(),
			broadcaster,
		);
		Ok(Self { registry, store })
	}
}

pub fn broadcaster_config(config: &ServerConfig) -> SessionsBroadcasterConfig {
	SessionsBroadcasterConfig {
		channel_capacity: config.broadcast.channel_capacity,
		max_subscribers_per_session: config.broadcast.max_subscribers_per_session,
	}
}

/// Capture settings handed to sessions started without explicit ones.
pub fn session_config(config: &ServerConfig) -> SessionConfig {
	SessionConfig {
		capture_interval_ms: config.sessions.capture_interval_ms,
		batch_size: config.sessions.batch_size,
		features: FeatureToggles {
			ai_processing: config.sessions.ai_processing,
			location_tracking: config.sessions.location_tracking,
			realtime_updates: config.sessions.realtime_updates,
		},
	}
}

/// Reconnect policy for sync agents.
pub fn sync_config(config: &ServerConfig) -> SyncConfig {
	SyncConfig {
		initial_delay: config.sync.initial_delay(),
		max_delay: config.sync.max_delay(),
		max_attempts: config.sync.max_attempts,
		multiplier: config.sync.multiplier,
		jitter: config.sync.jitter,
	}
}

/// Nominal wait after each failed attempt, ignoring jitter.
pub fn reconnect_schedule(sync: &SyncConfig) -> Vec<Duration> {
	let nominal = SyncConfig {
		jitter: false,
		..sync.clone()
	};
	(0..sync.max_attempts.saturating_sub(1))
		.map(|attempt| calculate_delay(&nominal, attempt))
		.collect()
}

pub async fn migrate(config: &ServerConfig) -> CommandResult {
	let pool = create_pool(&config.database.url).await?;
	run_migrations(&pool).await?;
	tracing::info!(database = %config.database.url, "migrations applied");
	Ok(())
}

pub async fn list_sessions(
	backend: &Backend,
	state: SessionState,
	limit: u32,
	out: &mut impl Write,
) -> CommandResult {
	let sessions = backend.store.list_by_state(state, limit).await?;
	for session in &sessions {
		writeln!(out, "{}", session_line(session))?;
	}
	tracing::debug!(state = %state, count = sessions.len(), "listed sessions");
	Ok(())
}

fn session_line(session: &Session) -> String {
	format!(
		"{}\t{}\t{}\t{}\tseq={}\tai={}\tavg_confidence={:.3}",
		session.id,
		session.subject_id,
		session.state,
		session.started_at.to_rfc3339(),
		session.last_seq,
		session.stats.ai.total_processed,
		session.stats.ai.avg_confidence,
	)
}

pub async fn replay(backend: &Backend, id: &SessionId, out: &mut impl Write) -> CommandResult {
	let session = backend.registry.rebuild(id).await?;
	writeln!(out, "{}", serde_json::to_string_pretty(&session)?)?;
	Ok(())
}

/// Outcome of comparing a stored snapshot against a fresh fold of the log.
#[derive(Debug, PartialEq)]
pub enum Verification {
	Match { last_seq: u64 },
	MissingSnapshot,
	Mismatch { snapshot_seq: u64, log_seq: u64 },
}

pub async fn verify(backend: &Backend, id: &SessionId) -> Result<Verification, Box<dyn std::error::Error>> {
	let rebuilt = backend.registry.rebuild(id).await?;
	let verification = match backend.store.get(id).await? {
		None => Verification::MissingSnapshot,
		Some(snapshot) if snapshot == rebuilt => Verification::Match {
			last_seq: rebuilt.last_seq,
		},
		Some(snapshot) => Verification::Mismatch {
			snapshot_seq: snapshot.last_seq,
			log_seq: rebuilt.last_seq,
		},
	};

	match &verification {
		Verification::Match { last_seq } => {
			tracing::info!(session_id = %id, last_seq, "snapshot matches event log")
		}
		other => tracing::warn!(session_id = %id, result = ?other, "snapshot differs from event log"),
	}
	Ok(verification)
}

#[derive(Serialize)]
struct EffectiveConfig<'a> {
	#[serde(flatten)]
	server: &'a ServerConfig,
	session_defaults: SessionConfig,
	reconnect_schedule_ms: Vec<u64>,
}

pub fn print_config(config: &ServerConfig, out: &mut impl Write) -> CommandResult {
	let effective = EffectiveConfig {
		server: config,
		session_defaults: session_config(config),
		reconnect_schedule_ms: reconnect_schedule(&sync_config(config))
			.iter()
			.map(|delay| delay.as_millis() as u64)
			.collect(),
	};
	writeln!(out, "{}", serde_json::to_string_pretty(&effective)?)?;
	Ok(())
}
