// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client sync agent.
//!
//! The agent keeps a local copy of one session by folding the same records
//! the server committed. On every (re)connect it first subscribes to live
//! deltas, then replays everything after its last applied sequence number,
//! and from then on applies live deltas, skipping any it has already seen.
//! Because subscription comes before replay, no record can fall between the
//! two.
//!
//! ```text
//!   disconnected ──connect()──> connecting ──ok──> connected
//!        ^                          │  ^               │
//!        │                    fail  │  │ backoff       │ stream lost / behind
//!        └──── attempts used ───────┘  └───────────────┤
//!                                                      v
//!                                                  resyncing ──replayed──> connected
//! ```

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wakesafe_server_sessions::SubscriptionEvent;
use wakesafe_sessions_core::{EventRecord, Session, SessionDelta, SessionId, SessionsError};

use crate::backoff::calculate_delay;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::transport::{DeltaStream, SyncTransport};

/// Connection state of a [`ClientSyncAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
	Disconnected,
	Connecting,
	Connected,
	Resyncing,
}

impl fmt::Display for SyncState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncState::Disconnected => write!(f, "disconnected"),
			SyncState::Connecting => write!(f, "connecting"),
			SyncState::Connected => write!(f, "connected"),
			SyncState::Resyncing => write!(f, "resyncing"),
		}
	}
}

/// What [`ClientSyncAgent::next_update`] applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
	/// A live delta.
	Delta(SessionDelta),
	/// Missed records were replayed starting at `from_seq`.
	Resynced { from_seq: u64, applied: usize },
}

/// Local fold of a session's records.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
	session: Option<Session>,
}

impl SessionView {
	pub fn session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	pub fn last_applied_seq(&self) -> u64 {
		self.session.as_ref().map_or(0, |s| s.last_seq)
	}

	pub fn is_terminal(&self) -> bool {
		self
			.session
			.as_ref()
			.is_some_and(|s| s.state.is_terminal())
	}

	/// Applies `record` if it is the next one. Returns `false` for a record
	/// that was already applied.
	pub fn apply(&mut self, record: &EventRecord) -> std::result::Result<bool, SessionsError> {
		let last = self.last_applied_seq();
		if record.seq <= last {
			return Ok(false);
		}
		if record.seq != last + 1 {
			return Err(SessionsError::SequenceGap {
				expected: last + 1,
				actual: record.seq,
			});
		}
		match self.session.as_mut() {
			Some(session) => session.apply(record)?,
			None => self.session = Some(Session::from_started(record)?),
		}
		Ok(true)
	}
}

/// Cancels whatever the agent is waiting on, from another task.
#[derive(Clone)]
pub struct DisconnectHandle {
	cancel: Arc<StdMutex<CancellationToken>>,
	state: Arc<watch::Sender<SyncState>>,
}

impl DisconnectHandle {
	pub fn disconnect(&self) {
		self.cancel.lock().unwrap_or_else(|e| e.into_inner()).cancel();
		self.state.send_replace(SyncState::Disconnected);
	}
}

/// Keeps a live local view of one session.
pub struct ClientSyncAgent {
	transport: Arc<dyn SyncTransport>,
	session_id: SessionId,
	config: SyncConfig,
	state: Arc<watch::Sender<SyncState>>,
	cancel: Arc<StdMutex<CancellationToken>>,
	stream: Option<DeltaStream>,
	view: SessionView,
	was_connected: bool,
	resyncs: u64,
}

impl ClientSyncAgent {
	pub fn new(transport: Arc<dyn SyncTransport>, session_id: SessionId, config: SyncConfig) -> Self {
		let (state, _) = watch::channel(SyncState::Disconnected);
		Self {
			transport,
			session_id,
			config,
			state: Arc::new(state),
			cancel: Arc::new(StdMutex::new(CancellationToken::new())),
			stream: None,
			view: SessionView::default(),
			was_connected: false,
			resyncs: 0,
		}
	}

	pub fn session_id(&self) -> &SessionId {
		&self.session_id
	}

	pub fn state(&self) -> SyncState {
		*self.state.borrow()
	}

	pub fn watch_state(&self) -> watch::Receiver<SyncState> {
		self.state.subscribe()
	}

	pub fn session(&self) -> Option<&Session> {
		self.view.session()
	}

	pub fn last_applied_seq(&self) -> u64 {
		self.view.last_applied_seq()
	}

	/// Number of times the agent replayed after a reconnect or a lag.
	pub fn resync_count(&self) -> u64 {
		self.resyncs
	}

	pub fn disconnect_handle(&self) -> DisconnectHandle {
		DisconnectHandle {
			cancel: Arc::clone(&self.cancel),
			state: Arc::clone(&self.state),
		}
	}

	/// Drops the connection and aborts any pending wait. Applied state is
	/// kept. Safe to call in any state, any number of times.
	pub fn disconnect(&mut self) {
		self.disconnect_handle().disconnect();
		self.stream = None;
	}

	fn set_state(&self, state: SyncState) {
		let previous = self.state.send_replace(state);
		if previous != state {
			debug!(session_id = %self.session_id, from = %previous, to = %state, "Sync state changed");
		}
	}

	fn token(&self, reset: bool) -> CancellationToken {
		let mut token = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
		if reset && token.is_cancelled() {
			*token = CancellationToken::new();
		}
		token.clone()
	}

	fn cancelled(&mut self) -> SyncError {
		self.stream = None;
		self.set_state(SyncState::Disconnected);
		info!(session_id = %self.session_id, "Sync cancelled");
		SyncError::Cancelled
	}

	/// Connects and catches up, retrying with backoff.
	///
	/// Fails with [`SyncError::ConnectionFailed`] once `max_attempts` are
	/// used, or [`SyncError::Cancelled`] if disconnected meanwhile.
	pub async fn connect(&mut self) -> Result<()> {
		let cancel = self.token(true);
		let max_attempts = self.config.max_attempts.max(1);
		self.stream = None;
		let mut last_error = String::new();

		for attempt in 1..=max_attempts {
			self.set_state(SyncState::Connecting);

			let transport = Arc::clone(&self.transport);
			let session_id = self.session_id.clone();
			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(self.cancelled()),
				outcome = transport.connect(&session_id) => outcome,
			};

			let result = match outcome {
				Ok(stream) => {
					self.stream = Some(stream);
					if self.was_connected {
						self.set_state(SyncState::Resyncing);
						self.resyncs += 1;
					}
					self.catch_up(&cancel).await.map(|_| ())
				}
				Err(e) => Err(e),
			};

			match result {
				Ok(()) if cancel.is_cancelled() => return Err(self.cancelled()),
				Ok(()) => {
					self.was_connected = true;
					self.set_state(SyncState::Connected);
					info!(
						session_id = %self.session_id,
						attempt,
						last_seq = self.last_applied_seq(),
						"Sync connected"
					);
					return Ok(());
				}
				Err(SyncError::Cancelled) => return Err(self.cancelled()),
				Err(e) => {
					self.stream = None;
					warn!(
						session_id = %self.session_id,
						error = %e,
						attempt,
						max_attempts,
						"Sync connection attempt failed"
					);
					last_error = e.to_string();
				}
			}

			if attempt < max_attempts {
				self.set_state(SyncState::Connecting);
				let delay = calculate_delay(&self.config, attempt - 1);
				debug!(session_id = %self.session_id, delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
				tokio::select! {
					biased;
					_ = cancel.cancelled() => return Err(self.cancelled()),
					_ = tokio::time::sleep(delay) => {}
				}
			}
		}

		self.set_state(SyncState::Disconnected);
		warn!(session_id = %self.session_id, attempts = max_attempts, "Sync gave up connecting");
		Err(SyncError::ConnectionFailed {
			attempts: max_attempts,
			last_error,
		})
	}

	/// Replays records after the last applied one.
	async fn catch_up(&mut self, cancel: &CancellationToken) -> Result<usize> {
		let from_seq = self.view.last_applied_seq() + 1;
		let transport = Arc::clone(&self.transport);
		let session_id = self.session_id.clone();

		let records = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(SyncError::Cancelled),
			records = transport.replay(&session_id, from_seq) => records?,
		};

		let mut applied = 0;
		for record in &records {
			if self.view.apply(record)? {
				applied += 1;
			}
		}
		debug!(session_id = %self.session_id, from_seq, applied, "Replayed missed records");
		Ok(applied)
	}

	async fn resync(&mut self, cancel: &CancellationToken) -> Result<Option<SyncUpdate>> {
		self.set_state(SyncState::Resyncing);
		self.resyncs += 1;
		let from_seq = self.view.last_applied_seq() + 1;

		match self.catch_up(cancel).await {
			Ok(_) if cancel.is_cancelled() => {
				self.cancelled();
				Ok(None)
			}
			Ok(applied) => {
				self.set_state(SyncState::Connected);
				Ok(Some(SyncUpdate::Resynced { from_seq, applied }))
			}
			Err(SyncError::Cancelled) => {
				self.cancelled();
				Ok(None)
			}
			Err(e) => Err(e),
		}
	}

	/// Waits for and applies the next update.
	///
	/// Returns `Ok(None)` once the session is over or the agent was
	/// disconnected. A dropped connection is re-established transparently.
	pub async fn next_update(&mut self) -> Result<Option<SyncUpdate>> {
		loop {
			let cancel = self.token(false);
			if cancel.is_cancelled() {
				self.stream = None;
				self.set_state(SyncState::Disconnected);
				return Ok(None);
			}
			let Some(mut stream) = self.stream.take() else {
				return Err(SyncError::NotConnected);
			};

			let item = tokio::select! {
				biased;
				_ = cancel.cancelled() => None,
				item = stream.next() => Some(item),
			};
			let Some(item) = item else {
				self.cancelled();
				return Ok(None);
			};

			match item {
				Some(SubscriptionEvent::Delta(delta)) => {
					self.stream = Some(stream);
					match self.view.apply(&delta.record) {
						Ok(true) => return Ok(Some(SyncUpdate::Delta(delta))),
						Ok(false) => {
							debug!(session_id = %self.session_id, seq = delta.seq, "Skipping duplicate delta");
						}
						Err(SessionsError::SequenceGap { expected, actual }) => {
							warn!(session_id = %self.session_id, expected, actual, "Gap in live deltas");
							return self.resync(&cancel).await;
						}
						Err(e) => return Err(e.into()),
					}
				}
				Some(SubscriptionEvent::Behind { skipped }) => {
					self.stream = Some(stream);
					warn!(session_id = %self.session_id, skipped, "Fell behind live deltas");
					return self.resync(&cancel).await;
				}
				None => {
					drop(stream);
					if self.view.is_terminal() {
						self.set_state(SyncState::Disconnected);
						info!(session_id = %self.session_id, "Session over, sync finished");
						return Ok(None);
					}
					info!(session_id = %self.session_id, "Delta stream ended, reconnecting");
					self.connect().await?;
				}
			}
		}
	}
}
