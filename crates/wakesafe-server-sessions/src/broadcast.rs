// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Realtime fanout of committed session deltas.
//!
//! # Architecture
//!
//! Each session has its own bounded broadcast channel, created on first
//! subscribe:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SessionsBroadcaster                      │
//! │   channels: HashMap<SessionId, broadcast::Sender<Delta>>     │
//! │                                                              │
//! │   registry commit ──────────> publish(delta) ──> session     │
//! └──────────────────────────────────────────────────────────────┘
//!                                      │
//!                                      ▼
//!        ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!        │ session A    │  │ session B    │  │ session C    │ ...
//!        │ Sender+Rcvrs │  │ Sender+Rcvrs │  │ Sender+Rcvrs │
//!        └──────────────┘  └──────────────┘  └──────────────┘
//! ```
//!
//! Publishing never waits on a consumer. A subscriber that falls more than
//! `channel_capacity` deltas behind loses the oldest ones and is told how
//! many it skipped; it is expected to catch up through the event log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use wakesafe_sessions_core::{SessionDelta, SessionId};

use crate::error::{Result, SessionsServerError};

/// Default channel capacity per session.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Default maximum subscribers per session.
pub const DEFAULT_MAX_SUBSCRIBERS_PER_SESSION: usize = 64;

/// Configuration for the sessions broadcaster.
#[derive(Debug, Clone)]
pub struct SessionsBroadcasterConfig {
	/// Capacity of each broadcast channel.
	pub channel_capacity: usize,
	/// Maximum concurrent subscribers per session.
	pub max_subscribers_per_session: usize,
}

impl Default for SessionsBroadcasterConfig {
	fn default() -> Self {
		Self {
			channel_capacity: DEFAULT_CHANNEL_CAPACITY,
			max_subscribers_per_session: DEFAULT_MAX_SUBSCRIBERS_PER_SESSION,
		}
	}
}

/// Statistics for a broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
	pub receiver_count: usize,
	pub events_sent: u64,
	pub created_at: DateTime<Utc>,
}

struct ChannelState {
	sender: broadcast::Sender<SessionDelta>,
	events_sent: AtomicU64,
	created_at: DateTime<Utc>,
}

/// What a subscriber observes next.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
	Delta(SessionDelta),
	/// `skipped` deltas were dropped because this subscriber fell behind.
	Behind { skipped: u64 },
}

/// A subscription to one session's deltas.
pub struct SessionSubscription {
	session_id: SessionId,
	receiver: broadcast::Receiver<SessionDelta>,
	behind: bool,
}

impl SessionSubscription {
	/// A subscription that yields nothing, for sessions that are already over.
	pub fn closed(session_id: SessionId) -> Self {
		let (_, receiver) = broadcast::channel(1);
		Self {
			session_id,
			receiver,
			behind: false,
		}
	}

	pub fn session_id(&self) -> &SessionId {
		&self.session_id
	}

	/// Waits for the next delta. Returns `None` once the channel is closed
	/// and drained.
	pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
		match self.receiver.recv().await {
			Ok(delta) => Some(SubscriptionEvent::Delta(delta)),
			Err(RecvError::Lagged(skipped)) => {
				self.behind = true;
				debug!(session_id = %self.session_id, skipped, "Subscriber fell behind");
				Some(SubscriptionEvent::Behind { skipped })
			}
			Err(RecvError::Closed) => None,
		}
	}

	/// Whether deltas were dropped since the last [`Self::mark_caught_up`].
	pub fn is_behind(&self) -> bool {
		self.behind
	}

	pub fn mark_caught_up(&mut self) {
		self.behind = false;
	}
}

/// Broadcasts committed deltas to the subscribers of each session.
pub struct SessionsBroadcaster {
	config: SessionsBroadcasterConfig,
	channels: RwLock<HashMap<SessionId, ChannelState>>,
	total_events: AtomicU64,
	total_connections: AtomicU64,
}

impl SessionsBroadcaster {
	/// A `channel_capacity` of zero is raised to one.
	pub fn new(mut config: SessionsBroadcasterConfig) -> Self {
		config.channel_capacity = config.channel_capacity.max(1);
		Self {
			config,
			channels: RwLock::new(HashMap::new()),
			total_events: AtomicU64::new(0),
			total_connections: AtomicU64::new(0),
		}
	}

	pub fn with_defaults() -> Self {
		Self::new(SessionsBroadcasterConfig::default())
	}

	/// Subscribe to deltas for one session.
	///
	/// Fails with [`SessionsServerError::SubscriberLimit`] once the session
	/// has `max_subscribers_per_session` live receivers.
	pub async fn subscribe(&self, session_id: &SessionId) -> Result<SessionSubscription> {
		{
			let channels = self.channels.read().await;
			if let Some(state) = channels.get(session_id) {
				let receiver = self.attach(session_id, state)?;
				return Ok(receiver);
			}
		}

		let mut channels = self.channels.write().await;
		let state = channels.entry(session_id.clone()).or_insert_with(|| {
			info!(session_id = %session_id, "Created broadcast channel for session");
			let (sender, _receiver) = broadcast::channel(self.config.channel_capacity);
			ChannelState {
				sender,
				events_sent: AtomicU64::new(0),
				created_at: Utc::now(),
			}
		});
		self.attach(session_id, state)
	}

	fn attach(&self, session_id: &SessionId, state: &ChannelState) -> Result<SessionSubscription> {
		let receiver_count = state.sender.receiver_count();
		if receiver_count >= self.config.max_subscribers_per_session {
			warn!(
				session_id = %session_id,
				receiver_count,
				"Subscriber limit reached"
			);
			return Err(SessionsServerError::SubscriberLimit {
				session_id: session_id.to_string(),
				limit: self.config.max_subscribers_per_session,
			});
		}

		self.total_connections.fetch_add(1, Ordering::Relaxed);
		debug!(
			session_id = %session_id,
			receiver_count = receiver_count + 1,
			"Client subscribed to session channel"
		);
		Ok(SessionSubscription {
			session_id: session_id.clone(),
			receiver: state.sender.subscribe(),
			behind: false,
		})
	}

	/// Publish a delta to the subscribers of its session.
	///
	/// Returns the number of receivers the delta was queued for.
	pub async fn publish(&self, delta: SessionDelta) -> usize {
		let channels = self.channels.read().await;

		let Some(state) = channels.get(&delta.session_id) else {
			debug!(session_id = %delta.session_id, seq = delta.seq, "No channel exists for session");
			return 0;
		};

		let session_id = delta.session_id.clone();
		let seq = delta.seq;
		let kind = delta.update.kind();
		match state.sender.send(delta) {
			Ok(count) => {
				state.events_sent.fetch_add(1, Ordering::Relaxed);
				self.total_events.fetch_add(1, Ordering::Relaxed);
				debug!(
					session_id = %session_id,
					seq,
					kind,
					receiver_count = count,
					"Published session delta"
				);
				count
			}
			Err(_) => {
				debug!(session_id = %session_id, seq, kind, "No receivers for session delta");
				0
			}
		}
	}

	/// Drop the channel for a session. Subscribers drain what was already
	/// queued and then see the end of the stream.
	pub async fn close_session(&self, session_id: &SessionId) -> bool {
		let removed = self.channels.write().await.remove(session_id).is_some();
		if removed {
			debug!(session_id = %session_id, "Closed session broadcast channel");
		}
		removed
	}

	pub async fn channel_stats(&self, session_id: &SessionId) -> Option<ChannelStats> {
		let channels = self.channels.read().await;

		channels.get(session_id).map(|state| ChannelStats {
			receiver_count: state.sender.receiver_count(),
			events_sent: state.events_sent.load(Ordering::Relaxed),
			created_at: state.created_at,
		})
	}

	pub async fn channel_count(&self) -> usize {
		self.channels.read().await.len()
	}

	pub async fn total_receiver_count(&self) -> usize {
		let channels = self.channels.read().await;
		channels.values().map(|s| s.sender.receiver_count()).sum()
	}

	pub fn total_events_sent(&self) -> u64 {
		self.total_events.load(Ordering::Relaxed)
	}

	pub fn total_connections(&self) -> u64 {
		self.total_connections.load(Ordering::Relaxed)
	}

	/// Clean up channels with no active receivers.
	pub async fn cleanup_empty_channels(&self) -> usize {
		let mut channels = self.channels.write().await;
		let initial_count = channels.len();

		channels.retain(|session_id, state| {
			let keep = state.sender.receiver_count() > 0;
			if !keep {
				debug!(session_id = %session_id, "Removing empty session broadcast channel");
			}
			keep
		});

		let removed = initial_count - channels.len();
		if removed > 0 {
			info!(removed_channels = removed, "Cleaned up empty session broadcast channels");
		}
		removed
	}

	pub async fn stats(&self) -> BroadcasterStats {
		BroadcasterStats {
			channel_count: self.channel_count().await,
			total_receivers: self.total_receiver_count().await,
			total_events_sent: self.total_events_sent(),
			total_connections: self.total_connections(),
		}
	}
}

/// Global broadcaster stats for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcasterStats {
	pub channel_count: usize,
	pub total_receivers: usize,
	pub total_events_sent: u64,
	pub total_connections: u64,
}
