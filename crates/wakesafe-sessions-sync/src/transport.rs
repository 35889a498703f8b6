// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Connection between a sync agent and the session registry.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use wakesafe_server_sessions::{SessionRegistry, SubscriptionEvent};
use wakesafe_sessions_core::{EventRecord, SessionId, SubjectId};

use crate::error::Result;

/// Live deltas for one session. The stream ends when the connection drops
/// or the session is over.
pub type DeltaStream = BoxStream<'static, SubscriptionEvent>;

#[async_trait]
pub trait SyncTransport: Send + Sync {
	/// Opens the live delta stream for `session_id`.
	async fn connect(&self, session_id: &SessionId) -> Result<DeltaStream>;

	/// Fetches the committed records with `seq >= from_seq`.
	async fn replay(&self, session_id: &SessionId, from_seq: u64) -> Result<Vec<EventRecord>>;
}

/// In-process transport backed by a [`SessionRegistry`], acting as one
/// subject.
#[derive(Clone)]
pub struct LocalTransport {
	registry: Arc<SessionRegistry>,
	caller: SubjectId,
}

impl LocalTransport {
	pub fn new(registry: Arc<SessionRegistry>, caller: SubjectId) -> Self {
		Self { registry, caller }
	}
}

#[async_trait]
impl SyncTransport for LocalTransport {
	async fn connect(&self, session_id: &SessionId) -> Result<DeltaStream> {
		let subscription = self.registry.subscribe(&self.caller, session_id).await?;
		Ok(stream::unfold(subscription, |mut subscription| async move {
			let event = subscription.recv().await?;
			Some((event, subscription))
		})
		.boxed())
	}

	async fn replay(&self, session_id: &SessionId, from_seq: u64) -> Result<Vec<EventRecord>> {
		let records: Vec<EventRecord> = self
			.registry
			.replay(&self.caller, session_id, from_seq)
			.await?
			.try_collect()
			.await?;
		Ok(records)
	}
}
