// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server side of WakeSafe session tracking.
//!
//! - [`EventLog`]: append-only per-session record log (SQLite or memory)
//! - [`SessionStore`]: snapshot projection for queries
//! - [`SessionsBroadcaster`]: per-session realtime fanout
//! - [`SessionRegistry`]: lifecycle, ingestion and recovery

pub mod broadcast;
pub mod db;
pub mod error;
pub mod event_log;
pub mod registry;
pub mod store;

pub use broadcast::{
	BroadcasterStats, ChannelStats, SessionSubscription, SessionsBroadcaster,
	SessionsBroadcasterConfig, SubscriptionEvent,
};
pub use db::{create_pool, run_migrations};
pub use error::{Result, SessionsServerError};
pub use event_log::{EventLog, InMemoryEventLog, SqliteEventLog};
pub use registry::SessionRegistry;
pub use store::{InMemorySessionStore, SessionStore, SqliteSessionStore};
