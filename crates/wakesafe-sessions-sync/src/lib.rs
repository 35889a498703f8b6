// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side sync for WakeSafe sessions.
//!
//! [`ClientSyncAgent`] keeps a local [`Session`](wakesafe_sessions_core::Session)
//! in step with the server over a [`SyncTransport`], reconnecting with
//! bounded exponential backoff and replaying whatever it missed.

pub mod agent;
pub mod backoff;
pub mod config;
pub mod error;
pub mod transport;

pub use agent::{ClientSyncAgent, DisconnectHandle, SessionView, SyncState, SyncUpdate};
pub use backoff::calculate_delay;
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use transport::{DeltaStream, LocalTransport, SyncTransport};
