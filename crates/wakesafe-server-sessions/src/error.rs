// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sessions server.

use thiserror::Error;

/// Errors that can occur in the sessions server.
#[derive(Debug, Error)]
pub enum SessionsServerError {
	/// Database error
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	/// Invalid persisted data
	#[error("invalid session data: {0}")]
	InvalidData(String),

	/// JSON serialization error
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	/// Domain error (conflict, invalid state, validation, not found)
	#[error(transparent)]
	Core(#[from] wakesafe_sessions_core::SessionsError),

	/// Too many subscribers attached to one session
	#[error("subscriber limit of {limit} reached for session {session_id}")]
	SubscriberLimit { session_id: String, limit: usize },
}

impl SessionsServerError {
	/// The domain error, if this is one.
	pub fn as_core(&self) -> Option<&wakesafe_sessions_core::SessionsError> {
		match self {
			SessionsServerError::Core(err) => Some(err),
			_ => None,
		}
	}
}

/// Result type for sessions server operations.
pub type Result<T> = std::result::Result<T, SessionsServerError>;
