// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sessions system.

use thiserror::Error;

use crate::session::{SessionId, SessionState, SubjectId};

/// Errors that can occur in the sessions system.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionsError {
	/// The subject already owns an open (active or paused) session.
	#[error("subject {subject_id} already has an open session: {session_id}")]
	Conflict {
		subject_id: SubjectId,
		session_id: SessionId,
	},

	/// Lifecycle transition not allowed from the current state.
	#[error("cannot {operation} session {session_id} in state {state}")]
	InvalidState {
		session_id: SessionId,
		state: SessionState,
		operation: &'static str,
	},

	/// Ingestion attempted while the session is not active.
	#[error("session {session_id} is not active (state: {state})")]
	NotActive {
		session_id: SessionId,
		state: SessionState,
	},

	/// Malformed event payload
	#[error("validation failed: {0}")]
	Validation(String),

	/// Unknown session, or a session the caller does not own
	#[error("session not found: {0}")]
	NotFound(String),

	/// Record does not follow the last applied sequence number
	#[error("sequence gap: expected {expected}, got {actual}")]
	SequenceGap { expected: u64, actual: u64 },

	/// Invalid session state string
	#[error("invalid session state: {0}")]
	InvalidStateName(String),
}

/// Result type for core session operations.
pub type Result<T> = std::result::Result<T, SessionsError>;
