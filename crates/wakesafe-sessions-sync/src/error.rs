// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sync agent.

use thiserror::Error;

use wakesafe_server_sessions::SessionsServerError;
use wakesafe_sessions_core::SessionsError;

#[derive(Debug, Error)]
pub enum SyncError {
	/// Every connection attempt failed
	#[error("connection failed after {attempts} attempts: {last_error}")]
	ConnectionFailed { attempts: u32, last_error: String },

	/// `disconnect` aborted the operation
	#[error("sync cancelled")]
	Cancelled,

	#[error("not connected")]
	NotConnected,

	#[error("transport error: {0}")]
	Transport(String),

	#[error(transparent)]
	Server(#[from] SessionsServerError),

	/// A replayed or live record did not fold into the local view
	#[error(transparent)]
	Core(#[from] SessionsError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
