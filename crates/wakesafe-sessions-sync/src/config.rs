// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Reconnect policy for the sync agent.
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// Delay before the second attempt.
	pub initial_delay: Duration,
	/// Upper bound for any single delay.
	pub max_delay: Duration,
	/// Attempts per `connect` call, including the first.
	pub max_attempts: u32,
	pub multiplier: f64,
	/// Scale each delay by a random factor in [0.5, 1.5).
	pub jitter: bool,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			initial_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(30),
			max_attempts: 10,
			multiplier: 2.0,
			jitter: true,
		}
	}
}
