// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Realtime broadcaster configuration section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BroadcastConfigLayer {
	pub channel_capacity: Option<usize>,
	pub max_subscribers_per_session: Option<usize>,
}

impl BroadcastConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
		if other.max_subscribers_per_session.is_some() {
			self.max_subscribers_per_session = other.max_subscribers_per_session;
		}
	}

	pub fn finalize(self) -> BroadcastConfig {
		let defaults = BroadcastConfig::default();
		BroadcastConfig {
			channel_capacity: self.channel_capacity.unwrap_or(defaults.channel_capacity),
			max_subscribers_per_session: self
				.max_subscribers_per_session
				.unwrap_or(defaults.max_subscribers_per_session),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcastConfig {
	/// Deltas buffered per session before slow subscribers are marked behind
	pub channel_capacity: usize,
	pub max_subscribers_per_session: usize,
}

impl Default for BroadcastConfig {
	fn default() -> Self {
		Self {
			channel_capacity: 256,
			max_subscribers_per_session: 64,
		}
	}
}
