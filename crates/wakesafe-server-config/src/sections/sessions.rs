// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Defaults applied to newly started sessions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionsConfigLayer {
	pub capture_interval_ms: Option<u64>,
	pub batch_size: Option<u32>,
	pub ai_processing: Option<bool>,
	pub location_tracking: Option<bool>,
	pub realtime_updates: Option<bool>,
}

impl SessionsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.capture_interval_ms.is_some() {
			self.capture_interval_ms = other.capture_interval_ms;
		}
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
		if other.ai_processing.is_some() {
			self.ai_processing = other.ai_processing;
		}
		if other.location_tracking.is_some() {
			self.location_tracking = other.location_tracking;
		}
		if other.realtime_updates.is_some() {
			self.realtime_updates = other.realtime_updates;
		}
	}

	pub fn finalize(self) -> SessionsConfig {
		let defaults = SessionsConfig::default();
		SessionsConfig {
			capture_interval_ms: self.capture_interval_ms.unwrap_or(defaults.capture_interval_ms),
			batch_size: self.batch_size.unwrap_or(defaults.batch_size),
			ai_processing: self.ai_processing.unwrap_or(defaults.ai_processing),
			location_tracking: self.location_tracking.unwrap_or(defaults.location_tracking),
			realtime_updates: self.realtime_updates.unwrap_or(defaults.realtime_updates),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionsConfig {
	pub capture_interval_ms: u64,
	pub batch_size: u32,
	pub ai_processing: bool,
	pub location_tracking: bool,
	pub realtime_updates: bool,
}

impl Default for SessionsConfig {
	fn default() -> Self {
		Self {
			capture_interval_ms: 5_000,
			batch_size: 10,
			ai_processing: true,
			location_tracking: true,
			realtime_updates: true,
		}
	}
}
