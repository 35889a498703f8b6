// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconnect policy handed to sync agents.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncSettingsLayer {
	pub initial_delay_ms: Option<u64>,
	pub max_delay_ms: Option<u64>,
	pub max_attempts: Option<u32>,
	pub multiplier: Option<f64>,
	pub jitter: Option<bool>,
}

impl SyncSettingsLayer {
	pub fn merge(&mut self, other: Self) {
		if other.initial_delay_ms.is_some() {
			self.initial_delay_ms = other.initial_delay_ms;
		}
		if other.max_delay_ms.is_some() {
			self.max_delay_ms = other.max_delay_ms;
		}
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
		if other.multiplier.is_some() {
			self.multiplier = other.multiplier;
		}
		if other.jitter.is_some() {
			self.jitter = other.jitter;
		}
	}

	pub fn finalize(self) -> SyncSettings {
		let defaults = SyncSettings::default();
		SyncSettings {
			initial_delay_ms: self.initial_delay_ms.unwrap_or(defaults.initial_delay_ms),
			max_delay_ms: self.max_delay_ms.unwrap_or(defaults.max_delay_ms),
			max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
			multiplier: self.multiplier.unwrap_or(defaults.multiplier),
			jitter: self.jitter.unwrap_or(defaults.jitter),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
	pub initial_delay_ms: u64,
	pub max_delay_ms: u64,
	pub max_attempts: u32,
	pub multiplier: f64,
	pub jitter: bool,
}

impl SyncSettings {
	pub fn initial_delay(&self) -> Duration {
		Duration::from_millis(self.initial_delay_ms)
	}

	pub fn max_delay(&self) -> Duration {
		Duration::from_millis(self.max_delay_ms)
	}
}

impl Default for SyncSettings {
	fn default() -> Self {
		Self {
			initial_delay_ms: 500,
			max_delay_ms: 30_000,
			max_attempts: 10,
			multiplier: 2.0,
			jitter: true,
		}
	}
}
