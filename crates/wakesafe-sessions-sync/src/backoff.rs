// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exponential backoff with optional jitter.

use std::time::Duration;

use crate::config::SyncConfig;

/// Delay to wait after failed attempt number `attempt` (zero based).
pub fn calculate_delay(cfg: &SyncConfig, attempt: u32) -> Duration {
	let exponential_delay =
		cfg.initial_delay.as_secs_f64() * cfg.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
	let capped_delay = exponential_delay.min(cfg.max_delay.as_secs_f64());

	let final_delay = if cfg.jitter {
		let jitter_factor = 0.5 + fastrand::f64();
		(capped_delay * jitter_factor).min(cfg.max_delay.as_secs_f64())
	} else {
		capped_delay
	};

	Duration::from_secs_f64(final_delay.max(0.0))
}
