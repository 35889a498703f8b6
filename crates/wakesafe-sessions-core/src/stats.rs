// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Running statistics folded from session events.
//!
//! Stats are never set directly. They only change through
//! [`SessionStats::fold`], which the session calls for every accepted
//! record, so a replay of the log in sequence order reproduces the exact
//! same values as the live updates.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionsError};
use crate::event::{AiResult, Classification, PhotoStatus, SessionEvent, UploadCompleted};

/// Adds sample `x` to a mean over `n` prior samples.
///
/// `M' = M + (x - M) / (n + 1)`. The caller increments `n` in the same step.
#[must_use]
pub fn incremental_mean(mean: f64, n: u64, x: f64) -> f64 {
	mean + (x - mean) / (n + 1) as f64
}

/// AI classification statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiStats {
	pub total_processed: u64,
	pub alert_count: u64,
	pub drowsy_count: u64,
	pub sleeping_count: u64,
	pub unknown_count: u64,
	pub avg_confidence: f64,
	pub avg_processing_time_ms: f64,
}

impl AiStats {
	/// Count for a single class.
	#[must_use]
	pub fn count_for(&self, classification: Classification) -> u64 {
		match classification {
			Classification::Alert => self.alert_count,
			Classification::Drowsy => self.drowsy_count,
			Classification::Sleeping => self.sleeping_count,
			Classification::Unknown => self.unknown_count,
		}
	}

	/// Share of each class over all processed results, as percentages.
	#[must_use]
	pub fn prediction_distribution(&self) -> [(Classification, f64); 4] {
		let pct = |count: u64| {
			if self.total_processed > 0 {
				(count as f64 / self.total_processed as f64) * 100.0
			} else {
				0.0
			}
		};
		[
			(Classification::Alert, pct(self.alert_count)),
			(Classification::Drowsy, pct(self.drowsy_count)),
			(Classification::Sleeping, pct(self.sleeping_count)),
			(Classification::Unknown, pct(self.unknown_count)),
		]
	}

	/// Percentage of results classified as drowsy or sleeping.
	#[must_use]
	pub fn fatigue_ratio(&self) -> f64 {
		if self.total_processed > 0 {
			((self.drowsy_count + self.sleeping_count) as f64 / self.total_processed as f64) * 100.0
		} else {
			0.0
		}
	}
}

/// Photo upload statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadStats {
	pub total_uploads: u64,
	pub successful_uploads: u64,
	pub failed_uploads: u64,
	/// Mean over successful uploads only
	pub avg_upload_duration_ms: f64,
	pub total_data_uploaded: u64,
}

impl UploadStats {
	/// Calculate the upload success rate.
	#[must_use]
	pub fn success_rate(&self) -> f64 {
		if self.total_uploads > 0 {
			(self.successful_uploads as f64 / self.total_uploads as f64) * 100.0
		} else {
			100.0
		}
	}
}

/// Counters for photo processing status transitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoStats {
	pub pending: u64,
	pub processing: u64,
	pub completed: u64,
	pub error: u64,
}

/// Aggregates embedded in a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
	pub ai: AiStats,
	pub uploads: UploadStats,
	pub photos: PhotoStats,
}

impl SessionStats {
	/// Folds one event into the stats. Lifecycle and location events leave
	/// stats untouched.
	pub fn fold(&mut self, event: &SessionEvent) -> Result<()> {
		match event {
			SessionEvent::AiResult(result) => self.update_ai_stats(result),
			SessionEvent::UploadCompleted(upload) => {
				self.update_upload_stats(upload);
				Ok(())
			}
			SessionEvent::PhotoStatus(change) => {
				self.update_photo_status(change.status);
				Ok(())
			}
			_ => Ok(()),
		}
	}

	/// Mean and count move together: both means use `total_processed` as
	/// their sample count, so the count is bumped only after both updates.
	/// A rejected result leaves every counter untouched.
	pub fn update_ai_stats(&mut self, result: &AiResult) -> Result<()> {
		if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
			return Err(SessionsError::Validation(format!(
				"confidence must be within [0, 1], got {}",
				result.confidence
			)));
		}
		if !result.processing_time_ms.is_finite() || result.processing_time_ms < 0.0 {
			return Err(SessionsError::Validation(format!(
				"processing_time_ms must be non-negative, got {}",
				result.processing_time_ms
			)));
		}

		let ai = &mut self.ai;
		let n = ai.total_processed;
		match result.classification {
			Classification::Alert => ai.alert_count += 1,
			Classification::Drowsy => ai.drowsy_count += 1,
			Classification::Sleeping => ai.sleeping_count += 1,
			Classification::Unknown => ai.unknown_count += 1,
		}
		ai.avg_confidence = incremental_mean(ai.avg_confidence, n, result.confidence);
		ai.avg_processing_time_ms =
			incremental_mean(ai.avg_processing_time_ms, n, result.processing_time_ms);
		ai.total_processed = n + 1;
		Ok(())
	}

	pub fn update_upload_stats(&mut self, upload: &UploadCompleted) {
		let uploads = &mut self.uploads;
		uploads.total_uploads += 1;
		if upload.success {
			uploads.avg_upload_duration_ms = incremental_mean(
				uploads.avg_upload_duration_ms,
				uploads.successful_uploads,
				upload.duration_ms,
			);
			uploads.successful_uploads += 1;
			uploads.total_data_uploaded = uploads.total_data_uploaded.saturating_add(upload.file_size_bytes);
		} else {
			uploads.failed_uploads += 1;
		}
	}

	pub fn update_photo_status(&mut self, status: PhotoStatus) {
		let photos = &mut self.photos;
		match status {
			PhotoStatus::Pending => photos.pending += 1,
			PhotoStatus::Processing => photos.processing += 1,
			PhotoStatus::Completed => photos.completed += 1,
			PhotoStatus::Error => photos.error += 1,
		}
	}
}
