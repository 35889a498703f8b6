// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for wakesafe-server.

pub mod broadcast;
pub mod database;
pub mod logging;
pub mod sessions;
pub mod sync;

pub use broadcast::{BroadcastConfig, BroadcastConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use sessions::{SessionsConfig, SessionsConfigLayer};
pub use sync::{SyncSettings, SyncSettingsLayer};
