// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the WakeSafe session server.
//!
//! Sources, lowest to highest precedence: built-in defaults, a TOML file,
//! then `WAKESAFE_SERVER_*` environment variables.
//!
//! ```ignore
//! use wakesafe_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("database at {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use serde::Serialize;
use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub sessions: SessionsConfig,
	pub broadcast: BroadcastConfig,
	pub sync: SyncSettings,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WAKESAFE_SERVER_*`)
/// 2. Config file (`/etc/wakesafe/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

fn load_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		sessions: layer.sessions.unwrap_or_default().finalize(),
		broadcast: layer.broadcast.unwrap_or_default().finalize(),
		sync: layer.sync.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		capture_interval_ms = config.sessions.capture_interval_ms,
		realtime_updates = config.sessions.realtime_updates,
		channel_capacity = config.broadcast.channel_capacity,
		sync_max_attempts = config.sync.max_attempts,
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.sessions.capture_interval_ms == 0 {
		return Err(ConfigError::Validation(
			"sessions.capture_interval_ms must be greater than zero".to_string(),
		));
	}
	if config.sessions.batch_size == 0 {
		return Err(ConfigError::Validation(
			"sessions.batch_size must be greater than zero".to_string(),
		));
	}
	if config.broadcast.channel_capacity == 0 {
		return Err(ConfigError::Validation(
			"broadcast.channel_capacity must be greater than zero".to_string(),
		));
	}
	if config.sync.max_attempts == 0 {
		return Err(ConfigError::Validation(
			"sync.max_attempts must be at least 1".to_string(),
		));
	}
	if config.sync.multiplier.is_nan() || config.sync.multiplier < 1.0 {
		return Err(ConfigError::Validation(format!(
			"sync.multiplier must be at least 1.0, got {}",
			config.sync.multiplier
		)));
	}
	if config.sync.initial_delay_ms > config.sync.max_delay_ms {
		return Err(ConfigError::Validation(format!(
			"sync.initial_delay_ms ({}) exceeds sync.max_delay_ms ({})",
			config.sync.initial_delay_ms, config.sync.max_delay_ms
		)));
	}

	Ok(())
}
