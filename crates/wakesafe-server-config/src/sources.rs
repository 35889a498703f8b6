// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	BroadcastConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, SessionsConfigLayer,
	SyncSettingsLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/wakesafe/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WAKESAFE_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()),
			logging: Some(load_logging_from_env()),
			sessions: Some(load_sessions_from_env()?),
			broadcast: Some(load_broadcast_from_env()?),
			sync: Some(load_sync_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {} value '{v}'", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("WAKESAFE_SERVER_DATABASE_URL"),
	}
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("WAKESAFE_SERVER_LOG_LEVEL"),
	}
}

fn load_sessions_from_env() -> Result<SessionsConfigLayer, ConfigError> {
	Ok(SessionsConfigLayer {
		capture_interval_ms: env_parse("WAKESAFE_SERVER_SESSIONS_CAPTURE_INTERVAL_MS")?,
		batch_size: env_parse("WAKESAFE_SERVER_SESSIONS_BATCH_SIZE")?,
		ai_processing: env_bool("WAKESAFE_SERVER_SESSIONS_AI_PROCESSING"),
		location_tracking: env_bool("WAKESAFE_SERVER_SESSIONS_LOCATION_TRACKING"),
		realtime_updates: env_bool("WAKESAFE_SERVER_SESSIONS_REALTIME_UPDATES"),
	})
}

fn load_broadcast_from_env() -> Result<BroadcastConfigLayer, ConfigError> {
	Ok(BroadcastConfigLayer {
		channel_capacity: env_parse("WAKESAFE_SERVER_BROADCAST_CHANNEL_CAPACITY")?,
		max_subscribers_per_session: env_parse("WAKESAFE_SERVER_BROADCAST_MAX_SUBSCRIBERS")?,
	})
}

fn load_sync_from_env() -> Result<SyncSettingsLayer, ConfigError> {
	Ok(SyncSettingsLayer {
		initial_delay_ms: env_parse("WAKESAFE_SERVER_SYNC_INITIAL_DELAY_MS")?,
		max_delay_ms: env_parse("WAKESAFE_SERVER_SYNC_MAX_DELAY_MS")?,
		max_attempts: env_parse("WAKESAFE_SERVER_SYNC_MAX_ATTEMPTS")?,
		multiplier: env_parse("WAKESAFE_SERVER_SYNC_MULTIPLIER")?,
		jitter: env_bool("WAKESAFE_SERVER_SYNC_JITTER"),
	})
}
