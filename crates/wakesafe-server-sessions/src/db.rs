// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite pool setup and migrations.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};

use crate::error::{Result, SessionsServerError};

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./wakesafe.db")
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| SessionsServerError::InvalidData(format!("invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Run all session migrations.
///
/// Migrations are idempotent - safe to run multiple times.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	let migrations = [
		include_str!("../migrations/001_create_session_events.sql"),
		include_str!("../migrations/002_create_sessions.sql"),
	];

	for migration in migrations {
		for stmt in migration.split(';').map(strip_comments).filter(|s| !s.is_empty()) {
			sqlx::query(&stmt).execute(pool).await?;
		}
	}

	tracing::debug!("session migrations applied");
	Ok(())
}

fn strip_comments(stmt: &str) -> String {
	stmt
		.lines()
		.filter(|line| !line.trim_start().starts_with("--"))
		.collect::<Vec<_>>()
		.join("\n")
		.trim()
		.to_string()
}


#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_migrations_are_idempotent() {
		let pool = testing::memory_pool().await;
		run_migrations(&pool).await.unwrap();

		let count: (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('sessions', 'session_events')",
		)
		.fetch_one(&pool)
		.await
		.unwrap();
		assert_eq!(count.0, 2);
	}

	#[tokio::test]
	async fn test_create_pool_on_disk() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("wakesafe.db").display());
		let pool = create_pool(&url).await.unwrap();
		run_migrations(&pool).await.unwrap();
	}
}
