// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WakeSafe session store operator CLI.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wakesafe_sessions_core::{SessionId, SessionState};

mod commands;
mod version;

use commands::{Backend, Verification};

/// WakeSafe server - inspect and maintain the session event log.
#[derive(Parser, Debug)]
#[command(name = "wakesafe-server", about = "WakeSafe session store", version)]
struct Args {
	/// Config file (defaults to /etc/wakesafe/server.toml)
	#[arg(long, global = true, env = "WAKESAFE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Apply database migrations
	Migrate,
	/// List sessions in a state, newest first
	Sessions {
		#[arg(long, default_value = "active")]
		state: SessionState,
		#[arg(long, default_value_t = 50)]
		limit: u32,
	},
	/// Rebuild a session from its event log and print it as JSON
	Replay { id: SessionId },
	/// Compare a stored snapshot with a fresh fold of the log
	Verify { id: SessionId },
	/// Print the resolved configuration
	Config,
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => wakesafe_server_config::load_config_with_file(path)?,
		None => wakesafe_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	commands::session_config(&config).validate()?;

	let mut stdout = std::io::stdout().lock();
	match args.command {
		Command::Version => {}
		Command::Config => commands::print_config(&config, &mut stdout)?,
		Command::Migrate => commands::migrate(&config).await?,
		Command::Sessions { state, limit } => {
			let backend = Backend::open(&config).await?;
			commands::list_sessions(&backend, state, limit, &mut stdout).await?;
		}
		Command::Replay { id } => {
			let backend = Backend::open(&config).await?;
			commands::replay(&backend, &id, &mut stdout).await?;
		}
		Command::Verify { id } => {
			let backend = Backend::open(&config).await?;
			match commands::verify(&backend, &id).await? {
				Verification::Match { last_seq } => {
					writeln!(stdout, "ok: {id} matches log at seq {last_seq}")?;
				}
				Verification::MissingSnapshot => {
					return Err(format!("no snapshot stored for session {id}").into());
				}
				Verification::Mismatch {
					snapshot_seq,
					log_seq,
				} => {
					return Err(format!(
						"snapshot of {id} differs from log (snapshot seq {snapshot_seq}, log seq {log_seq})"
					)
					.into());
				}
			}
		}
	}

	Ok(())
}
