// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Paygate server binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use paygate_server::{
	create_app_state, create_router,
	jobs::{CallbackRetryJob, JobHistoryCleanupJob, TransactionExpiryJob},
	telemetry, version, Repositories, ServerConfig,
};
use paygate_server_db::{create_revision, time, DatabaseManager, JobRepository, MigrationRunner};
use paygate_server_jobs::JobScheduler;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_MIGRATIONS_DIR: &str = "crates/paygate-server-db/migrations";

/// Paygate server - payment service HTTP API.
#[derive(Parser, Debug)]
#[command(name = "paygate-server", about = "Paygate payment service", version)]
struct Args {
	/// Config file, defaults to /etc/paygate/server.toml
	#[arg(long, global = true, env = "PAYGATE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server and background jobs
	Serve(ServeArgs),
	/// Manage schema migrations
	#[command(subcommand)]
	Migrate(MigrateCommand),
	/// Show version and build information
	Version,
}

#[derive(ClapArgs, Debug, Default)]
struct ServeArgs {
	#[arg(long)]
	host: Option<String>,
	#[arg(long)]
	port: Option<u16>,
	/// Upgrade every writable database before serving
	#[arg(long)]
	migrate: bool,
}

#[derive(ClapArgs, Debug)]
struct DatabaseArg {
	/// Registered database name (primary, replica, analytics)
	#[arg(long)]
	database: Option<String>,
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
	/// Upgrade to head
	Up {
		#[command(flatten)]
		db: DatabaseArg,
		/// Upgrade every writable database
		#[arg(long, conflicts_with = "database")]
		all: bool,
	},
	/// Revert revisions newer than --target
	Down {
		#[arg(long)]
		target: i64,
		#[command(flatten)]
		db: DatabaseArg,
	},
	/// Print the latest applied revision
	Current {
		#[command(flatten)]
		db: DatabaseArg,
	},
	/// List every known revision
	History {
		#[command(flatten)]
		db: DatabaseArg,
	},
	/// List revisions not applied yet
	Pending {
		#[command(flatten)]
		db: DatabaseArg,
	},
	/// Create an empty up/down revision pair
	New {
		#[arg(short, long)]
		message: String,
		#[arg(long, default_value = DEFAULT_MIGRATIONS_DIR)]
		dir: PathBuf,
	},
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => paygate_server_config::load_config_with_file(path)?,
		None => paygate_server_config::load_config()?,
	};
	telemetry::init_tracing(&config.logging, config.database.primary.echo);

	match args.command {
		Some(Command::Migrate(MigrateCommand::New { message, dir })) => {
			let revision = create_revision(&dir, &message, time::now())?;
			println!("created {}", revision.up.display());
			println!("created {}", revision.down.display());
			Ok(())
		}
		Some(Command::Migrate(command)) => migrate(config, command).await,
		Some(Command::Serve(serve_args)) => serve(config, serve_args).await,
		None => serve(config, ServeArgs::default()).await,
		Some(Command::Version) => Ok(()),
	}
}

async fn connect(config: &ServerConfig) -> Result<DatabaseManager, BoxError> {
	let mut databases = DatabaseManager::from_config(&config.database)?;
	databases.initialize().await?;
	Ok(databases)
}

fn runner(databases: &DatabaseManager, db: &DatabaseArg) -> Result<MigrationRunner, BoxError> {
	Ok(databases.migration_runner(db.database.as_deref())?)
}

async fn migrate(config: ServerConfig, command: MigrateCommand) -> Result<(), BoxError> {
	let databases = connect(&config).await?;

	let result = run_migrate(&databases, command).await;
	databases.shutdown().await;
	result
}

async fn run_migrate(databases: &DatabaseManager, command: MigrateCommand) -> Result<(), BoxError> {
	match command {
		MigrateCommand::Up { all: true, .. } => {
			for (name, applied) in databases.upgrade_all().await? {
				println!("{name}: applied {} revision(s)", applied.len());
			}
		}
		MigrateCommand::Up { db, .. } => {
			let applied = runner(databases, &db)?.upgrade().await?;
			if applied.is_empty() {
				println!("already at head");
			}
			for version in applied {
				println!("applied {version}");
			}
		}
		MigrateCommand::Down { target, db } => {
			for version in runner(databases, &db)?.downgrade(target).await? {
				println!("reverted {version}");
			}
		}
		MigrateCommand::Current { db } => match runner(databases, &db)?.current().await? {
			Some(version) => println!("{version}"),
			None => println!("no revision applied"),
		},
		MigrateCommand::History { db } => {
			for m in runner(databases, &db)?.history().await? {
				let marker = if m.applied { "x" } else { " " };
				println!("[{marker}] {} {}", m.version, m.description);
			}
		}
		MigrateCommand::Pending { db } => {
			for m in runner(databases, &db)?.pending().await? {
				println!("{} {}", m.version, m.description);
			}
		}
		MigrateCommand::New { .. } => {}
	}
	Ok(())
}

async fn serve(mut config: ServerConfig, args: ServeArgs) -> Result<(), BoxError> {
	if let Some(host) = args.host {
		config.http.host = host;
	}
	if let Some(port) = args.port {
		config.http.port = port;
	}

	tracing::info!(
		addr = %config.socket_addr(),
		databases = ?config.database,
		"starting paygate-server"
	);

	let databases = connect(&config).await?;
	if args.migrate {
		for (name, applied) in databases.upgrade_all().await? {
			tracing::info!(database = %name, applied = applied.len(), "database upgraded");
		}
	}
	let databases = Arc::new(databases);

	let job_repo = Arc::new(JobRepository::new(databases.primary()?));
	let mut scheduler = JobScheduler::new(Arc::clone(&job_repo));
	if config.jobs.enabled {
		let writer = Repositories::new(databases.primary()?);
		scheduler.register_periodic(
			Arc::new(TransactionExpiryJob::new(writer.transactions.clone())),
			Duration::from_secs(config.jobs.expiry_interval_secs),
		);
		scheduler.register_periodic(
			Arc::new(CallbackRetryJob::new(
				writer,
				config.jobs.callback_max_attempts,
				config.payments.require_webhook_signature,
			)),
			Duration::from_secs(config.jobs.callback_retry_interval_secs),
		);
		scheduler.register_periodic(
			Arc::new(JobHistoryCleanupJob::new(
				Arc::clone(&job_repo),
				config.jobs.history_retention_days,
			)),
			Duration::from_secs(24 * 60 * 60),
		);
		if let Err(e) = scheduler.start().await {
			tracing::error!(error = %e, "failed to start job scheduler");
		}
	}

	let addr = config.socket_addr();
	let state = create_app_state(config, Arc::clone(&databases))?;
	let app = create_router(state);

	let listener = tokio::net::TcpListener::bind(&addr).await?;
	tracing::info!("listening on {}", addr);

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	scheduler.shutdown().await;
	databases.shutdown().await;
	tracing::info!("server shutdown complete");
	Ok(())
}
