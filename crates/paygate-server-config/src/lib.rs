// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for Paygate server.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file and the environment
//! - Type-safe configuration with validation
//! - The `PAYGATE_SERVER_*` and `DB_*` environment variable conventions
//!
//! # Usage
//!
//! ```ignore
//! use paygate_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub cors: CorsConfig,
	pub jobs: JobsConfig,
	pub payments: PaymentsConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		self.http.socket_addr()
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables
/// 2. Config file (`/etc/paygate/server.toml`)
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
	load_sources(vec![Box::new(EnvSource)])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
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
	let http = layer.http.unwrap_or_default().finalize()?;
	let database = layer.database.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let cors = layer.cors.unwrap_or_default().finalize();
	let jobs = layer.jobs.unwrap_or_default().finalize();
	let payments = layer.payments.unwrap_or_default().finalize()?;

	info!(
		host = %http.host,
		port = http.port,
		database = %database.primary.redacted_url(),
		replica_configured = database.replica.is_some(),
		analytics_configured = database.analytics.is_some(),
		jobs_enabled = jobs.enabled,
		currency = %payments.default_currency,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		logging,
		cors,
		jobs,
		payments,
	})
}
