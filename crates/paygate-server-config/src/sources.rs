// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	CorsConfigLayer, DatabaseConfigLayer, DatabaseConnectionLayer, HttpConfigLayer,
	JobsConfigLayer, LoggingConfigLayer, PaymentsConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/paygate/server.toml";

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
		Self::new(SYSTEM_CONFIG_PATH)
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

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `PAYGATE_SERVER_<SECTION>_<FIELD>` for server sections and
/// `DB_[REPLICA_|ANALYTICS_]<FIELD>` for databases.
pub struct EnvSource;

impl EnvSource {
	/// Build a layer from an arbitrary variable lookup.
	pub fn load_with<F>(lookup: F) -> Result<ServerConfigLayer, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = Env { lookup };
		Ok(ServerConfigLayer {
			http: Some(env.http()?),
			database: Some(env.database()?),
			logging: Some(env.logging()),
			cors: Some(env.cors()),
			jobs: Some(env.jobs()?),
			payments: Some(env.payments()?),
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		EnvSource::load_with(|name| std::env::var(name).ok())
	}
}

struct Env<F> {
	lookup: F,
}

impl<F> Env<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name).map(|v| {
			let v = v.trim();
			v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes")
		})
	}

	fn parse<T: FromStr>(&self, name: &str, type_name: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {type_name} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|v| {
			v.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect()
		})
	}

	fn port(&self, name: &str) -> Result<Option<u16>, ConfigError> {
		let port: Option<u32> = self.parse(name, "port")?;
		match port {
			Some(p) if (1..=65535).contains(&p) => Ok(Some(p as u16)),
			Some(p) => Err(ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("port {p} is outside 1..=65535"),
			}),
			None => Ok(None),
		}
	}

	fn http(&self) -> Result<HttpConfigLayer, ConfigError> {
		Ok(HttpConfigLayer {
			host: self.var("PAYGATE_SERVER_HOST"),
			port: self.port("PAYGATE_SERVER_PORT")?,
			base_url: self.var("PAYGATE_SERVER_BASE_URL"),
		})
	}

	fn connection(&self, prefix: &str, pooled: bool) -> Result<DatabaseConnectionLayer, ConfigError> {
		let key = |field: &str| format!("{prefix}{field}");
		let mut layer = DatabaseConnectionLayer {
			enabled: self.bool(&key("ENABLED")),
			kind: self.var(&key("TYPE")),
			host: self.var(&key("HOST")),
			port: self.port(&key("PORT"))?,
			user: self.var(&key("USER")),
			password: self.var(&key("PASSWORD")),
			name: self.var(&key("NAME")),
			path: self.var(&key("PATH")),
			..Default::default()
		};
		if pooled {
			layer.pool_size = self.parse(&key("POOL_SIZE"), "u32")?;
			layer.max_overflow = self.parse(&key("MAX_OVERFLOW"), "u32")?;
			layer.pool_timeout_secs = self.parse(&key("POOL_TIMEOUT"), "u64")?;
			layer.pool_recycle_secs = self.parse(&key("POOL_RECYCLE"), "i64")?;
			layer.echo = self.bool(&key("ECHO"));
			layer.connect_timeout_secs = self.parse(&key("CONNECT_TIMEOUT"), "u64")?;
			layer.charset = self.var(&key("CHARSET"));
		}
		Ok(layer)
	}

	fn database(&self) -> Result<DatabaseConfigLayer, ConfigError> {
		let mut primary = self.connection("DB_", true)?;
		// The primary is always on; DB_ENABLED has no meaning.
		primary.enabled = None;
		let mut replica = self.connection("DB_REPLICA_", false)?;
		// Replicas share the primary engine.
		replica.kind = None;
		Ok(DatabaseConfigLayer {
			primary: Some(primary),
			replica: Some(replica),
			analytics: Some(self.connection("DB_ANALYTICS_", false)?),
		})
	}

	fn logging(&self) -> LoggingConfigLayer {
		LoggingConfigLayer {
			level: self.var("PAYGATE_SERVER_LOG_LEVEL"),
			json: self.bool("PAYGATE_SERVER_LOG_JSON"),
		}
	}

	fn cors(&self) -> CorsConfigLayer {
		CorsConfigLayer {
			allowed_origins: self.list("PAYGATE_SERVER_CORS_ALLOWED_ORIGINS"),
			allowed_methods: self.list("PAYGATE_SERVER_CORS_ALLOWED_METHODS"),
			allowed_headers: self.list("PAYGATE_SERVER_CORS_ALLOWED_HEADERS"),
			allow_credentials: self.bool("PAYGATE_SERVER_CORS_ALLOW_CREDENTIALS"),
		}
	}

	fn jobs(&self) -> Result<JobsConfigLayer, ConfigError> {
		Ok(JobsConfigLayer {
			enabled: self.bool("PAYGATE_SERVER_JOBS_ENABLED"),
			expiry_interval_secs: self.parse("PAYGATE_SERVER_JOBS_EXPIRY_INTERVAL_SECS", "u64")?,
			callback_retry_interval_secs: self
				.parse("PAYGATE_SERVER_JOBS_CALLBACK_RETRY_INTERVAL_SECS", "u64")?,
			callback_max_attempts: self.parse("PAYGATE_SERVER_JOBS_CALLBACK_MAX_ATTEMPTS", "u32")?,
			history_retention_days: self
				.parse("PAYGATE_SERVER_JOBS_HISTORY_RETENTION_DAYS", "u32")?,
		})
	}

	fn payments(&self) -> Result<PaymentsConfigLayer, ConfigError> {
		Ok(PaymentsConfigLayer {
			default_currency: self.var("PAYGATE_SERVER_PAYMENTS_DEFAULT_CURRENCY"),
			transaction_ttl_minutes: self
				.parse("PAYGATE_SERVER_PAYMENTS_TRANSACTION_TTL_MINUTES", "u32")?,
			require_webhook_signature: self.bool("PAYGATE_SERVER_PAYMENTS_REQUIRE_WEBHOOK_SIGNATURE"),
		})
	}
}
