//! Service configuration.
//!
//! Settings come from three layers, each overriding the one before:
//!
//! 1. the YAML file named by `-f`/`--config` or `BOOKINGS_CONFIG` (default `config.yaml`);
//! 2. `BOOKINGS_` environment variables, with `__` separating nested keys
//!    (`BOOKINGS_MAIL__OVERFLOW=drop` sets `mail.overflow`);
//! 3. `DATABASE_URL`, which selects PostgreSQL at that URL.
//!
//! ```no_run
//! use clap::Parser;
//! use bookings::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(&Args::parse())?;
//! assert!(!config.seed_rooms.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! Top-level keys: `host`, `port`, `database` (`type: postgres | memory`), `seed_rooms`,
//! `session`, `email` (`type: smtp | file`), `mail`, `enable_metrics`, `enable_otel_export`.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BOOKINGS_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Root of the configuration tree. Every field has a default.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from the `DATABASE_URL` environment variable; folded into `database` on load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Interval store backend
    pub database: DatabaseConfig,
    /// Room names inserted on startup when the catalogue is empty
    pub seed_rooms: Vec<String>,
    /// Session cookie and storage settings
    pub session: SessionConfig,
    /// Outgoing mail settings
    pub email: EmailConfig,
    /// Mail queue sizing and backpressure
    pub mail: MailQueueConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Connection pool configuration.
///
/// The acquire timeout is not configured here: acquiring a connection is part of a store
/// operation and shares `database.operation_timeout`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            idle_timeout_secs: 60,
            max_lifetime_secs: 300, // 5 minutes
        }
    }
}

impl PoolSettings {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.max_lifetime_secs > 0).then(|| Duration::from_secs(self.max_lifetime_secs))
    }
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(3)
}

/// Interval store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// PostgreSQL with migrations applied on startup
    Postgres {
        /// Connection string
        url: String,
        #[serde(default)]
        pool: PoolSettings,
        /// Upper bound on any single store operation, including acquiring a connection
        #[serde(default = "default_operation_timeout", with = "humantime_serde")]
        operation_timeout: Duration,
    },
    /// Process-local store; contents are lost on restart
    Memory {
        #[serde(default = "default_operation_timeout", with = "humantime_serde")]
        operation_timeout: Duration,
    },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::Postgres {
            url: "postgres://localhost:5432/bookings".to_string(),
            pool: PoolSettings::default(),
            operation_timeout: default_operation_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn operation_timeout(&self) -> Duration {
        match self {
            DatabaseConfig::Postgres { operation_timeout, .. } => *operation_timeout,
            DatabaseConfig::Memory { operation_timeout } => *operation_timeout,
        }
    }

    /// Get the PostgreSQL URL if configured
    pub fn postgres_url(&self) -> Option<&str> {
        match self {
            DatabaseConfig::Postgres { url, .. } => Some(url),
            DatabaseConfig::Memory { .. } => None,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Idle time after which a session and its workflow state are discarded
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for the session id
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
    /// Maximum number of live sessions kept in memory
    pub capacity: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            cookie_name: "bookings_session".to_string(),
            cookie_secure: true,
            cookie_same_site: "lax".to_string(),
            capacity: 10_000,
        }
    }
}

/// Email configuration for confirmations and owner notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// When set, every confirmed reservation also notifies this address
    pub owner_email: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::default(),
            from_email: "reservations@example.com".to_string(),
            from_name: "Fort Smythe Bed and Breakfast".to_string(),
            owner_email: None,
        }
    }
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        host: String,
        port: u16,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        Self::File {
            path: "./emails".to_string(),
        }
    }
}

/// What `enqueue` does when the mail queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait for the worker to free a slot
    #[default]
    Block,
    /// Log, count and discard the message
    Drop,
}

/// Mail queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailQueueConfig {
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for MailQueueConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            database: DatabaseConfig::default(),
            seed_rooms: vec!["General's Quarters".to_string(), "Major's Suite".to_string()],
            session: SessionConfig::default(),
            email: EmailConfig::default(),
            mail: MailQueueConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving existing pool and timeout settings)
        if let Some(url) = config.database_url.take() {
            let operation_timeout = config.database.operation_timeout();
            let pool = match &config.database {
                DatabaseConfig::Postgres { pool, .. } => pool.clone(),
                DatabaseConfig::Memory { .. } => PoolSettings::default(),
            };
            config.database = DatabaseConfig::Postgres {
                url,
                pool,
                operation_timeout,
            };
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.mail.queue_capacity == 0 {
            return Err(Error::Internal {
                operation: "Config validation: mail.queue_capacity must be at least 1".to_string(),
            });
        }

        if let DatabaseConfig::Postgres { pool, .. } = &self.database {
            if pool.max_connections == 0 {
                return Err(Error::Internal {
                    operation: "Config validation: database.pool.max_connections must be at least 1".to_string(),
                });
            }
            if pool.min_connections > pool.max_connections {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                        pool.min_connections, pool.max_connections
                    ),
                });
            }
        }

        if self.database.operation_timeout().is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: database.operation_timeout must be greater than zero".to_string(),
            });
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: session.cookie_name cannot be empty".to_string(),
            });
        }

        if !matches!(self.session.cookie_same_site.to_lowercase().as_str(), "strict" | "lax" | "none") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: session.cookie_same_site must be strict, lax or none, got {:?}",
                    self.session.cookie_same_site
                ),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("BOOKINGS_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.port, 3001);
            assert_eq!(config.database.operation_timeout(), Duration::from_secs(3));
            assert_eq!(config.mail.queue_capacity, 100);
            assert_eq!(config.mail.overflow, OverflowPolicy::Block);
            assert_eq!(config.seed_rooms, vec!["General's Quarters", "Major's Suite"]);
            match &config.database {
                DatabaseConfig::Postgres { pool, .. } => assert_eq!(pool, &PoolSettings::default()),
                other => panic!("expected postgres default, got {other:?}"),
            }

            Ok(())
        });
    }

    #[test]
    fn test_yaml_sections() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "test.yaml",
                r#"
port: 8080
database:
  type: memory
  operation_timeout: 500ms
seed_rooms:
  - Attic
session:
  cookie_name: stay
  timeout: 2h
  cookie_secure: false
email:
  type: smtp
  host: localhost
  port: 1025
  from_email: desk@example.com
  owner_email: owner@example.com
mail:
  queue_capacity: 5
  overflow: drop
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.port, 8080);
            assert!(matches!(config.database, DatabaseConfig::Memory { .. }));
            assert_eq!(config.database.operation_timeout(), Duration::from_millis(500));
            assert_eq!(config.seed_rooms, vec!["Attic"]);
            assert_eq!(config.session.cookie_name, "stay");
            assert_eq!(config.session.timeout, Duration::from_secs(2 * 60 * 60));
            assert!(!config.session.cookie_secure);
            assert_eq!(config.session.cookie_same_site, "lax"); // default
            assert!(matches!(config.email.transport, EmailTransportConfig::Smtp { port: 1025, .. }));
            assert_eq!(config.email.owner_email.as_deref(), Some("owner@example.com"));
            assert_eq!(config.mail.queue_capacity, 5);
            assert_eq!(config.mail.overflow, OverflowPolicy::Drop);

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
host: 0.0.0.0
mail:
  queue_capacity: 10
"#,
            )?;

            jail.set_env("BOOKINGS_HOST", "127.0.0.1");
            jail.set_env("BOOKINGS_PORT", "9000");
            jail.set_env("BOOKINGS_MAIL__OVERFLOW", "drop");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 9000);
            assert_eq!(config.bind_address(), "127.0.0.1:9000");
            assert_eq!(config.mail.overflow, OverflowPolicy::Drop);
            // YAML values should be preserved
            assert_eq!(config.mail.queue_capacity, 10);

            Ok(())
        });
    }

    #[test]
    fn test_database_url_switches_to_postgres_and_keeps_settings() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  type: memory
  operation_timeout: 7s
"#,
            )?;
            jail.set_env("DATABASE_URL", "postgres://db.internal/bookings");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.database.postgres_url(), Some("postgres://db.internal/bookings"));
            assert_eq!(config.database.operation_timeout(), Duration::from_secs(7));
            assert!(config.database_url.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_postgres_pool_settings() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  type: postgres
  url: postgres://localhost/bookings
  pool:
    max_connections: 4
    idle_timeout_secs: 0
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            let DatabaseConfig::Postgres { pool, .. } = &config.database else {
                panic!("expected postgres");
            };
            assert_eq!(pool.max_connections, 4);
            assert_eq!(pool.idle_timeout(), None);
            assert_eq!(pool.max_lifetime(), Some(Duration::from_secs(300)));

            Ok(())
        });
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "prot: 8080\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_zero_capacity_and_empty_cookie() {
        let mut config = Config::default();
        config.mail.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.cookie_name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.cookie_same_site = "sometimes".to_string();
        assert!(config.validate().is_err());

        let config = Config {
            database: DatabaseConfig::Memory {
                operation_timeout: Duration::ZERO,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            database: DatabaseConfig::Postgres {
                url: "postgres://localhost/bookings".to_string(),
                pool: PoolSettings {
                    max_connections: 0,
                    ..Default::default()
                },
                operation_timeout: Duration::from_secs(3),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validation_failure_surfaces_from_load() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "mail:\n  queue_capacity: 0\n")?;
            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("queue_capacity"));
            Ok(())
        });
    }
}
