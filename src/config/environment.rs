// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, database URLs, quota policy, and booking policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! Environment-based configuration management for production deployment

use crate::constants::{env_config, limits};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Environment type for behavior toggles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite { path: PathBuf },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            if path_str == ":memory:" {
                Self::Memory
            } else {
                Self::SQLite {
                    path: PathBuf::from(path_str),
                }
            }
        } else {
            // Fallback: treat as SQLite file path
            Self::SQLite {
                path: PathBuf::from(s),
            }
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_string(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/courses.db"),
        }
    }
}

impl std::fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log level
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Database configuration
    pub database: DatabaseConfig,
    /// External service configuration
    pub external_services: ExternalServicesConfig,
    /// Course-creation quota policy
    pub quota: QuotaConfig,
    /// Booking and slot policy
    pub booking: BookingConfig,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite path or in-memory)
    pub url: DatabaseUrl,
    /// Enable database migrations on startup
    pub auto_migrate: bool,
}

/// Upstream service endpoints and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalServicesConfig {
    /// User/tutor directory service
    pub users: ExternalServiceConfig,
    /// Payments/subscription service
    pub payments: ExternalServiceConfig,
}

/// A single upstream service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalServiceConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Total request timeout in seconds
    pub timeout_secs: u64,
}

/// Course-creation quota policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Courses a tutor may create without an active subscription
    pub free_course_limit: u32,
    /// Permit course creation when the subscription service is unreachable
    ///
    /// Defaults to false (fail-closed). Enabling this trades safety for
    /// availability in degraded-mode operation.
    pub fail_open: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_course_limit: limits::DEFAULT_FREE_COURSE_LIMIT,
            fail_open: false,
        }
    }
}

/// Booking and slot policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Skip the slot overlap check entirely
    ///
    /// Defaults to true in the booking-acceptance flow: a tutor may run
    /// concurrent sessions.
    pub allow_overlapping_slots: bool,
    /// Slot length used by the accept flow when none is supplied (minutes)
    pub default_slot_duration_minutes: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            allow_overlapping_slots: true,
            default_slot_duration_minutes: limits::DEFAULT_SLOT_DURATION_MINUTES,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparseable
    /// value or validation fails.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let config = Self {
            log_level: LogLevel::from_str_or_default(&env_config::log_level()),
            environment: Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development")),
            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_config::database_url()),
                auto_migrate: env_var_or("AUTO_MIGRATE", "true")
                    .parse()
                    .context("Invalid AUTO_MIGRATE value")?,
            },
            external_services: ExternalServicesConfig {
                users: ExternalServiceConfig {
                    base_url: trim_base_url(&env_config::users_service_url()),
                    timeout_secs: env_config::external_timeout_secs(),
                },
                payments: ExternalServiceConfig {
                    base_url: trim_base_url(&env_config::payments_service_url()),
                    timeout_secs: env_config::external_timeout_secs(),
                },
            },
            quota: QuotaConfig {
                free_course_limit: env_config::free_course_limit(),
                fail_open: env_config::quota_fail_open(),
            },
            booking: BookingConfig {
                allow_overlapping_slots: env_config::allow_overlapping_slots(),
                default_slot_duration_minutes: env_var_or(
                    "DEFAULT_SLOT_DURATION_MINUTES",
                    &limits::DEFAULT_SLOT_DURATION_MINUTES.to_string(),
                )
                .parse()
                .context("Invalid DEFAULT_SLOT_DURATION_MINUTES value")?,
            },
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error when a value is out of its meaningful range.
    pub fn validate(&self) -> Result<()> {
        if self.quota.free_course_limit == 0 {
            return Err(anyhow::anyhow!("FREE_COURSE_LIMIT must be at least 1"));
        }

        if self.booking.default_slot_duration_minutes <= 0 {
            return Err(anyhow::anyhow!(
                "DEFAULT_SLOT_DURATION_MINUTES must be positive"
            ));
        }

        for (name, service) in [
            ("USERS_SERVICE_URL", &self.external_services.users),
            ("PAYMENTS_SERVICE_URL", &self.external_services.payments),
        ] {
            if service.base_url.is_empty() {
                return Err(anyhow::anyhow!("{name} cannot be empty"));
            }
            if service.timeout_secs == 0 {
                return Err(anyhow::anyhow!("{name} timeout must be positive"));
            }
        }

        Ok(())
    }

    /// Summarize the active configuration for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "env={} db={} quota_limit={} quota_fail_open={} allow_overlaps={}",
            self.environment,
            self.database.url,
            self.quota.free_course_limit,
            self.quota.fail_open,
            self.booking.allow_overlapping_slots
        )
    }
}

/// Read an environment variable with a default fallback
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Normalize a base URL by stripping any trailing slash
fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
