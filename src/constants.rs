// ABOUTME: System-wide constants and configuration values for the booking engine
// ABOUTME: Contains defaults, limits, and environment variable configuration helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! # Constants Module
//!
//! Application constants and environment-based configuration values.
//! This module provides both hardcoded defaults and environment variable
//! configuration helpers used by [`crate::config::environment`].

/// Hard limits and built-in defaults
pub mod limits {
    /// Courses a tutor may create without an active subscription
    pub const DEFAULT_FREE_COURSE_LIMIT: u32 = 3;

    /// Slot length used by the accept flow when none is supplied (minutes)
    pub const DEFAULT_SLOT_DURATION_MINUTES: i64 = 60;

    /// Total timeout for outbound calls to upstream services (seconds)
    pub const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 10;

    /// Connect timeout for outbound calls to upstream services (seconds)
    pub const DEFAULT_EXTERNAL_CONNECT_TIMEOUT_SECS: u64 = 5;
}

/// Built-in default values
pub mod defaults {
    /// Default database location
    pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/courses.db";

    /// Default base URL of the user/tutor directory service
    pub const DEFAULT_USERS_SERVICE_URL: &str = "http://users-service:8081";

    /// Default base URL of the payments/subscription service
    pub const DEFAULT_PAYMENTS_SERVICE_URL: &str = "http://payments-service:8002";
}

/// Environment-based configuration
pub mod env_config {
    use std::env;

    use super::{defaults, limits};

    /// Get the database URL from environment or default
    #[must_use]
    pub fn database_url() -> String {
        env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DEFAULT_DATABASE_URL.to_string())
    }

    /// Get the log level from environment or default
    #[must_use]
    pub fn log_level() -> String {
        env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    }

    /// Get the user directory base URL from environment or default
    #[must_use]
    pub fn users_service_url() -> String {
        env::var("USERS_SERVICE_URL")
            .unwrap_or_else(|_| defaults::DEFAULT_USERS_SERVICE_URL.to_string())
    }

    /// Get the payments service base URL from environment or default
    #[must_use]
    pub fn payments_service_url() -> String {
        env::var("PAYMENTS_SERVICE_URL")
            .unwrap_or_else(|_| defaults::DEFAULT_PAYMENTS_SERVICE_URL.to_string())
    }

    /// Get the free-tier course limit from environment or default
    #[must_use]
    pub fn free_course_limit() -> u32 {
        env::var("FREE_COURSE_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(limits::DEFAULT_FREE_COURSE_LIMIT)
    }

    /// Whether the quota guard fails open when payments is unreachable
    ///
    /// Defaults to fail-closed: an unreachable subscription service blocks
    /// course creation.
    #[must_use]
    pub fn quota_fail_open() -> bool {
        truthy(&env::var("COURSE_QUOTA_FAIL_OPEN").unwrap_or_default())
    }

    /// Whether slot creation skips the overlap check
    ///
    /// Defaults to allowing overlaps: a tutor may run concurrent sessions.
    #[must_use]
    pub fn allow_overlapping_slots() -> bool {
        match env::var("ALLOW_OVERLAPPING_SLOTS") {
            Ok(value) => truthy(&value),
            Err(_) => true,
        }
    }

    /// Get the outbound request timeout from environment or default (seconds)
    #[must_use]
    pub fn external_timeout_secs() -> u64 {
        env::var("EXTERNAL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(limits::DEFAULT_EXTERNAL_TIMEOUT_SECS)
    }

    /// Parse common truthy spellings: 1/true/yes/on
    #[must_use]
    pub fn truthy(value: &str) -> bool {
        matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    }
}
