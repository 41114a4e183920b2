// ABOUTME: Database management for the capacity & booking engine
// ABOUTME: Owns the connection pool, schema migrations, and the per-domain record stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! # Database Management
//!
//! This module provides the record store for the booking engine: course
//! records (including the authoritative seat ledger), time slots, and
//! reservations. Per-domain operations live in submodules extending
//! [`Database`].
//!
//! The seat ledger's increment is implemented as a single atomic
//! conditional `UPDATE` (see [`Database::increment_occupied_seats`]), so
//! concurrent reservations can never overshoot a course's capacity.

mod courses;
mod reservations;
mod slots;

pub use courses::CourseFilter;
pub use reservations::ReservationFilter;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};

/// Database manager for course, slot, and reservation storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema migration fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = if database_url.contains(":memory:") {
            // An in-memory database lives and dies with its connection;
            // pin the pool to one so state survives across acquires.
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await?
        } else if database_url.starts_with("sqlite:") {
            // Ensure SQLite creates the database file if it doesn't exist
            SqlitePool::connect(&format!("{database_url}?mode=rwc")).await?
        } else {
            SqlitePool::connect(database_url).await?
        };

        let db = Self { pool };

        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails.
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_courses().await?;
        self.migrate_slots().await?;
        self.migrate_reservations().await?;
        Ok(())
    }
}
